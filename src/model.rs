use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Event names carried in the `event` field of wire frames.
pub const EVENT_CREATED: &str = "groceries:created";
pub const EVENT_UPDATED: &str = "groceries:updated";
pub const EVENT_DELETED: &str = "groceries:deleted";

/// Informational frame sent by the server once per connection.
pub const EVENT_WELCOME: &str = "server:connected";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroceryItem {
    pub id: i64,
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub checked: bool,
}

fn default_quantity() -> u32 {
    1
}

impl GroceryItem {
    /// Display label; the multiplier suffix appears only past one.
    pub fn label(&self) -> String {
        if self.quantity > 1 {
            format!("{} (x{})", self.name, self.quantity)
        } else {
            self.name.clone()
        }
    }
}

/// Partial update over an item's mutable fields. Absent fields are left
/// untouched by the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
}

impl ItemUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.quantity.is_none() && self.checked.is_none()
    }
}

/// Wire envelope: every channel message is `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    pub data: Value,
}

impl Frame {
    pub fn new(event: &str, data: Value) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }
}

/// A decoded list-change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    Created(GroceryItem),
    Updated(GroceryItem),
    Deleted { id: i64 },
}

impl ListEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            ListEvent::Created(_) => EVENT_CREATED,
            ListEvent::Updated(_) => EVENT_UPDATED,
            ListEvent::Deleted { .. } => EVENT_DELETED,
        }
    }

    /// Encode as a wire frame (the sending side of [`decode_frame`]).
    pub fn to_frame(&self) -> Frame {
        let data = match self {
            ListEvent::Created(item) | ListEvent::Updated(item) => json!(item),
            ListEvent::Deleted { id } => json!({ "id": id }),
        };
        Frame::new(self.event_name(), data)
    }
}

#[derive(Deserialize)]
struct DeletedPayload {
    id: i64,
}

type EventDecoder = fn(Value) -> serde_json::Result<ListEvent>;

fn decode_created(data: Value) -> serde_json::Result<ListEvent> {
    serde_json::from_value(data).map(ListEvent::Created)
}

fn decode_updated(data: Value) -> serde_json::Result<ListEvent> {
    serde_json::from_value(data).map(ListEvent::Updated)
}

fn decode_deleted(data: Value) -> serde_json::Result<ListEvent> {
    serde_json::from_value(data).map(|p: DeletedPayload| ListEvent::Deleted { id: p.id })
}

/// Event-name to decoder registry. Connection code walks this table and
/// stays independent of what each event means.
const EVENT_DECODERS: &[(&str, EventDecoder)] = &[
    (EVENT_CREATED, decode_created),
    (EVENT_UPDATED, decode_updated),
    (EVENT_DELETED, decode_deleted),
];

/// Decode one wire frame. `Ok(None)` means a well-formed frame whose event
/// name is not in the registry (the welcome frame, future event kinds).
pub fn decode_frame(text: &str) -> serde_json::Result<Option<ListEvent>> {
    let frame: Frame = serde_json::from_str(text)?;
    for (name, decode) in EVENT_DECODERS {
        if *name == frame.event {
            return decode(frame.data).map(Some);
        }
    }
    Ok(None)
}
