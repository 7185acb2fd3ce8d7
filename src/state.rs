//! Local replica of the server's grocery list: populated wholesale by one
//! snapshot, then mutated incrementally by channel events.

use crate::model::{GroceryItem, ListEvent};

/// Ordered sequence of items, unique by id. Order is event order, not
/// sorted: created items go to the front, updates keep their position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListState {
    items: Vec<GroceryItem>,
}

impl ListState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[GroceryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&GroceryItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Replace the whole list with a snapshot, discarding prior content.
    pub fn load(&mut self, items: Vec<GroceryItem>) {
        self.items = items;
    }

    /// Apply one event. Returns whether the list was modified.
    ///
    /// A created event whose id is already present replaces that entry in
    /// place rather than inserting a duplicate, so redelivery after a
    /// reconnect converges instead of doubling items.
    pub fn apply(&mut self, event: ListEvent) -> bool {
        match event {
            ListEvent::Created(item) => {
                match self.position(item.id) {
                    Some(at) => self.items[at] = item,
                    None => self.items.insert(0, item),
                }
                true
            }
            ListEvent::Updated(item) => match self.position(item.id) {
                Some(at) => {
                    self.items[at] = item;
                    true
                }
                None => false,
            },
            ListEvent::Deleted { id } => {
                let before = self.items.len();
                self.items.retain(|item| item.id != id);
                self.items.len() != before
            }
        }
    }

    /// One display line per item, in list order.
    pub fn render_lines(&self) -> Vec<String> {
        self.items.iter().map(GroceryItem::label).collect()
    }

    fn position(&self, id: i64) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }
}

enum Phase {
    /// Snapshot fetch still in flight; events queue up in arrival order.
    Loading { pending: Vec<ListEvent> },
    Live,
}

/// Replica plus the loading/live phase machine.
///
/// No sequencing token ties the snapshot response to the event stream, so
/// events that arrive first are buffered and applied once the snapshot
/// lands. A failed snapshot drains the buffer onto the prior state and goes
/// live anyway; there is no retry.
pub struct ListSync {
    state: ListState,
    phase: Phase,
}

impl ListSync {
    pub fn new() -> Self {
        Self {
            state: ListState::new(),
            phase: Phase::Loading {
                pending: Vec::new(),
            },
        }
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn is_live(&self) -> bool {
        matches!(self.phase, Phase::Live)
    }

    /// Feed one event in. Returns whether visible state changed (buffered
    /// events change nothing until the snapshot settles).
    pub fn handle_event(&mut self, event: ListEvent) -> bool {
        match &mut self.phase {
            Phase::Loading { pending } => {
                pending.push(event);
                false
            }
            Phase::Live => self.state.apply(event),
        }
    }

    /// The snapshot arrived: replace state wholesale, then replay anything
    /// that was buffered while it was in flight.
    pub fn snapshot_loaded(&mut self, items: Vec<GroceryItem>) {
        self.state.load(items);
        self.drain_pending();
    }

    /// The snapshot failed: keep prior state and go live on events alone.
    /// Returns whether draining the buffer changed anything.
    pub fn snapshot_failed(&mut self) -> bool {
        self.drain_pending()
    }

    fn drain_pending(&mut self) -> bool {
        let pending = match &mut self.phase {
            Phase::Loading { pending } => std::mem::take(pending),
            Phase::Live => Vec::new(),
        };
        self.phase = Phase::Live;

        let mut changed = false;
        for event in pending {
            changed |= self.state.apply(event);
        }
        changed
    }
}

impl Default for ListSync {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, name: &str, quantity: u32) -> GroceryItem {
        GroceryItem {
            id,
            name: name.to_string(),
            quantity,
            checked: false,
        }
    }

    fn ids(state: &ListState) -> Vec<i64> {
        state.items().iter().map(|it| it.id).collect()
    }

    #[test]
    fn snapshot_replaces_state_exactly() {
        let mut state = ListState::new();
        state.apply(ListEvent::Created(item(99, "Stale", 1)));

        let snapshot = vec![item(2, "Eggs", 1), item(1, "Milk", 2)];
        state.load(snapshot.clone());
        assert_eq!(state.items(), snapshot.as_slice());
    }

    #[test]
    fn created_events_prepend_in_reverse_arrival_order() {
        let mut state = ListState::new();
        for id in 1..=3 {
            assert!(state.apply(ListEvent::Created(item(id, "Item", 1))));
        }
        assert_eq!(ids(&state), vec![3, 2, 1]);
    }

    #[test]
    fn created_with_existing_id_replaces_in_place() {
        let mut state = ListState::new();
        state.load(vec![item(2, "Eggs", 1), item(1, "Milk", 1)]);

        // Redelivered create for id 1 must not duplicate it.
        state.apply(ListEvent::Created(item(1, "Milk", 4)));
        assert_eq!(ids(&state), vec![2, 1]);
        assert_eq!(state.get(1).unwrap().quantity, 4);
    }

    #[test]
    fn updated_replaces_fields_and_keeps_position() {
        let mut state = ListState::new();
        state.load(vec![item(3, "Bread", 1), item(2, "Eggs", 1), item(1, "Milk", 1)]);

        assert!(state.apply(ListEvent::Updated(item(2, "Eggs", 12))));
        assert_eq!(ids(&state), vec![3, 2, 1]);
        assert_eq!(state.get(2).unwrap().quantity, 12);
    }

    #[test]
    fn updated_without_match_is_a_no_op() {
        let mut state = ListState::new();
        state.load(vec![item(1, "Milk", 1)]);
        let before = state.clone();

        assert!(!state.apply(ListEvent::Updated(item(42, "Ghost", 1))));
        assert_eq!(state, before);
    }

    #[test]
    fn deleted_removes_match_and_is_idempotent() {
        let mut state = ListState::new();
        state.load(vec![item(2, "Eggs", 1), item(1, "Milk", 1)]);

        assert!(state.apply(ListEvent::Deleted { id: 2 }));
        assert_eq!(ids(&state), vec![1]);

        let once = state.clone();
        assert!(!state.apply(ListEvent::Deleted { id: 2 }));
        assert_eq!(state, once);
    }

    #[test]
    fn snapshot_then_created_renders_newest_first() {
        let mut sync = ListSync::new();
        sync.snapshot_loaded(vec![item(1, "Milk", 2)]);
        sync.handle_event(ListEvent::Created(item(2, "Eggs", 1)));

        assert_eq!(ids(sync.state()), vec![2, 1]);
        assert_eq!(sync.state().render_lines(), vec!["Eggs", "Milk (x2)"]);
    }

    #[test]
    fn events_before_snapshot_are_buffered_then_replayed() {
        let mut sync = ListSync::new();
        assert!(!sync.handle_event(ListEvent::Created(item(2, "Eggs", 1))));
        assert!(sync.state().is_empty());
        assert!(!sync.is_live());

        sync.snapshot_loaded(vec![item(1, "Milk", 2)]);
        assert!(sync.is_live());
        assert_eq!(ids(sync.state()), vec![2, 1]);
    }

    #[test]
    fn buffered_delete_wins_over_snapshot_content() {
        let mut sync = ListSync::new();
        sync.handle_event(ListEvent::Deleted { id: 1 });
        sync.snapshot_loaded(vec![item(1, "Milk", 2)]);
        assert!(sync.state().is_empty());
    }

    #[test]
    fn failed_snapshot_goes_live_with_buffered_events() {
        let mut sync = ListSync::new();
        sync.handle_event(ListEvent::Created(item(5, "Jam", 1)));

        assert!(sync.snapshot_failed());
        assert!(sync.is_live());
        assert_eq!(ids(sync.state()), vec![5]);

        // Live from here on: events apply directly.
        assert!(sync.handle_event(ListEvent::Deleted { id: 5 }));
        assert!(sync.state().is_empty());
    }
}
