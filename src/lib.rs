//! # HomeHub Groceries
//!
//! Live-synchronized grocery list built on a snapshot-plus-events contract:
//! clients fetch the full list once over HTTP, then keep a local replica in
//! sync from `created` / `updated` / `deleted` events pushed over a
//! WebSocket. The crate ships both halves plus a terminal UI.
//!
//! ## Features
//!
//! - **Single mutation path**: writes go to the HTTP API and come back as
//!   broadcast events, so every viewer converges through the same code
//! - **Race-free replica**: one driver task owns the list; snapshot results
//!   and events are serialized through it, no locks
//! - **Scoped event channel**: connected on attach, closed on detach, with
//!   drop as a safety net
//! - **Embedded server**: axum HTTP + WebSocket service over SQLite, with
//!   the browser page built in
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use homehub_groceries::{config::Config, GroceryListView};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let view = GroceryListView::attach(Config::resolve(None)?).await?;
//!     let mut rx = view.watch();
//!
//!     view.add_item("Bread").await?;
//!     rx.changed().await?;
//!     for line in rx.borrow().render_lines() {
//!         println!("{line}");
//!     }
//!
//!     view.close().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod live;
pub mod model;
pub mod server;
pub mod state;
pub mod view;

// Re-export main types for library consumers
pub use api::ApiClient;
pub use live::LiveFeed;
pub use model::{GroceryItem, ItemUpdate, ListEvent};
pub use state::{ListState, ListSync};
pub use view::GroceryListView;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
