pub mod api;
pub mod store;

pub use store::GroceryStore;

use anyhow::Result;
use std::path::PathBuf;

/// Open the store and serve the API on the given port.
pub async fn start(port: u16, db: PathBuf) -> Result<()> {
    let store = GroceryStore::open(&db)?;
    api::serve(port, store).await
}
