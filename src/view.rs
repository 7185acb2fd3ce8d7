//! The grocery list view: a driver task exclusively owns the replica,
//! renderers observe it through a watch channel, and writes go straight to
//! the HTTP API and come back as channel events.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::config::Config;
use crate::live::LiveFeed;
use crate::model::GroceryItem;
use crate::state::{ListState, ListSync};

/// How long `close` waits for the driver to wind down before aborting it.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Handle to an attached view. All list mutations are applied by one
/// background driver, so event handling never races the snapshot or itself.
pub struct GroceryListView {
    api: ApiClient,
    state_rx: watch::Receiver<ListState>,
    shutdown: oneshot::Sender<()>,
    driver: JoinHandle<()>,
}

impl GroceryListView {
    /// Attach to the backend: start the snapshot fetch and open the event
    /// channel, concurrently. Fails only when the channel cannot be opened;
    /// a failing snapshot is logged and leaves the list at its prior
    /// (initially empty) value.
    pub async fn attach(config: Config) -> Result<Self> {
        let api = ApiClient::new(config.clone())?;

        // Fetch runs while the channel connects. If attach fails below, the
        // receiver is gone and the late result lands nowhere.
        let (snapshot_tx, snapshot_rx) = oneshot::channel();
        let fetch_api = api.clone();
        tokio::spawn(async move {
            let _ = snapshot_tx.send(fetch_api.fetch_snapshot().await);
        });

        let feed = LiveFeed::connect(&config.ws_url()?).await?;

        let (state_tx, state_rx) = watch::channel(ListState::new());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let driver = tokio::spawn(drive(feed, snapshot_rx, state_tx, shutdown_rx));

        Ok(Self {
            api,
            state_rx,
            shutdown: shutdown_tx,
            driver,
        })
    }

    /// Observe the list; the receiver wakes on every applied change.
    pub fn watch(&self) -> watch::Receiver<ListState> {
        self.state_rx.clone()
    }

    /// The list as of now.
    pub fn current(&self) -> ListState {
        self.state_rx.borrow().clone()
    }

    /// Send a new item to the backend. Blank input abandons the action with
    /// no request and returns `Ok(false)`. On success nothing changes
    /// locally: the item arrives through its created event, the one
    /// authoritative mutation path.
    pub async fn add_item(&self, name: &str) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() {
            debug!("blank item name, nothing sent");
            return Ok(false);
        }
        self.api.create_item(name, None).await?;
        Ok(true)
    }

    /// Detach: close the event channel and stop the driver. Dropping the
    /// view without calling this performs the same teardown in the
    /// background.
    pub async fn close(self) {
        let Self {
            shutdown,
            mut driver,
            ..
        } = self;
        let _ = shutdown.send(());

        if tokio::time::timeout(CLOSE_GRACE, &mut driver).await.is_err() {
            driver.abort();
        }
    }
}

async fn drive(
    mut feed: LiveFeed,
    mut snapshot: oneshot::Receiver<Result<Vec<GroceryItem>>>,
    state_tx: watch::Sender<ListState>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut sync = ListSync::new();
    let mut awaiting_snapshot = true;
    let mut feed_open = true;

    loop {
        tokio::select! {
            // Resolves on close() and on handle drop alike.
            _ = &mut shutdown => break,

            result = &mut snapshot, if awaiting_snapshot => {
                awaiting_snapshot = false;
                match result {
                    Ok(Ok(items)) => {
                        debug!(count = items.len(), "snapshot loaded");
                        sync.snapshot_loaded(items);
                        let _ = state_tx.send(sync.state().clone());
                    }
                    Ok(Err(err)) => {
                        warn!("snapshot fetch failed: {err:#}");
                        if sync.snapshot_failed() {
                            let _ = state_tx.send(sync.state().clone());
                        }
                    }
                    Err(_) => {
                        warn!("snapshot fetch abandoned");
                        if sync.snapshot_failed() {
                            let _ = state_tx.send(sync.state().clone());
                        }
                    }
                }
            }

            event = feed.recv(), if feed_open => match event {
                Some(event) => {
                    if sync.handle_event(event) {
                        let _ = state_tx.send(sync.state().clone());
                    }
                }
                None => {
                    feed_open = false;
                    info!("event channel closed");
                }
            },
        }
    }

    feed.close().await;
}
