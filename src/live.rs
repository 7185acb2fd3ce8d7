use anyhow::Result;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::model::{self, ListEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The event channel as a scoped resource: connected on creation, pumping
/// decoded events until `close` (or drop) releases the connection.
pub struct LiveFeed {
    events: mpsc::Receiver<ListEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    reader: JoinHandle<()>,
}

impl LiveFeed {
    /// Connect and start decoding frames into events.
    pub async fn connect(url: &Url) -> Result<Self> {
        let (stream, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (events_tx, events_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let reader = tokio::spawn(pump(stream, events_tx, shutdown_rx));

        Ok(Self {
            events: events_rx,
            shutdown: Some(shutdown_tx),
            reader,
        })
    }

    /// Next decoded event; `None` once the channel has closed.
    pub async fn recv(&mut self) -> Option<ListEvent> {
        self.events.recv().await
    }

    /// Close the channel with a proper close frame and wait for the reader
    /// to finish. Dropping the feed instead tears the connection down the
    /// same way, just without waiting.
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        // A pump blocked on a full event buffer never sees the shutdown
        // signal; closing the receiver fails that send and unblocks it.
        self.events.close();
        let _ = (&mut self.reader).await;
    }
}

async fn pump(
    stream: WsStream,
    events: mpsc::Sender<ListEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            // Fires on explicit close and on feed drop alike.
            _ = &mut shutdown => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let text = text.to_string();
                    match model::decode_frame(&text) {
                        Ok(Some(event)) => {
                            if events.send(event).await.is_err() {
                                let _ = sink.send(Message::Close(None)).await;
                                break;
                            }
                        }
                        Ok(None) => tracing::debug!(frame = %text, "ignoring channel frame"),
                        Err(err) => tracing::debug!("undecodable channel frame: {err}"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(err)) => {
                    tracing::debug!("event channel error: {err}");
                    break;
                }
            }
        }
    }
}
