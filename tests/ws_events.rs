use std::time::Duration;

use anyhow::Result;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

fn reserve_port() -> std::io::Result<u16> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

async fn start_server(temp: &TempDir) -> Result<(String, tokio::task::JoinHandle<()>)> {
    let port = reserve_port()?;
    let db = temp.path().join("groceries.db");
    let server = tokio::spawn(async move {
        let _ = homehub_groceries::server::start(port, db).await;
    });

    let base = format!("http://127.0.0.1:{port}");
    for _ in 0..20 {
        sleep(Duration::from_millis(100)).await;
        if let Ok(res) = reqwest::get(format!("{base}/health")).await {
            if res.status().is_success() {
                return Ok((base, server));
            }
        }
    }
    anyhow::bail!("server did not come up on {base}")
}

fn ws_url(base: &str) -> String {
    format!("{}/ws", base.replace("http://", "ws://"))
}

async fn next_frame(read: &mut WsRead) -> Value {
    timeout(Duration::from_secs(3), async {
        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    let text = text.to_string();
                    if let Ok(value) = serde_json::from_str::<Value>(&text) {
                        break value;
                    }
                }
                Some(Ok(_)) => {}
                other => panic!("channel ended early: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for a frame")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn welcome_first_then_every_mutation_broadcasts() -> Result<()> {
    let temp = TempDir::new()?;
    let (base, server) = start_server(&temp).await?;

    let (ws, _) = tokio_tungstenite::connect_async(ws_url(&base)).await?;
    let (_write, mut read) = ws.split();

    let welcome = next_frame(&mut read).await;
    assert_eq!(welcome["event"], "server:connected");
    assert_eq!(welcome["data"]["message"], "welcome");

    let client = reqwest::Client::new();
    let milk: Value = client
        .post(format!("{base}/groceries"))
        .json(&json!({ "name": "Milk", "quantity": 2 }))
        .send()
        .await?
        .json()
        .await?;
    let id = milk["id"].as_i64().unwrap();

    let created = next_frame(&mut read).await;
    assert_eq!(created["event"], "groceries:created");
    assert_eq!(created["data"]["name"], "Milk");
    assert_eq!(created["data"]["quantity"], 2);

    client
        .put(format!("{base}/groceries/{id}"))
        .json(&json!({ "checked": true }))
        .send()
        .await?;
    let updated = next_frame(&mut read).await;
    assert_eq!(updated["event"], "groceries:updated");
    assert_eq!(updated["data"]["checked"], true);

    client
        .delete(format!("{base}/groceries/{id}"))
        .send()
        .await?;
    let deleted = next_frame(&mut read).await;
    assert_eq!(deleted["event"], "groceries:deleted");
    assert_eq!(deleted["data"]["id"], id);

    server.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_subscriber_sees_each_event() -> Result<()> {
    let temp = TempDir::new()?;
    let (base, server) = start_server(&temp).await?;

    let (ws_a, _) = tokio_tungstenite::connect_async(ws_url(&base)).await?;
    let (ws_b, _) = tokio_tungstenite::connect_async(ws_url(&base)).await?;
    let (_wa, mut read_a) = ws_a.split();
    let (_wb, mut read_b) = ws_b.split();

    // Both get their own welcome.
    assert_eq!(next_frame(&mut read_a).await["event"], "server:connected");
    assert_eq!(next_frame(&mut read_b).await["event"], "server:connected");

    let bread: Value = reqwest::Client::new()
        .post(format!("{base}/groceries"))
        .json(&json!({ "name": "Bread" }))
        .send()
        .await?
        .json()
        .await?;

    let seen_a = next_frame(&mut read_a).await;
    let seen_b = next_frame(&mut read_b).await;
    assert_eq!(seen_a["event"], "groceries:created");
    assert_eq!(seen_a["data"]["id"], bread["id"]);
    assert_eq!(seen_a, seen_b);

    server.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn inbound_client_frames_are_ignored() -> Result<()> {
    let temp = TempDir::new()?;
    let (base, server) = start_server(&temp).await?;

    let (ws, _) = tokio_tungstenite::connect_async(ws_url(&base)).await?;
    let (mut write, mut read) = ws.split();
    assert_eq!(next_frame(&mut read).await["event"], "server:connected");

    // The channel is server-push only; nothing we send may disturb it.
    write.send(Message::Text("not json".into())).await?;
    write
        .send(Message::Text(
            serde_json::to_string(&json!({ "event": "groceries:created", "data": { "id": 1 } }))?
                .into(),
        ))
        .await?;

    let jam: Value = reqwest::Client::new()
        .post(format!("{base}/groceries"))
        .json(&json!({ "name": "Jam" }))
        .send()
        .await?
        .json()
        .await?;

    let created = next_frame(&mut read).await;
    assert_eq!(created["event"], "groceries:created");
    assert_eq!(created["data"]["id"], jam["id"]);

    // And the injected frame never became server state.
    let items: Vec<Value> = reqwest::get(format!("{base}/groceries")).await?.json().await?;
    assert_eq!(items.len(), 1);

    server.abort();
    Ok(())
}
