//! Live chunk streaming demo
//!
//! Runs a loopback chunk collector, then records the synthetic display
//! stream while forwarding every chunk to it over a WebSocket. Watch the
//! transport events to see best-effort delivery in action.
//!
//! Run with: cargo run --example live_streaming

use std::time::Duration;

use codecast::{Codecast, GlobalConfig, SessionEvent};
use futures::StreamExt;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codecast=debug".into()),
        )
        .init();

    println!("📡 Codecast live streaming demo");

    // Loopback collector: one WebSocket, counts the chunks it receives.
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let endpoint = format!("ws://{}", listener.local_addr()?);
    println!("   Collector listening on {endpoint}");

    tokio::spawn(async move {
        while let Ok((socket, peer)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(socket).await else {
                    return;
                };
                let mut chunks = 0usize;
                let mut bytes = 0usize;
                while let Some(Ok(message)) = ws.next().await {
                    if let Message::Binary(data) = message {
                        chunks += 1;
                        bytes += data.len();
                        println!("   📦 Collector <- chunk {chunks} ({} bytes) from {peer}", data.len());
                    }
                }
                println!("   Collector connection done: {chunks} chunks, {bytes} bytes");
            });
        }
    });

    let config = GlobalConfig {
        chunk_cadence: Duration::from_millis(500),
        ..GlobalConfig::default()
    };
    let mut session = Codecast::init_with(config)
        .session()
        .display()
        .stream_to(&endpoint)
        .begin()
        .await?;

    let mut events = session.events().expect("first take of the event stream");
    let watcher = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                SessionEvent::TransportOpened { endpoint } => {
                    println!("   🔌 Transport open to {endpoint}");
                }
                SessionEvent::TransportReconnecting { delay, .. } => {
                    println!("   🔁 Transport redial in {delay:?}");
                }
                SessionEvent::ChunkRecorded { sequence, size } => {
                    println!("   🎞  Chunk {sequence} buffered ({size} bytes)");
                }
                _ => {}
            }
        }
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    let artifact = session.end()?;
    println!(
        "✅ Recorded {} chunks into {} bytes of {}",
        session.chunk_count(),
        artifact.len(),
        artifact.media_type()
    );

    watcher.abort();
    Ok(())
}
