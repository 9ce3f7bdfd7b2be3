//! Basic recording walkthrough
//!
//! Records three seconds of the synthetic camera, then writes the
//! artifact to the current directory under its suggested filename.
//!
//! Run with: cargo run --example record_and_save

use std::time::Duration;

use codecast::Codecast;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codecast=debug".into()),
        )
        .init();

    println!("🎥 Codecast recording demo");

    let codecast = Codecast::init();
    let mut session = codecast.session().camera().begin().await?;
    println!("   Recording session {} started", session.id());

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        println!(
            "   {}s elapsed, {} chunks buffered",
            session.elapsed_seconds(),
            session.chunk_count()
        );
    }

    let artifact = session.end()?;
    println!(
        "   Stopped: {} chunks, {} bytes of {}",
        session.chunk_count(),
        artifact.len(),
        artifact.media_type()
    );

    let path = artifact.write_to(".").await?;
    println!("✅ Saved {}", path.display());
    Ok(())
}
