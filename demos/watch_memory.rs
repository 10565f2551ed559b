//! Example watching a variable held in the in-memory backend.
//!
//! This example shows how to:
//! - Build a watcher over a backend
//! - React to values, missing variables and backend errors
//! - Close the watcher deterministically
//!
//! Run with: cargo run --example watch_memory
//! Set RUST_LOG=runtimevar=trace to see the watch loop at work.

use runtimevar::backends::MemoryBackend;
use runtimevar::prelude::*;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("runtimevar=debug")),
        )
        .init();

    println!("=== Memory Watch Example ===\n");

    let backend = MemoryBackend::new();
    let watcher = Watcher::builder()
        .with_name("greeting")
        .with_backend(backend.clone())
        .with_decoder(Decoder::string())
        .with_timeout(Duration::from_secs(1))
        .build()?;

    // Simulate an operator changing the variable over time
    let writer = {
        let backend = backend.clone();
        tokio::spawn(async move {
            for value in ["hello", "hola", "bonjour"] {
                tokio::time::sleep(Duration::from_millis(300)).await;
                backend.set("greeting", value);
            }
            tokio::time::sleep(Duration::from_millis(300)).await;
            backend.fail_queries(BackendError::new(Code::Unavailable, "store offline"));
            backend.touch("greeting");
        })
    };

    for _ in 0..5 {
        let (snapshot, _) = watcher.pull_next(None).await;
        match snapshot.value() {
            Ok(value) => println!(
                "value = {:?} (version {})",
                value,
                snapshot.version().map(|v| v.to_string()).unwrap_or_default()
            ),
            Err(e) if e.is_not_exist() => println!("greeting is not set yet"),
            Err(e) => println!("error: {}", e),
        }
    }

    writer
        .await
        .map_err(|e| VarError::Other(format!("writer task failed: {}", e)))?;
    watcher.close().await?;

    println!("\n✓ Watcher closed");
    Ok(())
}
