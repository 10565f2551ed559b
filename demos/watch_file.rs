//! Example watching a JSON file and decoding it into a typed struct.
//!
//! This example shows how to:
//! - Watch a file with OS change notifications
//! - Decode values with a JSON decoder
//! - Keep the last good value when a bad write comes in
//!
//! Run with: cargo run --example watch_file

use runtimevar::backends::{FileBackend, FileResponse};
use runtimevar::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct FeatureFlags {
    dark_mode: bool,
    rollout_percent: u8,
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("runtimevar=debug")),
        )
        .init();

    println!("=== File Watch Example ===\n");

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("flags.json");
    std::fs::write(&path, r#"{"dark_mode": false, "rollout_percent": 10}"#)?;

    let watcher = Watcher::builder()
        .with_name("flags.json")
        .with_backend(FileBackend::new(dir.path()))
        .with_decoder(Decoder::<FeatureFlags>::json())
        .build()?;

    let writer = tokio::spawn({
        let path = path.clone();
        async move {
            let writes = [
                r#"{"dark_mode": true, "rollout_percent": 50}"#,
                r#"{"dark_mode": "#,
                r#"{"dark_mode": true, "rollout_percent": 100}"#,
            ];
            for contents in writes {
                tokio::time::sleep(Duration::from_millis(500)).await;
                let _ = tokio::fs::write(&path, contents).await;
            }
        }
    });

    let mut last_good: Option<Arc<Snapshot<FeatureFlags>>> = None;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);

    while let Ok((snapshot, _)) =
        tokio::time::timeout_at(deadline, watcher.pull_next(None)).await
    {
        match snapshot.value() {
            Ok(flags) => {
                let bytes = snapshot.raw_as::<FileResponse>().map(|r| r.len).unwrap_or(0);
                println!("flags = {:?} ({} bytes)", flags, bytes);
                last_good = Some(snapshot);
            }
            Err(e) => {
                println!("bad update ignored: {}", e);
                if let Some(good) = &last_good {
                    println!("  still using {:?}", good.value().ok());
                }
            }
        }
    }

    writer.await?;
    watcher.close().await?;

    println!("\n✓ Watcher closed");
    Ok(())
}
