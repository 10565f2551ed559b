//! Example polling a variable served over HTTP.
//!
//! Run with: cargo run --example watch_http --features remote -- http://localhost:8080/vars greeting
//!
//! The server should answer `GET {base}/{name}` with the raw value, ideally with
//! an `ETag` header. A 404 is reported as a missing variable.

use runtimevar::backends::HttpBackend;
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

    let mut args = std::env::args().skip(1);
    let base_url = args
        .next()
        .unwrap_or_else(|| "http://localhost:8080/vars".to_string());
    let name = args.next().unwrap_or_else(|| "greeting".to_string());

    // Timeouts can come from the environment, e.g. RUNTIMEVAR_TIMEOUT_MS=2000
    let options = WatchOptions::load(None, Some("RUNTIMEVAR"))?;

    let mut builder = HttpBackend::builder()
        .with_url(base_url)
        .with_timeout(options.effective_timeout());
    if let Ok(token) = std::env::var("RUNTIMEVAR_TOKEN") {
        builder = builder.with_auth_token(token);
    }

    let watcher = Watcher::builder()
        .with_name(name.clone())
        .with_backend(builder.build()?)
        .with_decoder(Decoder::string())
        .with_options(options.with_poll_interval(Duration::from_secs(2)))
        .build()?;

    println!("Watching {} (Ctrl+C to stop)\n", name);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            (snapshot, _) = watcher.pull_next(None) => match snapshot.value() {
                Ok(value) => println!("{} = {:?}", name, value),
                Err(e) => println!("{}: {}", name, e),
            },
        }
    }

    watcher.close().await?;
    println!("\n✓ Watcher closed");
    Ok(())
}
