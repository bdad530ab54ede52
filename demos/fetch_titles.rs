//! Fetch titles example
//!
//! This example demonstrates the core functionality of docfetch:
//! - Creating a fetcher from configuration
//! - Arming a cancellation context with a deadline
//! - Running a batch with error and completion handlers
//!
//! Usage: `cargo run --example fetch_titles -- https://example.com/ https://www.rust-lang.org/`

use docfetch::{BatchOutcome, CancellationContext, Credential, DocumentFetcher, FetchConfig};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let urls: Vec<String> = std::env::args().skip(1).collect();
    if urls.is_empty() {
        eprintln!("usage: fetch_titles <url>...");
        return Ok(());
    }

    let config = FetchConfig {
        default_deadline: Some(Duration::from_secs(30)),
        ..Default::default()
    };
    let fetcher = DocumentFetcher::new(config.clone())?;

    // Abort whatever is still loading once the deadline passes
    let context = CancellationContext::new(Credential::new());
    context.arm_with_config(&config, || eprintln!("✗ Deadline reached, aborting"))?;

    let outcome = fetcher
        .batch(urls)
        .context(context.clone())
        .on_error(|e| eprintln!("✗ {e}"))
        .on_done(|| println!("✓ All URLs processed"))
        .run(|doc| {
            let title = doc.title().unwrap_or_else(|| "(untitled)".to_string());
            println!("{}\t{}", doc.url(), title);
            Ok(())
        })
        .await;
    context.cancel_arm();

    match outcome {
        BatchOutcome::Completed(stats) => {
            println!("{} documents, {} errors", stats.documents, stats.errors);
        }
        BatchOutcome::Failed(e) => return Err(e.into()),
        BatchOutcome::Expired => println!("Stopped early: deadline reached"),
    }

    Ok(())
}
