//! Start a research task and wait for the report, printing progress.
//!
//! ```sh
//! SIFT_API_KEY=... cargo run --example research_wait -- "state of eBPF tooling"
//! ```

use std::time::Duration;

use sift::{Client, ResearchMode, ResearchRequest, WaitOptions};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("sift=info".parse()?),
        )
        .init();

    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Compare Raft implementations used in production".to_string());
    let client = Client::from_env()?;
    let request = ResearchRequest::new(query).mode(ResearchMode::Fast);
    let options = WaitOptions::new()
        .poll_interval(Duration::from_secs(10))
        .timeout(Duration::from_secs(30 * 60));

    let task = client
        .research()
        .create_and_wait(&request, &options, |task| {
            let percent = task
                .progress
                .and_then(|p| p.fraction())
                .map(|f| format!("{:.0}%", f * 100.0))
                .unwrap_or_else(|| "?".into());
            info!(id = %task.id, status = %task.status, progress = %percent, "polled");
        })
        .await?;

    if let Some(output) = &task.output {
        println!("{}", output.to_text());
    }
    for source in &task.sources {
        println!("- {} <{}>", source.title, source.url);
    }
    Ok(())
}
