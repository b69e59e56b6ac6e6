//! Stream a grounded answer to stdout.
//!
//! ```sh
//! SIFT_API_KEY=... cargo run --example stream_answer -- "how does io_uring work?"
//! ```

use std::io::Write;

use futures::StreamExt;
use sift::{AnswerEvent, AnswerRequest, Client};
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
        .unwrap_or_else(|| "What is read-copy-update?".to_string());
    let client = Client::from_env()?;
    let mut stream = client.answer_stream(&AnswerRequest::new(query)).await?;

    let mut stdout = std::io::stdout();
    while let Some(event) = stream.next().await {
        match event? {
            AnswerEvent::SearchResults(results) => {
                info!(sources = results.len(), "search results received");
            }
            AnswerEvent::Content(delta) => {
                write!(stdout, "{delta}")?;
                stdout.flush()?;
            }
            AnswerEvent::Metadata(meta) => {
                if let Some(cost) = meta.cost {
                    info!(dollars = cost.total_deduction_dollars, "answer cost");
                }
            }
            AnswerEvent::Done => writeln!(stdout)?,
        }
    }
    Ok(())
}
