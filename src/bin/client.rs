//! Command-line A2A client.
//!
//! Streams one request to an agent (the orchestrator by default), prints
//! every task event as it arrives, then fetches the final task snapshot.
//!
//! # Environment Variables
//!
//! - `AGENT_URL` — Base URL of the agent (default: `http://localhost:10001`)
//! - `RUST_LOG` — Tracing filter (default: "warn")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin client -- "Approve R$ 2.500 for the Marketing department with supplier XYZ Agency"
//! ```

use anyhow::Context;
use expense_a2a::a2a::config::A2AClientConfig;
use expense_a2a::a2a::jsonrpc::SendMessageRequest;
use expense_a2a::a2a::{parts_text, A2AClient, Message, TaskEvent};
use futures::StreamExt;

const DEFAULT_QUERY: &str = "Approve R$ 2.500 for the Marketing department with supplier XYZ Agency";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let url = std::env::var("AGENT_URL").unwrap_or_else(|_| "http://localhost:10001".to_string());
    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let query = if query.trim().is_empty() { DEFAULT_QUERY.to_string() } else { query };

    let client = A2AClient::new(url.clone(), A2AClientConfig::default())?;
    let card = client
        .fetch_agent_card()
        .await
        .with_context(|| format!("no agent card at {}", url))?;
    println!("Connected to {} ({})", card.name, card.url);
    println!("> {}\n", query);

    let request = SendMessageRequest::new(Message::user_text(query));
    let mut events = client.stream_message(&request).await?;
    let mut task_id = None;
    while let Some(event) = events.next().await {
        let event = event?;
        print_event(&event);
        task_id = Some(event.task_id);
    }

    let task_id = task_id.context("the agent closed the stream without any event")?;
    let task = client.get_task(&task_id).await?;
    println!("\nTask {} finished as {}", task.id, task.status.state);
    Ok(())
}

fn print_event(event: &TaskEvent) {
    println!("[{}]", event.state);
    if let Some(ref message) = event.message {
        println!("  {}", message.text());
    }
    if let Some(ref artifact) = event.artifact {
        println!("{}", parts_text(&artifact.parts));
    }
}
