//! Waits for an existing task and prints its images.
//!
//! To run this example, you must have the `NOVITA_API_KEY` environment variable set.
//!
//! Usage:
//! `cargo run --example wait_for_task <TASK_ID>`

use novita::{NovitaClient, RequestOpts, SyncConfig};
use std::env;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let client = NovitaClient::new(None)?;

    let task_id = env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("Please provide a task ID as a command-line argument."))?;

    // Ctrl-C aborts the poll that is in flight.
    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });
    let opts = RequestOpts::default().with_signal(token);

    println!("Waiting for task `{}` to complete...", task_id);
    match client
        .wait_for_images(&task_id, &SyncConfig::default(), &opts)
        .await
    {
        Ok(imgs) => {
            println!("Task completed with {} image(s):", imgs.len());
            for url in imgs {
                println!("- {}", url);
            }
        }
        Err(e) => {
            eprintln!("Task did not complete: {}", e);
            if let Some(status) = e.task_status() {
                eprintln!("Terminal task status: {}", status);
            }
        }
    }

    Ok(())
}
