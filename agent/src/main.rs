mod invoice;

use clap::Parser;
use formflow_agent::{FlowError, FormFlow, FormFlowConfig, RunCancellationToken};
use formflow_store_adapters::{FileStore, KeepLastTrimmer};
use invoice::InvoiceSpec;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Parser)]
struct Args {
    /// JSON file with `FormFlowConfig` overrides.
    #[arg(long, env = "FORMFLOW_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "FORMFLOW_STORAGE_DIR", default_value = "./sessions")]
    storage_dir: PathBuf,

    /// Routing key of the conversation.
    #[arg(long, env = "FORMFLOW_KEY", default_value = "invoice")]
    key: String,

    #[arg(long, env = "FORMFLOW_HISTORY_LIMIT", default_value_t = 50)]
    history_limit: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => FormFlowConfig::from_json_file(path)?,
        None => FormFlowConfig::default(),
    };
    tracing::info!(
        storage_dir = %args.storage_dir.display(),
        key = %args.key,
        "formflow invoice demo starting"
    );

    let store = FileStore::new(args.storage_dir.clone())
        .with_trimmer(KeepLastTrimmer::new(args.history_limit));
    let flow = FormFlow::local_with_config(Arc::new(InvoiceSpec), config);

    let shutdown = RunCancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    println!("Describe your expense, e.g. \"title: ACME, amount: 120.5, date: 2026-01-28\".");
    println!("Say \"confirm\" to submit, \"back\" to edit, \"cancel\" to stop.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let turn = shutdown.child_token();
        match flow
            .invoke(&store, &store, &args.key, input, Some(&turn))
            .await
        {
            Ok(response) => {
                println!("\n{}\n======", response.message);
                if response.completed {
                    println!("(conversation {}; starting over)", response.phase);
                }
            }
            Err(FlowError::Cancelled) => break,
            Err(FlowError::Submit(e)) => {
                tracing::warn!(error = %e, "submission failed");
                println!("\nSubmission failed: {e}. Say \"confirm\" to retry.\n======");
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!("formflow invoice demo stopped");
    Ok(())
}
