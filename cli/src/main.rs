mod arg_parser;
mod client_cli;

use arg_parser::{ArgParser, SubCommand};
use client_cli::ClientCli;

use clap::Parser;
use std::error;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn error::Error>> {
    // diagnostics go to stderr, stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = ArgParser::parse();
    let mut client = ClientCli::connect(&args.server, args.ca_cert.as_deref()).await?;

    match args.sub_command {
        SubCommand::Submit { path } => {
            client.submit(&path).await?;
        }
        SubCommand::Status { job_id } => {
            client.query_status(&job_id).await?;
        }
        SubCommand::Wait {
            job_id,
            interval_secs,
        } => {
            client
                .wait(&job_id, Duration::from_secs(interval_secs.max(1)))
                .await?;
        }
        SubCommand::Stream { job_id } => {
            client.stream(&job_id).await?;
        }
        SubCommand::Output { job_id } => {
            client.output(&job_id).await?;
        }
    }

    Ok(())
}
