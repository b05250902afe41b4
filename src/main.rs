//! CLI entry point for the Yuque SDK.

use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};
use yuque_sdk::config::process_env;
use yuque_sdk::{
    DocDetail, DocSink, JsonDirSink, PasswordClient, PasswordConfig, TokenClient, TokenConfig,
    YuqueError,
};

mod cli;
mod progress;

use cli::{Args, Command, PasswordArgs, TokenArgs};
use progress::ProgressSink;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr so stdout stays clean JSON.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let show_progress = !args.quiet && io::stderr().is_terminal();
    match run(args.command, show_progress).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let fatal = err
                .downcast_ref::<YuqueError>()
                .is_some_and(YuqueError::is_fatal);
            if fatal {
                error!("fatal: {err:#}");
            } else {
                error!("{err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, show_progress: bool) -> Result<()> {
    let details = match command {
        Command::Token(args) => run_token(args, show_progress).await?,
        Command::Password(args) => run_password(args, show_progress).await?,
    };

    if let Some(details) = details {
        let mut stdout = io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &details).context("writing documents")?;
        writeln!(stdout)?;
    }
    Ok(())
}

/// Prepares the output sink; documents are printed instead when there is none.
async fn output_sink(output: Option<&Path>) -> Result<Option<JsonDirSink>> {
    let Some(dir) = output else {
        return Ok(None);
    };
    Ok(Some(JsonDirSink::create(dir).await?))
}

async fn run_token(args: TokenArgs, show_progress: bool) -> Result<Option<Vec<DocDetail>>> {
    let config = TokenConfig {
        base_url: args.base_url,
        limit: Some(usize::from(args.common.limit)),
        checkpoint_dir: args.checkpoint_dir,
        ..TokenConfig::new(args.common.login, args.common.repo)
    }
    .with_env_fallback(process_env)?;

    info!(namespace = %config.namespace(), "Yuque token mode starting");
    let mut client = TokenClient::new(config)?;
    let docs = client.doc_list().await?;

    let sink = output_sink(args.common.output.as_deref()).await?;
    let progress = ProgressSink::new(show_progress, sink.as_ref().map(|s| s as &dyn DocSink));
    let details = client
        .doc_detail_list(&docs, &args.common.ids, Some(&progress))
        .await?;
    progress.finish();

    info!(listed = docs.len(), downloaded = details.len(), "Yuque token mode complete");
    Ok(sink.is_none().then_some(details))
}

async fn run_password(args: PasswordArgs, show_progress: bool) -> Result<Option<Vec<DocDetail>>> {
    let config = PasswordConfig {
        host: args.host,
        linebreak: args.linebreak,
        latex_code: args.latex_code,
        only_public: args.only_public,
        only_published: args.only_published,
        limit: Some(usize::from(args.common.limit)),
        ..PasswordConfig::new(args.common.login, args.common.repo)
    }
    .with_env_fallback(process_env)?;

    info!(namespace = %config.namespace(), "Yuque password mode starting");
    let mut client = PasswordClient::new(config)?;
    client.login().await?;
    let docs = client.doc_list().await?;

    let sink = output_sink(args.common.output.as_deref()).await?;
    let progress = ProgressSink::new(show_progress, sink.as_ref().map(|s| s as &dyn DocSink));
    let details = client
        .doc_detail_list(&docs, &args.common.ids, Some(&progress))
        .await?;
    progress.finish();

    info!(listed = docs.len(), downloaded = details.len(), "Yuque password mode complete");
    Ok(sink.is_none().then_some(details))
}
