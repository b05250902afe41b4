//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use yuque_sdk::DEFAULT_LIMIT;

/// Pull documents out of a Yuque knowledge base.
///
/// Credentials are read from the environment: `YUQUE_TOKEN` for token mode;
/// `YUQUE_COOKIE`, `YUQUE_USERNAME`/`YUQUE_PASSWORD` (with
/// `YUQUE_LOGIN_PUBLIC_KEY`) or `YUQUE_REPO_PASSWORD` for password mode.
#[derive(Parser, Debug)]
#[command(name = "yuque-sdk")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Authentication mode.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Use the v2 API with an API token
    Token(TokenArgs),
    /// Use the web app with a cookie, account login or knowledge base password
    Password(PasswordArgs),
}

/// Options shared by both modes.
#[derive(ClapArgs, Debug)]
pub struct CommonArgs {
    /// Owner login of the knowledge base
    #[arg(long)]
    pub login: String,

    /// Knowledge base slug
    #[arg(long)]
    pub repo: String,

    /// Maximum concurrent detail fetches (1-20)
    #[arg(short = 'c', long, default_value_t = DEFAULT_LIMIT as u8, value_parser = clap::value_parser!(u8).range(1..=20))]
    pub limit: u8,

    /// Only download these document slugs (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<String>,

    /// Write each document as JSON into this directory instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Token mode options.
#[derive(ClapArgs, Debug)]
pub struct TokenArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// API root (default https://www.yuque.com/api/v2)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Directory for the document list checkpoint (default: working directory)
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,
}

/// Password mode options.
#[derive(ClapArgs, Debug)]
pub struct PasswordArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Web host (default https://www.yuque.com)
    #[arg(long = "base-url")]
    pub host: Option<String>,

    /// Keep line breaks in the markdown export
    #[arg(long)]
    pub linebreak: bool,

    /// Keep LaTeX source instead of rendered images
    #[arg(long)]
    pub latex_code: bool,

    /// Only download public documents
    #[arg(long)]
    pub only_public: bool,

    /// Only download published documents
    #[arg(long)]
    pub only_published: bool,
}
