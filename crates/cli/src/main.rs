mod commands;

use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};

use crate::commands::{
    AppContext, categories::CategoriesCommand, collect::CollectArgs, config::ConfigCommand,
    drafts::DraftsCommand, stories::StoriesCommand, upload::UploadArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "storybook",
    version,
    about = "Collect, curate and draft children's stories against a storybook backend"
)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "STORYBOOK_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging for the storybook crates
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate stories in batches until the requested count is collected
    Collect(CollectArgs),
    /// Browse and edit stories stored on the server
    #[command(subcommand)]
    Stories(StoriesCommand),
    /// Manage story categories
    #[command(subcommand)]
    Categories(CategoriesCommand),
    /// Upload a CSV file of stories
    Upload(UploadArgs),
    /// Local story drafts
    #[command(subcommand)]
    Drafts(DraftsCommand),
    /// Create or inspect the config file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    utils::logging::init(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = cli.config.unwrap_or_else(utils::paths::config_file);

    match cli.command {
        // Config commands load (or replace) the file themselves.
        Command::Config(cmd) => commands::config::run(config_path, cmd).await?,
        Command::Collect(args) => {
            return commands::collect::run(&AppContext::load(config_path)?, args).await;
        }
        Command::Stories(cmd) => commands::stories::run(&AppContext::load(config_path)?, cmd).await?,
        Command::Categories(cmd) => {
            commands::categories::run(&AppContext::load(config_path)?, cmd).await?
        }
        Command::Upload(args) => commands::upload::run(&AppContext::load(config_path)?, args).await?,
        Command::Drafts(cmd) => commands::drafts::run(&AppContext::load(config_path)?, cmd).await?,
    }

    Ok(ExitCode::SUCCESS)
}
