use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail};
use clap::Subcommand;
use services::services::config::{API_KEY_ENV, Config};

use super::AppContext;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write a config file with every setting at its default
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
    /// List the models the backend can generate with
    Models,
    /// Use this model for collection
    SetModel { model: String },
    /// Store the configured API key on the backend
    PushKey,
}

pub async fn run(config_path: PathBuf, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Init { force } => init(&config_path, force),
        ConfigCommand::Show => show(&AppContext::load(config_path)?),
        ConfigCommand::Models => {
            let ctx = AppContext::load(config_path)?;
            let models = ctx
                .client()?
                .list_models(ctx.config.api.api_key())
                .await?;
            let current = ctx.config.generation.model.trim();
            for model in models {
                let marker = if model.id == current { "*" } else { " " };
                println!("{marker} {}", model.id);
            }
            Ok(())
        }
        ConfigCommand::SetModel { model } => {
            let config = Config::set_model(&config_path, &model)?;
            println!(
                "model set to {} in {}",
                config.generation.model,
                config_path.display()
            );
            Ok(())
        }
        ConfigCommand::PushKey => {
            let ctx = AppContext::load(config_path)?;
            let key = ctx
                .config
                .api
                .api_key()
                .ok_or_else(|| anyhow!("no API key configured: set {API_KEY_ENV}"))?;
            println!("{}", ctx.client()?.update_settings(key).await?);
            Ok(())
        }
    }
}

/// Does not read the existing file, so a broken one can be replaced.
fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite it", path.display());
    }
    Config::default().save(path)?;
    println!("wrote {}", path.display());
    println!("set {API_KEY_ENV}, then pick a model with `storybook config models` and `storybook config set-model`");
    Ok(())
}

fn show(ctx: &AppContext) -> anyhow::Result<()> {
    let key_state = if ctx.config.api.api_key().is_some() {
        "set"
    } else {
        "not set"
    };
    println!("# {}", ctx.config_path.display());
    println!("# api key: {key_state}");
    println!("# drafts: {}", ctx.config.drafts_db_path().display());
    print!("{}", ctx.config.render()?);
    Ok(())
}
