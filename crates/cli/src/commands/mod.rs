pub mod categories;
pub mod collect;
pub mod config;
pub mod drafts;
pub mod stories;
pub mod upload;

use std::path::PathBuf;

use anyhow::Context;
use db::DBService;
use dialoguer::Confirm;
use services::services::{config::Config, storybook_api::StorybookApiClient};

/// Loaded configuration plus the handles commands build from it.
pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
}

impl AppContext {
    pub fn load(config_path: PathBuf) -> anyhow::Result<Self> {
        let config = Config::load(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn client(&self) -> anyhow::Result<StorybookApiClient> {
        Ok(StorybookApiClient::from_config(&self.config.api)?)
    }

    pub async fn drafts(&self) -> anyhow::Result<DBService> {
        let path = self.config.drafts_db_path();
        DBService::new(&path)
            .await
            .with_context(|| format!("opening draft database {}", path.display()))
    }
}

/// Ask before a destructive action unless `assume_yes` is set.
pub fn confirm(prompt: &str, assume_yes: bool) -> anyhow::Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}
