use std::path::PathBuf;

const APP_DIR: &str = "storybook";

/// Directory holding `config.toml`, e.g. `~/.config/storybook`.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Directory holding the local draft database.
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

pub fn drafts_db_file() -> PathBuf {
    data_dir().join("drafts.sqlite")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_namespaced() {
        assert!(config_file().ends_with("storybook/config.toml"));
        assert!(drafts_db_file().ends_with("storybook/drafts.sqlite"));
    }
}
