use std::{env, path::PathBuf};

use config::{Config, File};
use log::debug;
use serde::Deserialize;

use crate::cli::Args;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub backend_url: Option<String>,
    pub anon_key: Option<String>,
    pub session_file: Option<PathBuf>,
}

const APP_NAME: &str = env!("CARGO_PKG_NAME");

fn get_xdg_config_path() -> Option<PathBuf> {
    if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config));
    }

    if let Ok(home) = env::var("HOME") {
        return Some(PathBuf::from(home).join(".config"));
    }

    None
}

fn get_xdg_data_path() -> Option<PathBuf> {
    if let Ok(xdg_data) = env::var("XDG_DATA_HOME") {
        return Some(PathBuf::from(xdg_data));
    }

    if let Ok(home) = env::var("HOME") {
        return Some(PathBuf::from(home).join(".local").join("share"));
    }

    None
}

/// Where the signed-in session is kept between runs.
pub fn default_session_path() -> Option<PathBuf> {
    get_xdg_data_path().map(|data| data.join(APP_NAME).join("session.json"))
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let Some(xdg_config) = get_xdg_config_path() else {
        return Ok(Settings::default());
    };

    let config_path = xdg_config.join(APP_NAME).join("config.toml");
    if !config_path.exists() {
        return Ok(Settings::default());
    }

    Config::builder()
        .add_source(File::from(config_path.clone()).required(false))
        .build()?
        .try_deserialize()
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to deserialize config file {}: {}",
                config_path.display(),
                e
            )
        })
}

/// Fills connection options missing from the command line with config file values.
pub fn merge_settings_with_args(args: &Args, settings: Settings) -> Args {
    let mut merged = args.clone();

    macro_rules! apply_if_missing {
        ($field:ident) => {
            if merged.$field.as_deref().is_none_or(str::is_empty) {
                merged.$field = settings.$field.clone();
            }
        };
    }

    apply_if_missing!(backend_url);
    apply_if_missing!(anon_key);

    if merged.session_file.is_none() {
        merged.session_file = settings.session_file.clone().or_else(default_session_path);
    }

    debug!(
        "merged config: backend_url={:?} session_file={:?}",
        merged.backend_url, merged.session_file
    );

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_values_win_over_config_file() {
        let args = Args::parse_from([
            "portal",
            "--backend-url",
            "https://cli.example",
            "whoami",
        ]);
        let settings = Settings {
            backend_url: Some("https://file.example".into()),
            anon_key: Some("file-key".into()),
            session_file: Some(PathBuf::from("/tmp/session.json")),
        };

        let merged = merge_settings_with_args(&args, settings);

        assert_eq!(merged.backend_url.as_deref(), Some("https://cli.example"));
        assert_eq!(merged.anon_key.as_deref(), Some("file-key"));
        assert_eq!(merged.session_file, Some(PathBuf::from("/tmp/session.json")));
    }
}
