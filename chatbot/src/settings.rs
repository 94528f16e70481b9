use std::{env, path::PathBuf, time::Duration};

use config::{Config, File};
use log::debug;
use serde::Deserialize;

use crate::cli::Args;
use crate::scheduler::TypingDelay;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub min_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub open_browser: Option<bool>,
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

/// Effective options once the command line and config file are combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub typing: TypingDelay,
    pub open_browser: bool,
}

pub fn merge_settings_with_args(args: &Args, settings: &Settings) -> Options {
    let defaults = TypingDelay::default();
    let min = args
        .min_delay_ms
        .or(settings.min_delay_ms)
        .map(Duration::from_millis)
        .unwrap_or(defaults.min);
    let max = args
        .max_delay_ms
        .or(settings.max_delay_ms)
        .map(Duration::from_millis)
        .unwrap_or(defaults.max);

    let options = Options {
        typing: TypingDelay::new(min, max),
        open_browser: !args.no_browser && settings.open_browser.unwrap_or(true),
    };
    debug!("merged config: {options:?}");
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_values_win_over_config_file() {
        let args = Args::parse_from(["chatbot", "--min-delay-ms", "10"]);
        let settings = Settings {
            min_delay_ms: Some(100),
            max_delay_ms: Some(200),
            open_browser: None,
        };

        let options = merge_settings_with_args(&args, &settings);

        assert_eq!(options.typing.min, Duration::from_millis(10));
        assert_eq!(options.typing.max, Duration::from_millis(200));
        assert!(options.open_browser);
    }

    #[test]
    fn test_browser_can_be_disabled_either_way() {
        let args = Args::parse_from(["chatbot"]);
        let settings = Settings {
            open_browser: Some(false),
            ..Settings::default()
        };
        assert!(!merge_settings_with_args(&args, &settings).open_browser);

        let args = Args::parse_from(["chatbot", "--no-browser"]);
        assert!(!merge_settings_with_args(&args, &Settings::default()).open_browser);
    }
}
