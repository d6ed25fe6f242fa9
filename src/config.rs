use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;

/// Settings shared by every command, resolved from flags, the environment and `.env`.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub bind: String,
    pub refresh_interval: Duration,
    pub page_template: Option<PathBuf>,
}

impl From<&Cli> for Config {
    fn from(cli: &Cli) -> Self {
        Self {
            database_url: cli.database_url.clone(),
            bind: cli.bind.clone(),
            refresh_interval: Duration::from_secs(cli.refresh_secs),
            page_template: cli.template.clone(),
        }
    }
}

#[test]
pub fn test_config_from_flags() {
    use clap::Parser;

    let cli = Cli::try_parse_from([
        "apr-charts",
        "--database-url",
        "sqlite::memory:",
        "--refresh-secs",
        "60",
        "serve",
    ])
    .unwrap();
    let config = Config::from(&cli);
    assert_eq!(config.database_url, "sqlite::memory:");
    assert_eq!(config.refresh_interval, Duration::from_secs(60));
    assert_eq!(config.page_template, None);
}
