use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::structs::{format_time, Observation};

#[derive(Parser, Debug)]
#[command(version, about = "Binance Earn APR history charts", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// SQLite database holding the `apr` table.
    #[arg(long, env = "APR_DATABASE_URL", default_value = "sqlite:binance_apr.sqlite", global = true)]
    pub database_url: String,

    /// Address the HTTP server listens on.
    #[arg(long, env = "APR_BIND", default_value = "0.0.0.0:8081", global = true)]
    pub bind: String,

    /// Seconds between reloads of the chart data from the database.
    #[arg(
        long,
        env = "APR_REFRESH_SECS",
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    pub refresh_secs: u64,

    /// Tera template replacing the built-in page layout.
    #[arg(long, env = "APR_TEMPLATE", global = true)]
    pub template: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Serve the charts over HTTP; the default when no command is given.
    Serve,

    /// Import a CSV export (Time,Asset,APY,Bonus) into the database.
    Convert {
        #[arg(long, default_value = "binance_apr.csv")]
        csv: PathBuf,
    },

    /// Print the most recent records.
    Show {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,
    },

    /// Record the current flexible-product APRs from Binance Earn.
    Fetch {
        #[arg(long, env = "APR_ASSETS", value_delimiter = ',', default_value = "USDT,BUSD,DAI")]
        assets: Vec<String>,

        /// Also append the quotes to this CSV export.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

pub const SHOW_HEADER: &str = "Time\t\t\tAsset\tAPY\t\tBonus";

pub fn format_record(obs: &Observation) -> String {
    format!("{}\t{}\t{:.6}\t{:.6}", format_time(&obs.time), obs.asset, obs.apy, obs.bonus)
}

#[test]
pub fn test_defaults_to_no_command() {
    let cli = Cli::try_parse_from(["apr-charts"]).unwrap();
    assert_eq!(cli.command, None);
    assert_eq!(cli.refresh_secs, 300);
}

#[test]
pub fn test_show_requires_positive_count() {
    assert!(Cli::try_parse_from(["apr-charts", "show", "0"]).is_err());
    let cli = Cli::try_parse_from(["apr-charts", "show", "5"]).unwrap();
    assert_eq!(cli.command, Some(Commands::Show { count: 5 }));
}

#[test]
pub fn test_fetch_splits_assets() {
    let cli = Cli::try_parse_from(["apr-charts", "fetch", "--assets", "USDT,FDUSD"]).unwrap();
    match cli.command {
        Some(Commands::Fetch { assets, csv }) => {
            assert_eq!(assets, vec!["USDT", "FDUSD"]);
            assert_eq!(csv, None);
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
pub fn test_format_record() {
    let t = crate::structs::parse_time("2024-02-03 04:05:06").unwrap();
    let line = format_record(&Observation::new(t, "DAI", 0.05, 0.0));
    assert_eq!(line, "2024-02-03 04:05:06\tDAI\t0.050000\t0.000000");
}
