use anyhow::Context;
use apr_charts::cli::{format_record, Cli, Commands, SHOW_HEADER};
use apr_charts::config::Config;
use apr_charts::external::BinanceEarn;
use apr_charts::store::Store;
use apr_charts::{from_unix, import, server};
use chrono::Utc;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from(&cli);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => server::run(config).await.context("server stopped")?,
        Commands::Convert { csv } => {
            info!("converting {}", csv.display());
            let store = Store::connect(&config.database_url).await?;
            let written = import::convert(&store, &csv)
                .await
                .with_context(|| format!("import of {} failed", csv.display()))?;
            info!("imported {} rows", written);
        }
        Commands::Show { count } => {
            let store = Store::open_existing(&config.database_url)
                .await
                .with_context(|| format!("cannot open {}", config.database_url))?;
            println!("{}", SHOW_HEADER);
            for obs in store.latest(count).await? {
                println!("{}", format_record(&obs));
            }
        }
        Commands::Fetch { assets, csv } => {
            let now = from_unix(Utc::now().timestamp())?;
            let quotes = BinanceEarn::new().fetch(&assets, now).await?;
            for quote in &quotes {
                info!("{} apy={} bonus={}", quote.asset, quote.apy, quote.bonus);
            }
            let store = Store::connect(&config.database_url).await?;
            store.migrate().await?;
            store.insert_batch(&quotes).await?;
            if let Some(path) = csv {
                import::append_csv(&path, &quotes)?;
            }
        }
    }
    Ok(())
}
