use anyhow::Context;
use clap::Parser;
use tracing::info;

use fieldservice_api as api;

/// Applies or rolls back the database schema.
#[derive(Debug, Parser)]
#[command(name = "migration", version, about)]
struct Args {
    /// Database URL; defaults to the configured one
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Roll back every applied migration instead of applying pending ones
    #[arg(long)]
    down: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let database_url = match args.database_url {
        Some(url) => url,
        None => {
            let cfg = api::config::load_config().context("failed to load configuration")?;
            api::config::init_tracing(cfg.log_level(), cfg.log_json);
            cfg.database_url
        }
    };
    api::config::init_tracing("info", false);

    let db = api::db::establish_connection(&database_url)
        .await
        .context("failed to connect to the database")?;

    if args.down {
        info!("Rolling back all migrations");
        api::db::rollback_migrations(&db).await?;
    } else {
        info!("Applying pending migrations");
        api::db::run_migrations(&db).await?;
    }

    info!("Done");
    Ok(())
}
