use std::path::PathBuf;

use album_scraper::config;
use album_scraper::db;
use anyhow::Result;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(about = "Store the configured album list as the owner's saved scrape list")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Print the currently saved list instead of replacing it
    #[arg(long)]
    show: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    if !args.show {
        db::save_scrape_config(&pool, cfg.owner.id, &cfg.albums).await?;
        println!("Saved {} album(s) for owner {}", cfg.albums.len(), cfg.owner.id);
    }

    let saved = db::get_scrape_config(&pool, cfg.owner.id).await?;
    for album in &saved {
        println!("- {}: {}", album.name, album.url);
    }
    Ok(())
}
