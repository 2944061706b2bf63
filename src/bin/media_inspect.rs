use std::path::PathBuf;

use album_scraper::config;
use album_scraper::db;
use anyhow::Result;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(about = "Print stored albums and media for the configured owner")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Only list media of this album id
    #[arg(long)]
    album_id: Option<String>,

    /// Print albums and counts only
    #[arg(long)]
    summary: bool,
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
    let owner_id = cfg.owner.id;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let albums = db::list_albums(&pool, owner_id).await?;
    println!("Owner: {}", owner_id);
    println!("Albums ({}):", albums.len());
    for album in &albums {
        println!(
            "  {} {} (updated {})",
            album.album_id,
            album.album_name.as_deref().unwrap_or("-"),
            album.updated_at
        );
    }
    println!("Media items: {}", db::count_media(&pool, owner_id).await?);
    if args.summary {
        return Ok(());
    }

    for row in db::list_media(&pool, owner_id, args.album_id.as_deref()).await? {
        let fields = row.file_name_fields();
        let episode = match (fields.season, fields.episode) {
            (Some(s), Some(e)) => format!(" S{:02}E{:02}", s, e),
            _ => String::new(),
        };
        println!(
            "- {} [{}] {}x{} dur={} name={}{}{}",
            row.internal_id,
            row.album_id,
            row.width.unwrap_or_default(),
            row.height.unwrap_or_default(),
            row.duration_ms
                .map(|d| format!("{}ms", d))
                .unwrap_or_else(|| "-".into()),
            row.file_name.as_deref().unwrap_or("-"),
            fields
                .title
                .map(|t| format!(" title={t}"))
                .unwrap_or_default(),
            episode,
        );
        if !fields.stars.is_empty() {
            println!("    stars: {}", fields.stars.join(", "));
        }
    }
    Ok(())
}
