mod classify;
mod db;
mod error;
mod export;
mod filter;
mod ocr;
mod pipeline;
mod record;
mod reddit;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "reddit_scraper", about = "Subreddit post/comment collector with OCR and CSV export")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch hot posts, filter by age-scaled score and store them
    Scrape {
        /// Max submissions per community (default: FETCH_LIMIT or 200)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Community to scrape, repeatable (default: COMMUNITIES)
        #[arg(short, long = "community")]
        communities: Vec<String>,
    },
    /// Write one <community>.csv per community
    Export {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
        /// Community to export, repeatable (default: COMMUNITIES)
        #[arg(short, long = "community")]
        communities: Vec<String>,
    },
    /// Stored posts and comments per community
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let conn = db::connect(&settings.database_path)?;
    db::init_schema(&conn)?;

    let result = match cli.command {
        Commands::Scrape { limit, communities } => {
            let communities = settings.communities(&communities)?;
            let creds = settings.reddit_credentials()?;
            let limit = limit.unwrap_or(settings.fetch_limit);

            let forum = reddit::RedditClient::connect(&creds)
                .await
                .context("Reddit authentication failed")?;
            let extractor = ocr::ImageTextExtractor::new(
                ocr::Tesseract::new(&settings.tesseract_cmd),
                settings.ocr_language.clone(),
            );

            println!(
                "Scraping {} communities (up to {} posts each)...",
                communities.len(),
                limit
            );
            let ingest = pipeline::Ingest::new(&forum, &extractor, &conn, settings.thresholds);
            let stats = ingest.run(&communities, limit).await;
            println!(
                "Done: {} posts seen, {} stored, {} below threshold, {} failed.",
                stats.seen, stats.stored, stats.below_threshold, stats.failed
            );
            println!(
                "Comments: {} kept, {} dropped.",
                stats.comments_kept, stats.comments_dropped
            );
            if stats.listing_errors > 0 {
                println!(
                    "{} of {} communities could not be listed.",
                    stats.listing_errors, stats.communities
                );
            }
            Ok(())
        }
        Commands::Export { out_dir, communities } => {
            let communities = settings.communities(&communities)?;
            for community in &communities {
                match export::export_community(&conn, community, &out_dir)? {
                    Some((rows, path)) => println!(
                        "Data for {} exported successfully to {} ({} rows)",
                        community,
                        path.display(),
                        rows
                    ),
                    None => println!("No data found for community: {}", community),
                }
            }
            Ok(())
        }
        Commands::Stats => {
            let rows = db::get_stats(&conn)?;
            if rows.is_empty() {
                println!("No posts stored yet. Run 'scrape' first.");
                return Ok(());
            }

            println!(
                "{} | {:>6} | {:>8} | Last collected",
                cell("Community", COMMUNITY_WIDTH),
                "Posts",
                "Comments"
            );
            println!("{}", "-".repeat(COMMUNITY_WIDTH + 39));
            for r in &rows {
                println!(
                    "{} | {:>6} | {:>8} | {}",
                    cell(&r.community, COMMUNITY_WIDTH),
                    r.posts,
                    r.comments,
                    r.last_collected.as_deref().map_or("-", |ts| ts.get(..19).unwrap_or(ts))
                );
            }
            let total: usize = rows.iter().map(|r| r.posts).sum();
            println!("\n{} posts across {} communities", total, rows.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

const COMMUNITY_WIDTH: usize = 20;

/// Left-aligned column of exactly `width` chars; long names end in `~`.
fn cell(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let head: String = s.chars().take(width - 1).collect();
        format!("{}~", head)
    } else {
        format!("{:<width$}", s)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, _) => format!("{:.1}s", d.as_secs_f64()),
        (0, m, s) => format!("{}m {:02}s", m, s),
        (h, m, s) => format!("{}h {:02}m {:02}s", h, m, s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cell_pads_and_clips() {
        assert_eq!(cell("Bitcoin", 10), "Bitcoin   ");
        assert_eq!(cell("CryptoCurrency", 10), "CryptoCur~");
        assert_eq!(cell("CryptoCurrency", 10).chars().count(), 10);
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 05s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 02m 03s");
    }
}
