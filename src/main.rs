mod config;
mod enrich;
mod extract;
mod nlp;
mod pipeline;
mod render;
mod store;
mod sync;

use std::time::Instant;

use clap::{Parser, Subcommand};

use config::Config;
use nlp::LexiconAnalyzer;
use render::{ChromeSession, HttpSession};
use store::{SqliteWarehouse, Warehouse};

#[derive(Parser)]
#[command(
    name = "yogonet_scraper",
    about = "Yogonet news pipeline: render, extract, enrich, sync"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the dataset (database file) if it does not exist yet
    Init,
    /// Run the full pipeline against the news portal
    Run {
        /// Override the target page URL
        #[arg(long)]
        url: Option<String>,
        /// Max articles to process (default: all on the page)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Fetch the page without a browser (no JavaScript execution)
        #[arg(long = "static")]
        static_fetch: bool,
    },
    /// Show table statistics
    Stats,
    /// Most recently loaded articles
    Overview {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => {
            let cfg = Config::from_env();
            let mut warehouse = SqliteWarehouse::new(cfg.db_path());
            if warehouse.dataset_exists()? {
                println!("Dataset already exists at {}", warehouse.db_path().display());
            } else {
                warehouse.create_dataset()?;
                println!("Created dataset at {}", warehouse.db_path().display());
            }
            Ok(())
        }
        Commands::Run {
            url,
            limit,
            static_fetch,
        } => {
            let mut cfg = Config::from_env();
            if let Some(url) = url {
                cfg.target_url = url;
            }
            cfg.limit = limit;

            let analyzer = LexiconAnalyzer::new();
            let mut warehouse = SqliteWarehouse::new(cfg.db_path());

            let summary = if static_fetch {
                let session = HttpSession::new()?;
                pipeline::run(&cfg, session, &analyzer, &mut warehouse)?
            } else {
                let session = ChromeSession::launch()?;
                pipeline::run(&cfg, session, &analyzer, &mut warehouse)?
            };

            println!(
                "Run of {}: {} articles extracted, decision: {}, {} rows written.",
                summary.started.format("%Y-%m-%d %H:%M"),
                summary.extracted,
                summary.decision,
                summary.rows_written
            );
            Ok(())
        }
        Commands::Stats => {
            let cfg = Config::from_env();
            let warehouse = SqliteWarehouse::new(cfg.db_path());
            match warehouse.stats(&cfg.table)? {
                Some(stats) => {
                    println!("Dataset:     {}", warehouse.db_path().display());
                    println!("Table:       {}", cfg.table);
                    println!("Rows:        {}", stats.row_count);
                    println!(
                        "Newest load: {}",
                        stats.newest_load.as_deref().unwrap_or("-")
                    );
                }
                None => println!("No data yet. Run 'run' first."),
            }
            Ok(())
        }
        Commands::Overview { limit, json } => {
            let cfg = Config::from_env();
            let warehouse = SqliteWarehouse::new(cfg.db_path());
            let rows = warehouse.fetch_overview(&cfg.table, limit)?;
            if rows.is_empty() {
                println!("No articles stored. Run 'run' first.");
                return Ok(());
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }

            println!(
                "{:>3} | {:<52} | {:<16} | {:>5} | {:<24}",
                "#", "Title", "Kicker", "Words", "Locations"
            );
            println!("{}", "-".repeat(112));
            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<52} | {:<16} | {:>5} | {:<24}",
                    i + 1,
                    truncate(&r.title, 52),
                    truncate(&r.kicker, 16),
                    r.title_word_count,
                    truncate(&r.locations, 24),
                );
            }
            println!("\n{} articles | loaded_at newest first", rows.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
