use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use annals_core::clans::build_rolls;
use annals_core::dates::Era;
use annals_core::models::{MapData, People};
use annals_core::projection::{assign_burgh_pixels, Projection, SCOTLAND_CONTROL_POINTS};
use annals_core::store;
use annals_core::Resolver;

use annals_builder::castles::{CastlePipeline, CASTLE_INDEX_URL};
use annals_builder::fetch::HttpFetcher;
use annals_builder::tree::TreeBuilder;

#[derive(Parser, Debug)]
#[command(name = "annals-builder", version, about = "Offline data preparation for the historical map site")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extend the people artifact by walking Geni profiles from a root.
    ScrapeTree {
        /// Path to geni-profiles.json (created when missing)
        #[arg(long = "people", value_name = "PATH")]
        people_path: PathBuf,

        /// Root profile URL to walk from
        #[arg(long = "root", value_name = "URL")]
        root_url: String,
    },

    /// Scrape the Wikipedia castle lists into the castles artifact.
    ScrapeCastles {
        /// Output castles.json
        #[arg(long = "out", value_name = "PATH")]
        out_path: PathBuf,

        /// Index page to start from
        #[arg(long = "index", value_name = "URL", default_value = CASTLE_INDEX_URL)]
        index_url: String,

        /// Re-fetch every accepted castle instead of scraping new ones
        #[arg(long)]
        reprocess: bool,
    },

    /// Purge, infer, reconcile and check the people artifact.
    Resolve {
        #[arg(long = "people", value_name = "PATH")]
        people_path: PathBuf,

        /// Report violations without writing anything back
        #[arg(long)]
        check_only: bool,
    },

    /// Derive clan membership and title rosters from region ownership.
    Clans {
        #[arg(long = "map-data", value_name = "PATH")]
        map_data_path: PathBuf,

        #[arg(long = "out", value_name = "PATH")]
        out_path: PathBuf,
    },

    /// Project every burgh's lat/long onto base-map pixels.
    Project {
        #[arg(long = "map-data", value_name = "PATH")]
        map_data_path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_ansi(false).json().finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let cli = Cli::parse();
    let era = Era::default();

    match cli.command {
        Command::ScrapeTree { people_path, root_url } => {
            let mut people: People = if people_path.exists() {
                store::load_json(&people_path)
                    .with_context(|| format!("loading {}", people_path.display()))?
            } else {
                People::new()
            };

            let fetcher = HttpFetcher::new()?;
            let builder = TreeBuilder::new(&fetcher, era);
            let stats = builder.extend(&mut people, &root_url).await?;
            info!(?stats, "tree walk finished");

            store::backup(&people_path, "geni-profiles").context("backing up people")?;
            store::save_json_atomic(&people_path, &people).context("saving people")?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Command::ScrapeCastles { out_path, index_url, reprocess } => {
            let fetcher = HttpFetcher::new()?;
            let pipeline = CastlePipeline::new(&fetcher, era);
            let report = if reprocess {
                pipeline.reprocess(&out_path).await?
            } else {
                pipeline.run(&index_url, &out_path).await?
            };
            info!(accepted = report.accepted, skipped = report.skipped, review = report.review, "castle scrape finished");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Resolve { people_path, check_only } => {
            let mut people: People = store::load_json(&people_path)
                .with_context(|| format!("loading {}", people_path.display()))?;
            let resolver = Resolver::new(era);

            if check_only {
                let violations = resolver.check(&people)?;
                info!(count = violations.len(), "check finished");
                println!("{}", serde_json::to_string_pretty(&violations)?);
            } else {
                let report = resolver.run(&mut people)?;
                if !report.is_clean() {
                    warn!(count = report.violations.len(), "violations remain after reconciliation");
                }
                store::backup(&people_path, "geni-profiles").context("backing up people")?;
                store::save_json_atomic(&people_path, &people).context("saving people")?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }

        Command::Clans { map_data_path, out_path } => {
            let map_data: MapData = store::load_json(&map_data_path)
                .with_context(|| format!("loading {}", map_data_path.display()))?;
            let rolls = build_rolls(&map_data);
            info!(clans = rolls.clan_map.len(), members = rolls.title_map.len(), "built clan rolls");
            store::save_json_atomic(&out_path, &rolls).context("saving clan rolls")?;
        }

        Command::Project { map_data_path } => {
            let mut map_data: MapData = store::load_json(&map_data_path)
                .with_context(|| format!("loading {}", map_data_path.display()))?;

            let projection = Projection::default();
            if let Some(worst) = projection.max_residual(&SCOTLAND_CONTROL_POINTS) {
                info!(
                    distance_px = worst.distance,
                    lat = worst.point.latitude,
                    lon = worst.point.longitude,
                    "worst control point residual"
                );
            }

            let updated = assign_burgh_pixels(&mut map_data, &projection);
            info!(updated, "assigned burgh pixels");

            store::backup(&map_data_path, "map-data").context("backing up map data")?;
            store::save_json_atomic(&map_data_path, &map_data).context("saving map data")?;
        }
    }

    Ok(())
}
