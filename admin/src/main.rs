use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use stats_database::tasks::{convert_users, run_user_purge};
use stats_database::{open_store, NoopHooks, StoreConfig};
use stats_types::StatKey;

#[derive(Parser, Debug)]
#[command(about = "Inspect and maintain the player stats store")]
struct Params {
    /// YAML file with store settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database url, overrides the config file and STATS_DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show one leaderboard page
    Top {
        /// Skill name, or ALL for power level
        stat: StatKey,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        page_size: usize,
        #[arg(long)]
        json: bool,
    },
    /// Show a player's ranks
    Rank {
        name: String,
        #[arg(long)]
        json: bool,
    },
    /// Delete a player's record
    Remove { name: String },
    /// Purge powerless users and users past the configured cutoff
    Purge,
    /// Copy every record into the store described by another config file
    Convert {
        #[arg(long)]
        to: PathBuf,
    },
    /// Probe the backend
    Check,
}

fn read_yaml(path: Option<&PathBuf>) -> Result<Option<String>, std::io::Error> {
    path.map(std::fs::read_to_string).transpose()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Params::parse();
    log::info!("args: {args:?}");

    let config =
        StoreConfig::from_cli_or_env_or_yaml(args.database_url, read_yaml(args.config.as_ref())?)?;
    let store = open_store(&config, Arc::new(NoopHooks)).await?;

    match args.command {
        Command::Top {
            stat,
            page,
            page_size,
            json,
        } => {
            let entries = store.read_leaderboard(stat, page, page_size).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                let first = page.max(1).saturating_sub(1) * page_size;
                for (i, entry) in entries.iter().enumerate() {
                    println!("{:>4}. {}", first + i + 1, entry);
                }
            }
        }
        Command::Rank { name, json } => {
            let ranks = store.read_rank(&name).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&ranks)?);
            } else if ranks.is_empty() {
                println!("{name} is unranked");
            } else {
                for (stat, rank) in ranks.iter() {
                    println!("{stat}: #{rank}");
                }
            }
        }
        Command::Remove { name } => {
            if store.remove_record(&name).await {
                println!("Removed {name}");
            } else {
                println!("No record for {name}");
            }
        }
        Command::Purge => {
            let summary = run_user_purge(store.as_ref(), config.purge_cutoff()).await;
            println!(
                "Purged {} powerless and {} inactive users",
                summary.powerless.len(),
                summary.old.len()
            );
        }
        Command::Convert { to } => {
            let target_config =
                StoreConfig::from_yaml_str(&std::fs::read_to_string(&to)?)?;
            let target = open_store(&target_config, Arc::new(NoopHooks)).await?;
            let converted = convert_users(store.as_ref(), target.as_ref()).await;
            println!("Converted {converted} users");
        }
        Command::Check => {
            if store.health_check().await {
                println!("Store is reachable");
            } else {
                log::warn!("Store is unreachable");
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
