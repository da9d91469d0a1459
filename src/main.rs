use clap::{Parser, Subcommand};
use color_eyre::Result;
use courtside::cache::SqliteStorage;
use courtside::config::Config;
use courtside::nba::{CachedNbaClient, GamesQuery};
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "courtside")]
#[command(about = "NBA stats from the command line, cached locally")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/courtside/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Skip cached responses and always hit the API
  #[arg(short, long, global = true)]
  refresh: bool,

  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List all teams
  Teams,
  /// Show a single team
  Team { id: u64 },
  /// List games
  Games {
    /// Game date (YYYY-MM-DD)
    #[arg(long)]
    date: Option<String>,
    /// Team id
    #[arg(long)]
    team: Option<u64>,
  },
  /// Show a single game
  Game { id: u64 },
  /// Show box score statistics for a game
  GameStats { id: u64 },
  /// List players
  Players {
    /// Team id
    #[arg(long)]
    team: Option<u64>,
  },
  /// Show a single player
  Player { id: u64 },
  /// Show standings
  Standings {
    /// "east" or "west"
    #[arg(long)]
    conference: Option<String>,
  },
  /// Remove superseded cache rows, keeping the latest per request
  Prune,
  /// Show cache row counts
  Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _guard = courtside::logging::init(config.log_file.as_deref(), args.verbose)?;

  let client = || -> Result<CachedNbaClient> {
    Ok(CachedNbaClient::new(&config)?.with_force_refresh(args.refresh))
  };

  let payload: Value = match args.command {
    Command::Teams => client()?.get_teams().await?,
    Command::Team { id } => client()?.get_team(id).await?,
    Command::Games { date, team } => {
      client()?
        .get_games(&GamesQuery {
          date,
          team_id: team,
        })
        .await?
    }
    Command::Game { id } => client()?.get_game_details(id).await?,
    Command::GameStats { id } => client()?.get_game_statistics(id).await?,
    Command::Players { team } => client()?.get_players(team).await?,
    Command::Player { id } => client()?.get_player(id).await?,
    Command::Standings { conference } => client()?.get_standings(conference.as_deref()).await?,
    Command::Prune => {
      let removed = SqliteStorage::from_config(&config.cache)?.prune()?;
      info!(removed, "Pruned cache");
      serde_json::json!({ "removed": removed })
    }
    Command::Stats => {
      let stats = SqliteStorage::from_config(&config.cache)?.stats()?;
      serde_json::json!({
        "rows": stats.rows,
        "keys": stats.keys,
        "fresh_rows": stats.fresh_rows,
      })
    }
  };

  println!("{}", serde_json::to_string_pretty(&payload)?);
  Ok(())
}
