use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;

use hoopslab::logging::init_logging;
use hoopslab::{ApiError, ApiResult, HoopsApi, Settings, SqliteStore};

const USAGE: &str = "\
usage: hoopslab [--db PATH] <command> [args...]

commands:
  health
  search <query>
  player <id> [--season S]
  comps <id> --season S [--k N]
  compare <idA> <idB> --season S
  player-shot-profile <id> --season S
  translation <id> --season S
  team <id> [--season S]
  play-style <id> --season S
  fatigue <id> --season S
  team-shot-profile <id> --season S
  lineup <team> --season S --players a,b,c,d,e
  lineup-snapshots <team> --season S
  games [--season S] [--league L] [--limit N]
  game <id>
  game-fatigue <id>
  game-momentum <id>
  leaderboard <gravity|clutch|translation> --season S";

/// Flags that take a value; everything else is positional.
const VALUE_FLAGS: &[&str] = &["db", "season", "k", "league", "limit", "players"];

fn main() -> ExitCode {
    init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = CliArgs::parse(std::env::args().skip(1).collect());
    let Some(command) = args.positional.first().cloned() else {
        eprintln!("{USAGE}");
        return Ok(ExitCode::from(64));
    };

    let mut settings = Settings::from_env();
    if let Some(path) = args.flag("db") {
        settings.db_path = Some(PathBuf::from(path));
    }
    let db_path = settings
        .db_path
        .clone()
        .context("unable to resolve sqlite path")?;
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("opening store at {}", db_path.display()))?;
    let api = HoopsApi::new(store, settings);

    let arg = |idx: usize| args.arg(idx, &command);
    let season = args.flag("season");

    let outcome = match command.as_str() {
        "health" => emit(Ok(api.health())),
        "search" => emit(api.search_players(arg(1)?)),
        "player" => emit(api.player(arg(1)?, season)),
        "comps" => emit(api.player_comps(arg(1)?, season, args.flag("k"))),
        "compare" => emit(api.compare(Some(arg(1)?), Some(arg(2)?), season)),
        "player-shot-profile" => emit(api.player_shot_profile(arg(1)?, season)),
        "translation" => emit(api.player_translation(arg(1)?, season)),
        "team" => emit(api.team(arg(1)?, season)),
        "play-style" => emit(api.team_play_style(arg(1)?, season)),
        "fatigue" => emit(api.team_fatigue(arg(1)?, season)),
        "team-shot-profile" => emit(api.team_shot_profile(arg(1)?, season)),
        "lineup" => emit(api.lineup_impact(arg(1)?, season, args.flag("players"))),
        "lineup-snapshots" => emit(api.lineup_snapshots(arg(1)?, season)),
        "games" => emit(api.games(season, args.flag("league"), args.flag("limit"))),
        "game" => emit(api.game(arg(1)?)),
        "game-fatigue" => emit(api.game_fatigue_flags(arg(1)?)),
        "game-momentum" => emit(api.game_momentum(arg(1)?)),
        "leaderboard" => match arg(1)? {
            "gravity" => emit(api.gravity_leaderboard(season)),
            "clutch" => emit(api.clutch_leaderboard(season)),
            "translation" => emit(api.translation_leaderboard(season)),
            other => return Err(anyhow!("unknown leaderboard: {other}")),
        },
        other => {
            eprintln!("unknown command: {other}\n\n{USAGE}");
            return Ok(ExitCode::from(64));
        }
    };

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(ApiError::NotFound(msg)) => {
            eprintln!("not found: {msg}");
            Ok(ExitCode::from(2))
        }
        Err(ApiError::InvalidInput(msg)) => {
            eprintln!("invalid input: {msg}");
            Ok(ExitCode::from(64))
        }
        Err(err) => Err(err).context(format!("{command} failed")),
    }
}

fn emit<T: Serialize>(result: ApiResult<T>) -> ApiResult<()> {
    let payload = result?;
    match serde_json::to_string_pretty(&payload) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to encode payload: {err}"),
    }
    Ok(())
}

struct CliArgs {
    positional: Vec<String>,
    flags: Vec<(String, String)>,
}

impl CliArgs {
    fn parse(args: Vec<String>) -> Self {
        let mut positional = Vec::new();
        let mut flags = Vec::new();
        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            if !arg.starts_with("--") {
                positional.push(arg);
                continue;
            }
            let name = &arg[2..];
            if let Some((key, value)) = name.split_once('=') {
                flags.push((key.to_string(), value.trim().to_string()));
            } else if VALUE_FLAGS.contains(&name) {
                if let Some(value) = iter.next() {
                    flags.push((name.to_string(), value.trim().to_string()));
                }
            } else {
                flags.push((name.to_string(), String::new()));
            }
        }
        Self { positional, flags }
    }

    fn arg(&self, idx: usize, command: &str) -> Result<&str> {
        self.positional
            .get(idx)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("{command}: missing argument #{idx}\n\n{USAGE}"))
    }

    fn flag(&self, name: &str) -> Option<&str> {
        self.flags
            .iter()
            .rev()
            .find(|(key, value)| key == name && !value.is_empty())
            .map(|(_, value)| value.as_str())
    }
}
