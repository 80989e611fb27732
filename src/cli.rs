use std::fs;
use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{AppConfig, ConfigError};
use crate::data::item::{index_metadata, ItemMeta, MetadataMap, TrinketCandidate};
use crate::data::profile::extract_trinkets_all;
use crate::jobs::{
    poll_until_terminal, JobError, JobQueue, JobState, PollOptions, SimInput, SimcRunner,
    SimulationBackend,
};
use crate::server;
use crate::server::api::LeaderboardResponse;
use crate::topgear::{
    apply_unique_flags, build_trinket_pair_profilesets, find_unique_conflicts,
    leaderboard_to_csv, ExportError, RankingSession, ReferenceMode,
};

const USAGE: &str = "usage: topgear <serve|parse|pairs|rank|run>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Serve,
    Parse,
    Pairs,
    Rank,
    Run,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("serve") => Some(Command::Serve),
        Some("parse") => Some(Command::Parse),
        Some("pairs") => Some(Command::Pairs),
        Some("rank") => Some(Command::Rank),
        Some("run") => Some(Command::Run),
        _ => None,
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not valid json: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("simulation failed: {0}")]
    SimFailed(String),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("failed to encode output: {0}")]
    Encode(serde_json::Error),
    #[error("server error: {0}")]
    Server(io::Error),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            _ => 1,
        }
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    let result = match parse_command(args) {
        Some(Command::Serve) => handle_serve(),
        Some(Command::Parse) => handle_parse(args),
        Some(Command::Pairs) => handle_pairs(args),
        Some(Command::Rank) => handle_rank(args),
        Some(Command::Run) => handle_run(args),
        None => Err(CliError::Usage(USAGE.to_string())),
    };
    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err}");
            err.exit_code()
        }
    }
}

/// Options that take a value; everything else after the command is a flag or positional.
const VALUE_OPTIONS: [&str; 2] = ["--reference", "--metadata"];

struct ParsedArgs<'a> {
    positional: Vec<&'a str>,
    options: Vec<(&'a str, &'a str)>,
    flags: Vec<&'a str>,
}

impl<'a> ParsedArgs<'a> {
    fn new(args: &'a [String]) -> Result<Self, CliError> {
        let mut parsed = Self {
            positional: Vec::new(),
            options: Vec::new(),
            flags: Vec::new(),
        };
        let mut rest = args.iter().skip(2).map(String::as_str);
        while let Some(arg) = rest.next() {
            if VALUE_OPTIONS.contains(&arg) {
                let value = rest
                    .next()
                    .ok_or_else(|| CliError::Usage(format!("{arg} needs a value")))?;
                parsed.options.push((arg, value));
            } else if arg.starts_with("--") {
                parsed.flags.push(arg);
            } else {
                parsed.positional.push(arg);
            }
        }
        Ok(parsed)
    }

    fn option(&self, name: &str) -> Option<&'a str> {
        self.options
            .iter()
            .rev()
            .find_map(|(key, value)| (*key == name).then_some(*value))
    }

    fn flag(&self, name: &str) -> bool {
        self.flags.contains(&name)
    }

    fn reference(&self) -> Result<ReferenceMode, CliError> {
        match self.option("--reference") {
            None => Ok(ReferenceMode::default()),
            Some(raw) => raw.parse().map_err(|err| CliError::Usage(format!("{err}"))),
        }
    }

    fn metadata(&self) -> Result<MetadataMap, CliError> {
        match self.option("--metadata") {
            None => Ok(MetadataMap::new()),
            Some(path) => {
                let items: Vec<ItemMeta> = read_json(path)?;
                Ok(index_metadata(items))
            }
        }
    }
}

fn read_text(path: &str) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_string(),
        source,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, CliError> {
    serde_json::from_str(&read_text(path)?).map_err(|source| CliError::Json {
        path: path.to_string(),
        source,
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::Encode)?;
    println!("{payload}");
    Ok(())
}

fn handle_serve() -> Result<(), CliError> {
    let config = AppConfig::load()?;
    server::run_server(&config).map_err(CliError::Server)
}

fn handle_parse(args: &[String]) -> Result<(), CliError> {
    let parsed = ParsedArgs::new(args)?;
    let [profile] = parsed.positional.as_slice() else {
        return Err(CliError::Usage(
            "usage: topgear parse <profile.simc> [--no-equipped]".to_string(),
        ));
    };
    let scan = extract_trinkets_all(&read_text(profile)?, !parsed.flag("--no-equipped"));
    print_json(&scan)
}

/// Candidates from a profile, uniqueness filled from metadata, conflicts reported on stderr.
fn load_candidates(profile_text: &str, metadata: &MetadataMap) -> Vec<TrinketCandidate> {
    let mut candidates = extract_trinkets_all(profile_text, true).trinkets;
    apply_unique_flags(&mut candidates, metadata);
    for conflict in find_unique_conflicts(&candidates) {
        eprintln!("warning: {}", conflict.message());
    }
    candidates
}

fn handle_pairs(args: &[String]) -> Result<(), CliError> {
    let parsed = ParsedArgs::new(args)?;
    let [profile] = parsed.positional.as_slice() else {
        return Err(CliError::Usage(
            "usage: topgear pairs <profile.simc> [--metadata items.json]".to_string(),
        ));
    };
    let text = read_text(profile)?;
    let candidates = load_candidates(&text, &parsed.metadata()?);
    let plan = build_trinket_pair_profilesets(&text, &candidates);
    eprintln!(
        "pairs={} skipped_equipped={} skipped_same_item={}",
        plan.pair_count, plan.skipped_equipped, plan.skipped_same_item
    );
    print!("{}", plan.text);
    Ok(())
}

fn print_leaderboard(session: &RankingSession, reference: ReferenceMode, csv: bool) -> Result<(), CliError> {
    let board = session.rank(reference);
    if csv {
        print!("{}", leaderboard_to_csv(&board)?);
        Ok(())
    } else {
        print_json(&LeaderboardResponse::new(session, board))
    }
}

fn handle_rank(args: &[String]) -> Result<(), CliError> {
    let parsed = ParsedArgs::new(args)?;
    let [report_path, profile] = parsed.positional.as_slice() else {
        return Err(CliError::Usage(
            "usage: topgear rank <report.json> <profile.simc> [--reference top|equipped] [--metadata items.json] [--csv]"
                .to_string(),
        ));
    };
    let reference = parsed.reference()?;
    let metadata = parsed.metadata()?;
    let report: serde_json::Value = read_json(report_path)?;
    let candidates = load_candidates(&read_text(profile)?, &metadata);

    let session = RankingSession::from_report(&report, &candidates, &metadata);
    print_leaderboard(&session, reference, parsed.flag("--csv"))
}

fn handle_run(args: &[String]) -> Result<(), CliError> {
    let parsed = ParsedArgs::new(args)?;
    let [profile] = parsed.positional.as_slice() else {
        return Err(CliError::Usage(
            "usage: topgear run <profile.simc> [--reference top|equipped] [--metadata items.json] [--csv]"
                .to_string(),
        ));
    };
    let reference = parsed.reference()?;
    let metadata = parsed.metadata()?;
    let config = AppConfig::load()?;
    let text = read_text(profile)?;
    let candidates = load_candidates(&text, &metadata);
    let plan = build_trinket_pair_profilesets(&text, &candidates);

    let queue = JobQueue::start(Arc::new(SimcRunner::new(config.simc_bin.clone())), 1);
    let job_id = queue.submit(SimInput {
        simc_text: plan.text,
        extra_args: Vec::new(),
    })?;
    tracing::info!(%job_id, pairs = plan.pair_count, "submitted pair sweep");

    let options = PollOptions {
        interval: config.poll_interval(),
        max_polls: None,
    };
    let status = poll_until_terminal(&queue, &job_id, options, |status| {
        tracing::debug!(%job_id, state = ?status.status, "job status");
    })?;
    if status.status == JobState::Failed {
        return Err(CliError::SimFailed(status.error.unwrap_or_default()));
    }

    let report = status.result.map(|output| output.json).unwrap_or_default();
    let session = RankingSession::from_report(&report, &candidates, &metadata);
    print_leaderboard(&session, reference, parsed.flag("--csv"))
}
