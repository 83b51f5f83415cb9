use std::fmt::Write as _;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;

use allocation_engine::{AllocationFinder, EngineConfig};
use allocation_model::{Instance, PlayerSpec};
use case_store::{
    DEFAULT_FAILED_CASE_FILE, DEFAULT_PHASE2_CASE_FILE, FailedCaseStore, Phase2CaseStore,
    StoredPlayer,
};
use instance_gen::{DEFAULT_BASE_EPSILON, DEFAULT_VALUE_RANGE, random_case};

mod report;

#[derive(Parser)]
#[command(name = "efx", about = "Search for EFX allocations among four agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the finder on one random instance
    Run {
        #[arg(long, default_value_t = 8)]
        goods: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run random instances back to back, stopping at the first failure
    Batch {
        #[arg(long, default_value_t = 8)]
        goods: usize,
        #[arg(long, default_value_t = 100)]
        cases: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run the finder on an instance loaded from a JSON file
    Manual {
        #[arg(long)]
        file: PathBuf,
    },
    /// Manage stored failing cases
    Failed {
        #[command(subcommand)]
        action: FailedAction,
    },
    /// Manage stored redistribution cases
    Phase2 {
        #[command(subcommand)]
        action: Phase2Action,
    },
    /// Show the engine configuration in effect
    Config,
}

#[derive(Subcommand)]
enum FailedAction {
    /// List stored failing cases
    List,
    /// Re-run one stored case, or all of them
    Run {
        #[arg(long)]
        id: Option<usize>,
    },
    /// Delete one stored case
    Delete {
        #[arg(long)]
        id: usize,
    },
    /// Delete every stored case
    Clear,
}

#[derive(Subcommand)]
enum Phase2Action {
    /// List stored redistribution cases
    List,
    /// Re-run one stored case
    Run {
        #[arg(long)]
        id: usize,
    },
    /// Delete one stored case
    Delete {
        #[arg(long)]
        id: usize,
    },
    /// Delete every stored case
    Clear,
}

#[derive(Deserialize)]
struct ManualCase {
    goods: Vec<String>,
    players: Vec<PlayerSpec>,
}

struct Stores {
    failed: FailedCaseStore,
    phase2: Phase2CaseStore,
}

impl Stores {
    fn open() -> Self {
        Self {
            failed: FailedCaseStore::new(DEFAULT_FAILED_CASE_FILE),
            phase2: Phase2CaseStore::new(DEFAULT_PHASE2_CASE_FILE),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(out) => println!("{out}"),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

fn run(command: Command) -> Result<String, String> {
    let stores = Stores::open();
    match command {
        Command::Run { goods, seed } => {
            let mut rng = seeded_rng(seed);
            let case = random_case(goods, DEFAULT_VALUE_RANGE, DEFAULT_BASE_EPSILON, &mut rng);
            execute_case(&case.goods, &case.players, "single", &stores)
        }
        Command::Batch { goods, cases, seed } => run_batch(goods, cases, seed, &stores),
        Command::Manual { file } => {
            let text = std::fs::read_to_string(&file)
                .map_err(|e| format!("failed to read {}: {e}", file.display()))?;
            let case: ManualCase = serde_json::from_str(&text)
                .map_err(|e| format!("failed to parse {}: {e}", file.display()))?;
            execute_case(&case.goods, &case.players, "manual", &stores)
        }
        Command::Failed { action } => run_failed(action, &stores),
        Command::Phase2 { action } => run_phase2(action, &stores),
        Command::Config => Ok(render_config(&EngineConfig::default())),
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Builds the instance, runs the finder, persists what the run revealed:
/// failing instances go to the failed store, runs that needed redistribution
/// go to the phase-2 store with their diagnostics.
fn execute_case(
    goods: &[String],
    players: &[PlayerSpec],
    test_mode: &str,
    stores: &Stores,
) -> Result<String, String> {
    let config = EngineConfig::default();
    let instance = Instance::new(goods.to_vec(), players.to_vec(), config.normalization_target)
        .map_err(|e| e.to_string())?;

    match AllocationFinder::new(&instance, config).find() {
        Ok(outcome) => {
            let mut out = report::render_run_report(&instance, &outcome);
            if outcome.phase2.executed {
                let id = stores
                    .phase2
                    .append(
                        goods,
                        &to_stored(players),
                        test_mode,
                        outcome.phase2.clone(),
                    )
                    .map_err(|e| e.to_string())?;
                let _ = write!(out, "\nstored redistribution case #{id}");
            }
            Ok(out)
        }
        Err(error) => {
            let count = stores
                .failed
                .append(goods, &to_stored(players), test_mode)
                .map_err(|e| e.to_string())?;
            Err(format!(
                "allocation search failed: {error}\nstored failing case #{count}"
            ))
        }
    }
}

fn run_batch(
    goods: usize,
    cases: usize,
    seed: Option<u64>,
    stores: &Stores,
) -> Result<String, String> {
    let mut rng = seeded_rng(seed);
    let mut efx_found = 0usize;
    let mut phase2_runs = 0usize;

    for case_number in 1..=cases {
        let case = random_case(goods, DEFAULT_VALUE_RANGE, DEFAULT_BASE_EPSILON, &mut rng);
        let config = EngineConfig::default();
        let instance = Instance::new(
            case.goods.clone(),
            case.players.clone(),
            config.normalization_target,
        )
        .map_err(|e| e.to_string())?;

        match AllocationFinder::new(&instance, config).find() {
            Ok(outcome) => {
                if outcome.efx {
                    efx_found += 1;
                }
                if outcome.phase2.executed {
                    phase2_runs += 1;
                    stores
                        .phase2
                        .append(
                            &case.goods,
                            &to_stored(&case.players),
                            "continuous",
                            outcome.phase2.clone(),
                        )
                        .map_err(|e| e.to_string())?;
                }
            }
            Err(error) => {
                let count = stores
                    .failed
                    .append(&case.goods, &to_stored(&case.players), "continuous")
                    .map_err(|e| e.to_string())?;
                return Err(format!(
                    "case {case_number}/{cases} failed: {error}\n\
                     stored failing case #{count}\n\
                     {efx_found} EFX results and {phase2_runs} redistribution runs before the failure"
                ));
            }
        }
    }
    Ok(format!(
        "{cases} cases completed: {efx_found} EFX, {phase2_runs} needed redistribution"
    ))
}

fn run_failed(action: FailedAction, stores: &Stores) -> Result<String, String> {
    match action {
        FailedAction::List => {
            let entries = stores.failed.load_all().map_err(|e| e.to_string())?;
            if entries.is_empty() {
                return Ok("no failing cases stored".to_string());
            }
            let mut out = String::new();
            for (index, case) in entries.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "#{} [{}] {} goods, mode {}",
                    index + 1,
                    case.timestamp,
                    case.num_goods,
                    case.test_mode
                );
            }
            Ok(out.trim_end().to_string())
        }
        FailedAction::Run { id: Some(id) } => {
            let case = stores
                .failed
                .get(id)
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("no failing case #{id}"))?;
            execute_case(&case.goods, &from_stored(&case.players), "replay", stores)
        }
        FailedAction::Run { id: None } => {
            let entries = stores.failed.load_all().map_err(|e| e.to_string())?;
            if entries.is_empty() {
                return Ok("no failing cases stored".to_string());
            }
            let mut out = String::new();
            let total = entries.len();
            let mut solved = 0usize;
            for (index, case) in entries.iter().enumerate() {
                let result =
                    execute_case(&case.goods, &from_stored(&case.players), "replay", stores);
                let verdict = match result {
                    Ok(_) => {
                        solved += 1;
                        "solved"
                    }
                    Err(_) => "still failing",
                };
                let _ = writeln!(out, "#{}: {verdict}", index + 1);
            }
            let _ = write!(out, "{solved}/{total} replays solved");
            Ok(out)
        }
        FailedAction::Delete { id } => {
            if stores.failed.delete(id).map_err(|e| e.to_string())? {
                Ok(format!("deleted failing case #{id}"))
            } else {
                Err(format!("no failing case #{id}"))
            }
        }
        FailedAction::Clear => {
            stores.failed.clear().map_err(|e| e.to_string())?;
            Ok("cleared failing cases".to_string())
        }
    }
}

fn run_phase2(action: Phase2Action, stores: &Stores) -> Result<String, String> {
    match action {
        Phase2Action::List => {
            let entries = stores.phase2.load_all().map_err(|e| e.to_string())?;
            if entries.is_empty() {
                return Ok("no redistribution cases stored".to_string());
            }
            let mut out = String::new();
            for case in &entries {
                let _ = writeln!(
                    out,
                    "#{} [{}] {} goods, mode {}, steps {}, efx {}",
                    case.id,
                    case.timestamp,
                    case.goods.len(),
                    case.test_mode,
                    case.phase2.steps,
                    if case.phase2.efx_achieved { "yes" } else { "no" }
                );
            }
            Ok(out.trim_end().to_string())
        }
        Phase2Action::Run { id } => {
            let case = stores
                .phase2
                .get(id)
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("no redistribution case #{id}"))?;
            execute_case(&case.goods, &from_stored(&case.players), "replay", stores)
        }
        Phase2Action::Delete { id } => {
            if stores.phase2.delete(id).map_err(|e| e.to_string())? {
                Ok(format!("deleted redistribution case #{id}"))
            } else {
                Err(format!("no redistribution case #{id}"))
            }
        }
        Phase2Action::Clear => {
            stores.phase2.clear().map_err(|e| e.to_string())?;
            Ok("cleared redistribution cases".to_string())
        }
    }
}

fn render_config(config: &EngineConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "normalization.target = {}", config.normalization_target);
    let _ = writeln!(out, "phase1a.tie_tolerance = {}", config.phase1a.tie_tolerance);
    let _ = writeln!(
        out,
        "phase1a.max_sacrifice_threshold = {}",
        config.phase1a.max_sacrifice_threshold
    );
    let _ = writeln!(
        out,
        "phase1a.top_options_to_consider = {}",
        config.phase1a.top_options_to_consider
    );
    let _ = write!(out, "phase1b.tie_tolerance = {}", config.phase1b.tie_tolerance);
    out
}

fn to_stored(players: &[PlayerSpec]) -> Vec<StoredPlayer> {
    players
        .iter()
        .map(|player| StoredPlayer {
            name: player.name.clone(),
            valuation: player.valuation.clone(),
        })
        .collect()
}

fn from_stored(players: &[StoredPlayer]) -> Vec<PlayerSpec> {
    players
        .iter()
        .map(|player| PlayerSpec {
            name: player.name.clone(),
            valuation: player.valuation.clone(),
        })
        .collect()
}
