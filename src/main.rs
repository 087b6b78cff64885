mod api;
mod server;

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::api::{ApiDayRequest, ApiPlanRequest};
use supporter_alloc::{
    calibration::{CalibrationMetrics, CalibrationRunner, CalibrationSample, ReachModelFitter},
    format_float, format_number, format_percent,
    store::{AssignmentStore, ProposalStore},
    user::{generate_synthetic_pool, generate_synthetic_targets},
    AdjacencyMatrix, AllocationStrategy, BatchAssignment, BatchSummary, EngineConfig,
    GreedyBlendedScore, Proposal, ReachModel, SupporterPool,
};

#[derive(Parser)]
#[command(name = "supporter-alloc", about = "Supporter allocation and reach estimation engine")]
struct Cli {
    /// Path to an engine TOML config (defaults to ENGINE_CONFIG_PATH or config/engine.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    Estimate(EstimateArgs),
    Plan(PlanArgs),
    AllocateDay(AllocateDayArgs),
    ResetDay(ResetDayArgs),
    Calibrate(CalibrateArgs),
    Demo(DemoArgs),
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
struct EstimateArgs {
    #[arg(long)]
    followers: f64,
    #[arg(long)]
    cap: Option<u64>,
    #[arg(long)]
    round_to: Option<i64>,
}

#[derive(Args, Debug, Clone)]
struct PlanArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    save: bool,
}

#[derive(Args, Debug, Clone)]
struct AllocateDayArgs {
    #[arg(long)]
    date: String,
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug, Clone)]
struct ResetDayArgs {
    #[arg(long)]
    date: String,
}

#[derive(Args, Debug, Clone)]
struct CalibrateArgs {
    #[arg(long)]
    samples: PathBuf,
    /// Write the fitted config to this path.
    #[arg(long)]
    write: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct DemoArgs {
    #[arg(long, default_value_t = 200)]
    size: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 8)]
    targets: usize,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            size: 200,
            seed: 42,
            targets: 8,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    load_dotenv();
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();
    let (config, config_path) = EngineConfig::load(cli.config)?;
    init_tracing(&config.log_level)?;
    if let Some(path) = config_path.as_ref().filter(|path| path.exists()) {
        tracing::debug!(path = %path.display(), "loaded engine config");
    }

    let command = cli.command.unwrap_or(Command::Demo(DemoArgs::default()));
    match command {
        Command::Estimate(args) => run_estimate(args, &config),
        Command::Plan(args) => run_plan(args, &config).await,
        Command::AllocateDay(args) => run_allocate_day(args, &config).await,
        Command::ResetDay(args) => run_reset_day(args, &config).await,
        Command::Calibrate(args) => run_calibrate(args, config),
        Command::Demo(args) => run_demo(args, &config),
        Command::Serve(args) => server::serve(args, config).await,
    }
}

fn run_estimate(args: EstimateArgs, config: &EngineConfig) -> Result<(), String> {
    let model = ReachModel::new(config.reach.clone());
    let cap = args.cap.or(config.reach.network_cap);
    let round_to = args.round_to.unwrap_or(config.reach.round_to);
    let estimate = model
        .estimate(args.followers, cap, round_to)
        .ok_or_else(|| format!("invalid follower count: {}", args.followers))?;

    println!("Followers: {}", format_number(estimate.followers as f64));
    println!(
        "Reach: conservative {} | median {} | aggressive {}",
        format_number(estimate.conservative as f64),
        format_number(estimate.median as f64),
        format_number(estimate.aggressive as f64)
    );
    println!("Reach per follower: {}", format_float(estimate.reach_per_follower, 3));
    if estimate.extrapolated {
        println!("Note: follower count is above the fitted range; treat as extrapolated.");
    }
    Ok(())
}

async fn run_plan(args: PlanArgs, config: &EngineConfig) -> Result<(), String> {
    let request: ApiPlanRequest = read_json_file(&args.input)?;
    let (pool, ingest) = SupporterPool::from_records(&request.supporters);
    let strategy = strategy_for(config, request.adjacency);
    let proposal = strategy.plan(&request.target, &pool);

    println!(
        "Supporters: {} accepted, {} rejected",
        ingest.accepted,
        ingest.rejected.len()
    );
    print_proposal(&proposal);

    if args.save || request.save.unwrap_or(false) {
        let store = ProposalStore::load(config.server.proposals_path())
            .await
            .map_err(|err| err.to_string())?;
        let stored = store.add(proposal).await.map_err(|err| err.to_string())?;
        println!("\nSaved proposal {}", stored.id);
    }
    Ok(())
}

async fn run_allocate_day(args: AllocateDayArgs, config: &EngineConfig) -> Result<(), String> {
    let queue_date = parse_date(&args.date)?;
    let request: ApiDayRequest = read_json_file(&args.input)?;
    let (pool, _) = SupporterPool::from_records(&request.supporters);
    let strategy = strategy_for(config, request.adjacency);
    let dry_run = args.dry_run || request.dry_run.unwrap_or(false);

    let assignments = if dry_run {
        strategy.allocate_day(queue_date, &request.targets, &pool)
    } else {
        let store = AssignmentStore::load(config.server.assignments_path())
            .await
            .map_err(|err| err.to_string())?;
        store
            .run_day(queue_date, || strategy.allocate_day(queue_date, &request.targets, &pool))
            .await
            .map_err(|err| err.to_string())?
    };

    let summary = BatchSummary::from_assignments(queue_date, &request.targets, &assignments);
    print_day(&summary, &assignments);
    if dry_run {
        println!("\nDry run: nothing recorded.");
    }
    Ok(())
}

async fn run_reset_day(args: ResetDayArgs, config: &EngineConfig) -> Result<(), String> {
    let queue_date = parse_date(&args.date)?;
    let store = AssignmentStore::load(config.server.assignments_path())
        .await
        .map_err(|err| err.to_string())?;
    let removed = store.reset_day(queue_date).await.map_err(|err| err.to_string())?;
    if removed {
        println!("Reset assignments for {}", queue_date);
    } else {
        println!("No assignments recorded for {}", queue_date);
    }
    Ok(())
}

fn run_calibrate(args: CalibrateArgs, mut config: EngineConfig) -> Result<(), String> {
    let samples: Vec<CalibrationSample> = read_json_file(&args.samples)?;
    let runner = CalibrationRunner::new(samples.clone());

    println!("Current model:");
    print_metrics(&runner.compute_metrics(&config.reach));

    let fitted = ReachModelFitter::new(samples)
        .fit(&config.reach)
        .ok_or_else(|| "not enough usable samples to fit the reach model".to_string())?;

    println!(
        "\nFitted model: coefficient {} | exponent {} | residuals {} / {}",
        format_float(fitted.coefficient, 2),
        format_float(fitted.exponent, 4),
        format_float(fitted.low_log_residual, 3),
        format_float(fitted.high_log_residual, 3)
    );
    print_metrics(&runner.compute_metrics(&fitted));

    if let Some(path) = args.write {
        config.reach = fitted;
        config.write(&path)?;
        println!("\nWrote config to {}", path.display());
    }
    Ok(())
}

fn run_demo(args: DemoArgs, config: &EngineConfig) -> Result<(), String> {
    let records = generate_synthetic_pool(args.size, args.seed);
    let (pool, ingest) = SupporterPool::from_records(&records);
    let targets = generate_synthetic_targets(args.targets, args.size, args.seed);
    let strategy = GreedyBlendedScore::from_config(config);

    println!(
        "Synthetic pool: {} supporters ({} eligible, {} rejected), {} credits",
        format_number(pool.len() as f64),
        format_number(pool.eligible_count() as f64),
        ingest.rejected.len(),
        format_number(pool.total_credits() as f64)
    );

    let target = targets
        .first()
        .ok_or_else(|| "demo needs at least one target".to_string())?;
    println!(
        "\nPlanning {} ({}, desired reach {})",
        target.id,
        target.genre.family,
        format_number(target.desired_reach as f64)
    );
    print_proposal(&strategy.plan(target, &pool));

    let queue_date = Utc::now().date_naive();
    let assignments = strategy.allocate_day(queue_date, &targets, &pool);
    println!();
    print_day(&BatchSummary::from_assignments(queue_date, &targets, &assignments), &assignments);
    Ok(())
}

fn strategy_for(config: &EngineConfig, adjacency: Option<AdjacencyMatrix>) -> GreedyBlendedScore {
    match adjacency {
        None => GreedyBlendedScore::from_config(config),
        Some(matrix) => {
            let mut config = config.clone();
            config.adjacency = Some(matrix);
            GreedyBlendedScore::from_config(&config)
        }
    }
}

fn print_proposal(proposal: &Proposal) {
    println!(
        "Proposal for {}: {} supporters | reach {} | credits {}",
        proposal.target_id,
        proposal.entries.len(),
        format_number(proposal.total_reach as f64),
        format_number(proposal.total_credits as f64)
    );
    if let Some(mean) = proposal.mean_compatibility() {
        println!("Mean compatibility: {}", format_percent(mean));
    }
    for entry in &proposal.entries {
        println!(
            "  {} reach {} | compatibility {} | credits {}",
            entry.supporter_id,
            format_number(entry.estimated_reach as f64),
            format_float(entry.compatibility_score, 2),
            entry.credits_required
        );
    }
    if !proposal.conflicts.is_empty() {
        println!("\nConflicts:");
        for conflict in &proposal.conflicts {
            println!("- {}", conflict);
        }
    }
    if !proposal.recommendations.is_empty() {
        println!("\nRecommendations:");
        for recommendation in &proposal.recommendations {
            println!("- {}", recommendation);
        }
    }
}

fn print_day(summary: &BatchSummary, assignments: &[BatchAssignment]) {
    println!(
        "Queue {}: {} of {} targets filled | {} assignments | {} credits",
        summary.queue_date,
        summary.targets_filled,
        summary.targets_total,
        summary.assignments,
        summary.credits_allocated
    );
    for assignment in assignments {
        println!(
            "  #{} {} -> {} ({} credits)",
            assignment.position,
            assignment.supporter_id,
            assignment.target_id,
            assignment.credits_allocated
        );
    }
    if !summary.skipped_target_ids.is_empty() {
        println!("Skipped: {}", summary.skipped_target_ids.join(", "));
    }
}

fn print_metrics(metrics: &CalibrationMetrics) {
    println!(
        "  samples {} | log correlation {} | median abs log error {} | band coverage {} | extrapolated {}",
        metrics.sample_count,
        format_float(metrics.log_correlation, 3),
        format_float(metrics.median_abs_log_error, 3),
        format_percent(metrics.band_coverage),
        format_percent(metrics.extrapolated_share)
    );
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|err| format!("invalid date {} (expected YYYY-MM-DD): {}", value, err))
}

fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
    serde_json::from_str(&contents)
        .map_err(|err| format!("failed to parse {}: {}", path.display(), err))
}

fn init_tracing(log_level: &str) -> Result<(), String> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|err| format!("invalid log level {}: {}", log_level, err))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn load_dotenv() {
    let _ = dotenvy::dotenv();
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let manifest_path = Path::new(manifest_dir).join(".env");
    let _ = dotenvy::from_path(manifest_path);
}
