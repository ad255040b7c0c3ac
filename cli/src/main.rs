//! Caseflow reviewer CLI.
//!
//! Refreshes the case registry from the upstream API (falling back to the
//! local cache or the embedded sample dataset) and records review decisions.
//!
//! Usage:
//!   caseflow cases
//!   caseflow cases --status pending
//!   caseflow sample
//!   caseflow --config caseflow.toml clear-cache
//!   caseflow decide p1 --deny --diagnosis "no stroke" --plan observe
//!   caseflow --config caseflow.toml decide p2 --approve --diagnosis "ischemic stroke" \
//!       --plan "alteplase 0.9 mg/kg" --plan "neuro checks q15min"

use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use caseflow_audit::InMemoryDecisionLog;
use caseflow_client::HttpResourceClient;
use caseflow_contracts::{
    case::{Case, CaseStatus},
    consultation::ReviewOutcome,
    error::CaseflowResult,
    patient::PatientId,
};
use caseflow_core::{CaseCache, CaseflowConfig, FallbackStore, RefreshOutcome, ReviewDesk};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Caseflow: stroke case review desk.
#[derive(Parser)]
#[command(
    name = "caseflow",
    about = "Aggregate patient cases and record clinical review decisions",
    long_about = "Fetches identities, vitals, labs, consultations and eligibility for every\n\
                  patient, shows the assembled cases, and writes review decisions back\n\
                  with optimistic update and rollback."
)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Refresh and list cases.
    Cases {
        /// Only show cases with this review status.
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// Show the embedded sample dataset without contacting the API.
    Sample,
    /// Delete the local case cache, if one is configured.
    ClearCache,
    /// Refresh, then approve or deny a pending case.
    #[command(group(ArgGroup::new("verdict").required(true).args(["approve", "deny"])))]
    Decide {
        /// Patient id of the case.
        id: String,
        #[arg(long)]
        approve: bool,
        #[arg(long)]
        deny: bool,
        #[arg(long)]
        diagnosis: String,
        /// One treatment plan line; repeat for more.
        #[arg(long = "plan", required = true)]
        plan: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Pending,
    Approved,
    Denied,
}

impl From<StatusArg> for CaseStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => CaseStatus::Pending,
            StatusArg::Approved => CaseStatus::Approved,
            StatusArg::Denied => CaseStatus::Denied,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for per-request detail.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("caseflow: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CaseflowResult<()> {
    let config = match &cli.config {
        Some(path) => CaseflowConfig::from_file(path)?,
        None => CaseflowConfig::default(),
    };

    match cli.command {
        Command::Sample => {
            print_cases(&FallbackStore::new().sample());
            Ok(())
        }
        Command::ClearCache => {
            match &config.cache.path {
                Some(path) => {
                    CaseCache::new(path).clear()?;
                    println!("Removed case cache {}", path.display());
                }
                None => println!("No case cache configured."),
            }
            Ok(())
        }
        Command::Cases { status } => {
            let (desk, _) = build_desk(&config)?;
            let outcome = desk.refresh().await;
            print_refresh(&outcome);
            let cases = match status {
                Some(status) => desk.registry().by_status(status.into()),
                None => desk.registry().all().cases().to_vec(),
            };
            print_cases(&cases);
            Ok(())
        }
        Command::Decide { id, approve, diagnosis, plan, .. } => {
            let (desk, log) = build_desk(&config)?;
            let outcome = desk.refresh().await;
            print_refresh(&outcome);

            let verdict = if approve { ReviewOutcome::Approved } else { ReviewOutcome::Denied };
            let case_id = PatientId::new(id);
            desk.select(&case_id)?;
            let result = desk.decide(&case_id, verdict, &diagnosis, &plan).await;

            let exported = log.export_log();
            println!(
                "Decision log: {} record(s), chain {}, terminal hash {}",
                exported.events.len(),
                if log.verify_integrity() { "intact" } else { "BROKEN" },
                if exported.terminal_hash.is_empty() { "-" } else { exported.terminal_hash.as_str() },
            );

            let case = result?;
            println!("Recorded: {} is now {}", case.id, case.status);
            Ok(())
        }
    }
}

fn build_desk(config: &CaseflowConfig) -> CaseflowResult<(ReviewDesk, Arc<InMemoryDecisionLog>)> {
    let token = std::env::var(&config.api.token_env).ok();
    debug!(
        base_url = %config.api.base_url,
        token_present = token.is_some(),
        "building review desk"
    );
    let client = Arc::new(HttpResourceClient::new(&config.api, token)?);
    let log = Arc::new(InMemoryDecisionLog::new("caseflow-cli"));
    let desk = ReviewDesk::new(client, log.clone(), config);
    Ok((desk, log))
}

// ── Output ────────────────────────────────────────────────────────────────────

fn print_refresh(outcome: &RefreshOutcome) {
    println!("Loaded {} case(s) [{}]", outcome.case_count, outcome.origin);
    if let Some(reason) = &outcome.fallback_reason {
        println!("  Offline data: {}", reason);
    }
    for signal in &outcome.degraded {
        println!("  {}", signal);
    }
    println!();
}

fn print_cases(cases: &[Case]) {
    if cases.is_empty() {
        println!("No cases.");
        return;
    }
    println!(
        "{:<12} {:<24} {:>4} {:<8} {:<11} {:<9} {}",
        "ID", "NAME", "AGE", "GENDER", "ELIGIBLE", "STATUS", "NOTES"
    );
    for case in cases {
        let mut notes = Vec::new();
        if !case.is_writable() {
            notes.push(format!("read-only ({})", case.origin));
        }
        if let Some(vitals) = &case.vitals {
            if let Some(nihss) = vitals.severity_score {
                notes.push(format!("NIHSS {}", nihss));
            }
            if vitals.has_exclusion_flag() {
                notes.push("exclusion flag".to_string());
            }
        }
        if let Some(latest) = case.latest_consultation() {
            notes.push(format!("latest: {}", latest.diagnosis));
        }
        if let Some(signal) = case.degradation() {
            notes.push(signal.to_string());
        }
        println!(
            "{:<12} {:<24} {:>4} {:<8} {:<11} {:<9} {}",
            case.id,
            case.identity.name,
            case.identity.age,
            String::from(case.identity.gender.clone()),
            case.eligibility,
            case.status,
            notes.join("; "),
        );
    }
}
