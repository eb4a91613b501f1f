//! CLI command definitions for ci-forge.
//!
//! - `bench`: generate, correct, test and score workflows for a dataset
//! - `test-workflows`: functionally test the ground-truth workflows only
//! - `lint`: run the syntax checker and the vulnerability scanner on one file
//! - `action`: print the `action.yml` metadata of a published action

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use serde_json::json;
use tracing::info;

use crate::batch::{self, BatchConfig, BatchDriver, DEFAULT_WORKERS};
use crate::correction::{CorrectionConfig, CorrectionPipeline, DEFAULT_JUDGE_MODEL, DEFAULT_RETRIES};
use crate::lint::{Actionlint, ValidationGateway, Zizmor};
use crate::llm::{CompletionGate, LiteLlmClient, LlmProvider, DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_MODEL};
use crate::sandbox::{FunctionalTestRunner, RunnerConfig};
use crate::scoring::{write_results, ScoreAggregator};
use crate::tools::{ActionDetails, RAW_GITHUB_BASE};
use crate::workflow::{load_dataset, WorkItem, WorkflowYaml};

const DEFAULT_DATASETS_DIR: &str = "./datasets";
const DEFAULT_REPOSITORIES_DIR: &str = "./repositories";
const DEFAULT_RESULTS_DIR: &str = "./results";
const DEFAULT_LOGS_DIR: &str = "./logs";

/// Evaluation harness for LLM-generated GitHub Actions workflows.
#[derive(Parser)]
#[command(name = "ci-forge")]
#[command(about = "Generate, correct and score GitHub Actions workflows")]
#[command(version)]
#[command(
    long_about = "ci-forge generates GitHub Actions workflows from natural-language prompts, repairs them through syntax, intent and vulnerability correction phases, runs them with act and scores them against the ground truth.\n\nExample usage:\n  ci-forge bench --dataset invalids --workers 8 --prompt-level 2"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the full evaluation over a dataset.
    Bench(Box<BenchArgs>),

    /// Functionally test the ground-truth workflows of a dataset.
    #[command(name = "test-workflows")]
    TestWorkflows(TestWorkflowsArgs),

    /// Check a single workflow file and print the reports as JSON.
    Lint(LintArgs),

    /// Print the metadata of an action referenced by a `uses:` value.
    Action(ActionArgs),
}

/// Dataset selection shared by the batch commands.
#[derive(clap::Args, Debug, Clone)]
pub struct DatasetArgs {
    /// Dataset name, loaded from `<datasets>/<name>.jsonl`.
    #[arg(short, long)]
    pub dataset: String,

    /// Directory holding the datasets.
    #[arg(long, default_value = DEFAULT_DATASETS_DIR)]
    pub datasets: PathBuf,

    /// Directory holding one checkout per repository.
    #[arg(long, default_value = DEFAULT_REPOSITORIES_DIR)]
    pub repositories: PathBuf,

    /// Only process the first N items.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Number of items processed concurrently.
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Directory receiving the result files.
    #[arg(long, default_value = DEFAULT_RESULTS_DIR)]
    pub results: PathBuf,
}

impl DatasetArgs {
    fn load(&self) -> anyhow::Result<Vec<WorkItem>> {
        let mut items = load_dataset(&self.datasets, &self.dataset)?;
        if let Some(limit) = self.limit {
            items.truncate(limit);
        }
        if items.is_empty() {
            anyhow::bail!("Dataset '{}' has no items to process", self.dataset);
        }
        Ok(items)
    }
}

/// Options of the `act` sandbox.
#[derive(clap::Args, Debug, Clone)]
pub struct ActArgs {
    /// Path to the `act` binary.
    #[arg(long, default_value = "act")]
    pub act_path: PathBuf,

    /// Timeout of each `act` phase in seconds.
    #[arg(long, default_value = "300")]
    pub timeout: u64,
}

impl ActArgs {
    fn runner(&self) -> FunctionalTestRunner {
        FunctionalTestRunner::new(
            RunnerConfig::new()
                .with_act_path(&self.act_path)
                .with_timeout(Duration::from_secs(self.timeout)),
        )
    }
}

/// Arguments for `ci-forge bench`.
#[derive(Parser, Debug)]
pub struct BenchArgs {
    #[command(flatten)]
    pub data: DatasetArgs,

    #[command(flatten)]
    pub act: ActArgs,

    /// Prompt detail level (1, 2 or 3).
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub prompt_level: u8,

    /// Model used by the generator and the correctors.
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Model used by the judge.
    #[arg(long, default_value = DEFAULT_JUDGE_MODEL)]
    pub judge_model: String,

    /// Retry budget of each correction phase.
    #[arg(long, default_value_t = DEFAULT_RETRIES)]
    pub retries: u32,

    /// Maximum number of in-flight LLM requests across all workers.
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT_REQUESTS)]
    pub max_llm_concurrency: usize,

    /// Do not enrich generation prompts with repository context.
    #[arg(long)]
    pub no_repo_context: bool,

    /// Directory receiving per-item storylines.
    #[arg(long, default_value = DEFAULT_LOGS_DIR)]
    pub logs: PathBuf,

    /// OpenRouter API key (can also be set via OPENROUTER_API_KEY env var).
    /// Falls back to LITELLM_API_BASE / LITELLM_API_KEY when absent.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

/// Arguments for `ci-forge test-workflows`.
#[derive(Parser, Debug)]
pub struct TestWorkflowsArgs {
    #[command(flatten)]
    pub data: DatasetArgs,

    #[command(flatten)]
    pub act: ActArgs,
}

/// Arguments for `ci-forge lint`.
#[derive(Parser, Debug)]
pub struct LintArgs {
    /// Workflow file to check.
    pub file: PathBuf,

    /// Path to the `actionlint` binary.
    #[arg(long, default_value = "actionlint")]
    pub actionlint: PathBuf,

    /// Path to the `zizmor` binary.
    #[arg(long, default_value = "zizmor")]
    pub zizmor: PathBuf,
}

/// Arguments for `ci-forge action`.
#[derive(Parser, Debug)]
pub struct ActionArgs {
    /// Action reference, e.g. `actions/checkout@v4`.
    pub uses: String,

    /// Host serving raw repository files.
    #[arg(long, default_value = RAW_GITHUB_BASE)]
    pub base_url: String,
}

/// Parse CLI arguments and return the Cli struct.
///
/// Use this with `run_with_cli` to initialize logging between parsing and running.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Bench(args) => run_bench_command(*args).await,
        Commands::TestWorkflows(args) => run_test_workflows_command(args).await,
        Commands::Lint(args) => run_lint_command(args).await,
        Commands::Action(args) => run_action_command(args).await,
    }
}

fn build_llm_client(api_key: Option<String>) -> anyhow::Result<Arc<dyn LlmProvider>> {
    if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
        info!("Using OpenRouter with specified API key");
        return Ok(Arc::new(LiteLlmClient::new_with_defaults(key)));
    }
    let client = LiteLlmClient::from_env().context(
        "No LLM endpoint configured.\n\
         Provide --api-key <KEY>, set OPENROUTER_API_KEY, or set LITELLM_API_BASE.",
    )?;
    info!(api_base = %client.api_base(), "Using LiteLLM endpoint from environment");
    Ok(Arc::new(client))
}

fn run_suffix(dataset: &str, prompt_level: Option<u8>) -> String {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    match prompt_level {
        Some(level) => format!("{dataset}_level{level}_{stamp}"),
        None => format!("{dataset}_{stamp}"),
    }
}

async fn run_bench_command(args: BenchArgs) -> anyhow::Result<()> {
    let items = args.data.load()?;
    let provider = build_llm_client(args.api_key.clone())?;
    let gate = CompletionGate::new(provider, args.model.clone(), args.max_llm_concurrency);
    let gateway = ValidationGateway::with_default_tools();

    let correction = CorrectionConfig::new()
        .with_retries(args.retries)
        .with_generator_model(args.model.clone())
        .with_judge_model(args.judge_model.clone())
        .with_repository_context(!args.no_repo_context);
    let pipeline = CorrectionPipeline::new(&gate, gateway.clone(), correction);
    let aggregator = ScoreAggregator::new(gateway, gate.with_model(args.judge_model.clone()));

    let config = BatchConfig::new()
        .with_workers(args.data.workers)
        .with_prompt_level(args.prompt_level)
        .with_repositories_dir(&args.data.repositories)
        .with_logs_dir(&args.logs);
    let driver = BatchDriver::new(config, pipeline, args.act.runner(), aggregator);

    info!(
        dataset = %args.data.dataset,
        items = items.len(),
        model = %args.model,
        judge_model = %args.judge_model,
        "Starting benchmark"
    );
    let report = driver.run(&items).await;

    let suffix = run_suffix(&args.data.dataset, Some(args.prompt_level));
    let files = write_results(&args.data.results, &suffix, &report.records, &report.summaries)?;

    println!("{}", serde_json::to_string_pretty(&report.summaries)?);
    println!(
        "\n{} items scored ({} failed) in {:.1}s",
        report.records.len(),
        report.failed,
        report.duration_secs
    );
    println!("Scores: {}", files.scores.display());
    println!("Overview: {}", files.overview.display());
    Ok(())
}

async fn run_test_workflows_command(args: TestWorkflowsArgs) -> anyhow::Result<()> {
    let items = args.data.load()?;
    let runner = args.act.runner();
    let checks =
        batch::test_workflows(&runner, &items, &args.data.repositories, args.data.workers).await;

    fs::create_dir_all(&args.data.results)?;
    let path = args
        .data
        .results
        .join(format!("functional_{}.jsonl", run_suffix(&args.data.dataset, None)));
    write_jsonl(&path, &checks)?;

    let passed = checks.iter().filter(|c| c.functional_test.success).count();
    let dry_run_passed = checks
        .iter()
        .filter(|c| c.functional_test.dryrun_success)
        .count();
    println!(
        "{passed}/{} workflows passed ({dry_run_passed} passed the dry run)",
        checks.len()
    );
    println!("Results: {}", path.display());
    Ok(())
}

async fn run_lint_command(args: LintArgs) -> anyhow::Result<()> {
    let content = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let gateway = ValidationGateway::new(
        Arc::new(Actionlint::new().with_program(&args.actionlint)),
        Arc::new(Zizmor::new().with_program(&args.zizmor)),
    );
    let workflow = WorkflowYaml::from(content);
    let report = gateway.check_syntax(Some(&workflow)).await?;
    let findings = gateway.scan_vulnerabilities(Some(&workflow)).await?;

    let output = json!({
        "file": args.file.display().to_string(),
        "syntax": report,
        "vulnerabilities": findings,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run_action_command(args: ActionArgs) -> anyhow::Result<()> {
    let details = ActionDetails::new(args.base_url);
    match details.fetch(&args.uses).await? {
        Some(metadata) => print!("{metadata}"),
        None => anyhow::bail!("could not find details for {}", args.uses),
    }
    Ok(())
}

fn write_jsonl<T: serde::Serialize>(path: &Path, rows: &[T]) -> anyhow::Result<()> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_bench() {
        let cli = Cli::try_parse_from([
            "ci-forge",
            "bench",
            "--dataset",
            "invalids",
            "--workers",
            "8",
            "--prompt-level",
            "2",
            "--limit",
            "10",
            "--api-key",
            "sk-test",
        ])
        .unwrap();
        let Commands::Bench(args) = cli.command else {
            panic!("expected bench");
        };
        assert_eq!(args.data.dataset, "invalids");
        assert_eq!(args.data.workers, 8);
        assert_eq!(args.data.limit, Some(10));
        assert_eq!(args.prompt_level, 2);
        assert_eq!(args.retries, DEFAULT_RETRIES);
        assert_eq!(args.judge_model, DEFAULT_JUDGE_MODEL);
        assert_eq!(args.act.timeout, 300);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_prompt_level_is_bounded() {
        let result = Cli::try_parse_from(["ci-forge", "bench", "-d", "x", "--prompt-level", "4"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_test_workflows_and_lint() {
        let cli = Cli::try_parse_from([
            "ci-forge",
            "--log-level",
            "debug",
            "test-workflows",
            "--dataset",
            "valids",
            "--act-path",
            "/usr/local/bin/act",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Commands::TestWorkflows(ref a) if a.act.act_path == Path::new("/usr/local/bin/act")));

        let cli = Cli::try_parse_from(["ci-forge", "lint", "ci.yml"]).unwrap();
        assert!(matches!(cli.command, Commands::Lint(ref a) if a.file == Path::new("ci.yml")));

        let cli = Cli::try_parse_from(["ci-forge", "action", "actions/checkout@v4"]).unwrap();
        assert!(matches!(cli.command, Commands::Action(ref a)
            if a.uses == "actions/checkout@v4" && a.base_url == RAW_GITHUB_BASE));
    }

    #[test]
    fn test_run_suffix() {
        assert!(run_suffix("invalids", Some(2)).starts_with("invalids_level2_"));
        assert!(run_suffix("invalids", None).starts_with("invalids_2"));
    }
}
