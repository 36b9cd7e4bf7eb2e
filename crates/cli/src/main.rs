//! Jobdock CLI - submit and inspect background jobs.
//!
//! Every command prints a single JSON document on stdout; logs go to stderr.

mod args;
mod config;

use std::path::{Path, PathBuf};
use std::process::{ExitCode, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jobdock_core::{JobId, JobSpec, JobStatus};
use jobdock_engine::{JobEngine, JobError, JobStatusView};
use jobdock_runner::ScriptAdapter;
use jobdock_storage::{JobStore, JsonJobStore};
use serde::Serialize;
use serde_json::json;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

const WORKER_HANDOFF_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "jobdock")]
#[command(about = "Run scripts as tracked background jobs", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./jobdock.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding per-job state
    #[arg(long, global = true)]
    jobs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a job
    Submit {
        /// Script to run
        target: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Text argument, as key=value
        #[arg(long = "arg", value_name = "KEY=VALUE")]
        args: Vec<String>,
        /// List argument, as key=a,b,c
        #[arg(long = "list-arg", value_name = "KEY=A,B")]
        list_args: Vec<String>,
        /// Boolean switch argument
        #[arg(long = "flag", value_name = "KEY")]
        flags: Vec<String>,
        /// Typed arguments as a JSON object
        #[arg(long)]
        args_json: Option<String>,
        /// Return right after submission instead of waiting
        #[arg(long)]
        detach: bool,
        /// Stop waiting after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Show job status
    Status {
        /// Job ID
        id: String,
    },
    /// Show the results of a completed job
    Result {
        /// Job ID
        id: String,
    },
    /// Show the job log
    Log {
        /// Job ID
        id: String,
        /// Number of trailing lines (0 for all)
        #[arg(long)]
        tail: Option<usize>,
    },
    /// Cancel a running job
    Cancel {
        /// Job ID
        id: String,
    },
    /// List jobs
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },
    /// Mark jobs left pending or running by a stopped orchestrator as failed
    Reconcile,
    /// Execute a pending job in the foreground (used by `submit --detach`)
    #[command(hide = true)]
    Run {
        /// Job ID
        id: String,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Start `jobdock run <id>` as a background process that outlives this one.
fn spawn_worker(config: &Config, config_path: Option<&Path>, job_id: JobId) -> Result<()> {
    let exe = std::env::current_exe().context("Cannot locate the jobdock executable")?;
    let mut cmd = std::process::Command::new(exe);
    if let Some(path) = config_path {
        cmd.arg("--config").arg(path);
    }
    cmd.arg("--jobs-dir")
        .arg(&config.jobs_dir)
        .arg("run")
        .arg(job_id.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let child = cmd.spawn().context("Failed to start background worker")?;
    info!("Job {} handed to worker pid {}", job_id, child.id());
    Ok(())
}

/// Wait until the worker has picked a job up, so the record names the
/// worker as its owner before this process exits.
async fn wait_for_handoff(engine: &JobEngine, job_id: JobId) -> Result<JobStatusView> {
    let deadline = Instant::now() + WORKER_HANDOFF_TIMEOUT;
    loop {
        let status = engine.get_status(job_id).await?;
        if status.status != JobStatus::Pending || Instant::now() >= deadline {
            return Ok(status);
        }
        tokio::time::sleep(engine.config().poll_interval()).await;
    }
}

fn parse_id(raw: &str) -> Result<JobId> {
    raw.parse()
        .map_err(|_| anyhow::anyhow!("Invalid job ID: {}", raw))
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            let kind = err
                .downcast_ref::<JobError>()
                .map(|e| serde_json::to_value(e.kind()).unwrap_or_default())
                .unwrap_or_else(|| json!("invalid_request"));
            let body = json!({
                "status": "error",
                "kind": kind,
                "error": format!("{:#}", err),
            });
            println!("{}", body);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.jobs_dir {
        config.jobs_dir = dir;
    }

    let store = JsonJobStore::new(&config.jobs_dir)
        .await
        .with_context(|| format!("Failed to open jobs dir {}", config.jobs_dir.display()))?;
    let store: Arc<dyn JobStore> = Arc::new(store);
    let adapter = Arc::new(ScriptAdapter::new(config.adapter.clone()));
    let engine = JobEngine::new(store, adapter).with_config(config.engine.clone());
    // Workers leave reconciliation to interactive commands
    let engine = match cli.command {
        Commands::Run { .. } => engine,
        _ => engine.start().await?,
    };

    match cli.command {
        Commands::Submit {
            target,
            name,
            args,
            list_args,
            flags,
            args_json,
            detach,
            timeout_secs,
        } => {
            let mut spec = JobSpec::new(target);
            spec.args = args::collect_args(args_json.as_deref(), &args, &list_args, &flags)?;

            if detach {
                let record = engine.enqueue(spec, name).await?;
                spawn_worker(&config, cli.config.as_deref(), record.job_id)?;
                let status = wait_for_handoff(&engine, record.job_id).await?;
                if status.status == JobStatus::Pending {
                    warn!("Worker has not started job {} yet", record.job_id);
                }
                print_json(&json!({
                    "job_id": record.job_id,
                    "status": status.status,
                    "submitted_at": record.submitted_at,
                    "message": format!("Job submitted. Check status with: jobdock status {}", record.job_id),
                }))?;
                return Ok(ExitCode::SUCCESS);
            }

            let job_id = engine.submit(spec, name).await?;
            let timeout = timeout_secs.map(Duration::from_secs).unwrap_or(Duration::MAX);
            match engine.wait_for_completion(job_id, timeout).await? {
                Some(status) => {
                    let ok = status.status == JobStatus::Completed;
                    print_json(&status)?;
                    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
                }
                None => {
                    info!("Timed out waiting for job {}, cancelling", job_id);
                    let settle = engine.config().kill_grace_period() + Duration::from_secs(5);
                    let status = engine.cancel_and_settle(job_id, settle).await?;
                    print_json(&status)?;
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Status { id } => {
            print_json(&engine.get_status(parse_id(&id)?).await?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Result { id } => {
            print_json(&engine.get_result(parse_id(&id)?).await?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Log { id, tail } => {
            let tail = tail.or(Some(engine.config().default_log_tail));
            print_json(&engine.get_log(parse_id(&id)?, tail).await?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Cancel { id } => {
            print_json(&engine.cancel(parse_id(&id)?).await?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::List { status } => {
            let status = status
                .map(|s| s.parse::<JobStatus>())
                .transpose()
                .map_err(|e| anyhow::anyhow!(e))?;
            print_json(&engine.list_jobs(status).await?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { id } => {
            let status = engine.run(parse_id(&id)?).await?;
            let ok = status.status == JobStatus::Completed;
            print_json(&status)?;
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Reconcile => {
            let reconciled = engine.reconcile_orphans().await?;
            print_json(&json!({
                "reconciled": reconciled,
                "total": reconciled.len(),
            }))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
