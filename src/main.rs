//! Artifact Publisher CLI
//!
//! Entry point for the `artifact-publish` command-line tool.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use artifact_publisher::cancel::CancellationToken;
use artifact_publisher::client::LocalClientFactory;
use artifact_publisher::config::{
    default_host_config_path, workspace_config_path, EffectiveConfig, PublisherConfig,
};
use artifact_publisher::log::{LogSink, NullLogSink, StderrLogSink};
use artifact_publisher::pipeline::Publisher;
use artifact_publisher::signal::SignalHandler;
use artifact_publisher::summary::{ExitCode, PublishReport};
use artifact_publisher::{CompressionMode, PublishTask};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

#[derive(Parser)]
#[command(name = "artifact-publish")]
#[command(about = "Compress, encrypt and upload declared build outputs", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish the declared outputs of one job
    Publish {
        /// Path to the task descriptor (JSON)
        #[arg(long)]
        task: PathBuf,

        /// Build workspace the declared locations are relative to
        #[arg(long, short = 'w', default_value = ".")]
        workspace: PathBuf,

        /// Job details: a directory of <job_id>.json files or a single file
        #[arg(long)]
        job_details: PathBuf,

        /// Root directory of the artifact store
        #[arg(long)]
        store: PathBuf,

        /// Workspace config file (default: <workspace>/.artifact-publisher.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Host config file (default: ~/.config/artifact-publisher/config.toml)
        #[arg(long)]
        host_config: Option<PathBuf>,

        /// Compression mode: none, zip, tar, tgz
        #[arg(long)]
        compression: Option<CompressionMode>,

        /// Environment variable holding the encryption key
        #[arg(long)]
        encryption_key_env: Option<String>,

        /// Number of artifacts processed at once
        #[arg(long)]
        max_parallel: Option<usize>,

        /// Write the publish report (JSON) to this path
        #[arg(long)]
        report: Option<PathBuf>,

        /// Print per-artifact progress to stderr
        #[arg(long, short = 'v')]
        verbose: bool,
    },

    /// Print the effective configuration (secrets redacted)
    Config {
        /// Workspace config file (default: <workspace>/.artifact-publisher.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Host config file (default: ~/.config/artifact-publisher/config.toml)
        #[arg(long)]
        host_config: Option<PathBuf>,

        /// Workspace used to locate the workspace config
        #[arg(long, short = 'w', default_value = ".")]
        workspace: PathBuf,
    },
}

/// CLI flags that override configuration
#[derive(Default)]
struct Overrides {
    compression: Option<CompressionMode>,
    encryption_key_env: Option<String>,
    max_parallel: Option<usize>,
}

impl Overrides {
    fn to_value(&self) -> Result<Option<Value>, String> {
        let mut map = Map::new();
        if let Some(mode) = self.compression {
            map.insert("compression".to_string(), json!(mode));
        }
        if let Some(n) = self.max_parallel {
            map.insert("max_parallel".to_string(), json!(n));
        }
        if let Some(var) = &self.encryption_key_env {
            let key = std::env::var(var)
                .map_err(|_| format!("encryption key variable {} is not set", var))?;
            map.insert("encryption".to_string(), json!({ "key": key }));
        }

        if map.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Value::Object(map)))
        }
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Publish {
            task,
            workspace,
            job_details,
            store,
            config,
            host_config,
            compression,
            encryption_key_env,
            max_parallel,
            report,
            verbose,
        } => {
            let overrides = Overrides {
                compression,
                encryption_key_env,
                max_parallel,
            };
            let code = run_publish(PublishArgs {
                task,
                workspace,
                job_details,
                store,
                config,
                host_config,
                overrides,
                report,
                verbose,
            });
            process::exit(code.as_i32());
        }
        Commands::Config {
            config,
            host_config,
            workspace,
        } => {
            run_config(config, host_config, &workspace);
        }
    }
}

struct PublishArgs {
    task: PathBuf,
    workspace: PathBuf,
    job_details: PathBuf,
    store: PathBuf,
    config: Option<PathBuf>,
    host_config: Option<PathBuf>,
    overrides: Overrides,
    report: Option<PathBuf>,
    verbose: bool,
}

fn load_effective(
    config: Option<PathBuf>,
    host_config: Option<PathBuf>,
    workspace: &Path,
    overrides: &Overrides,
) -> Result<EffectiveConfig, String> {
    let host = host_config.or_else(default_host_config_path);
    let workspace_config = config.unwrap_or_else(|| workspace_config_path(workspace));
    let cli = overrides.to_value()?;

    EffectiveConfig::build(host.as_deref(), Some(&workspace_config), cli).map_err(|e| e.to_string())
}

fn run_publish(args: PublishArgs) -> ExitCode {
    let task = match PublishTask::from_file(&args.task) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error loading task {}: {}", args.task.display(), e);
            return ExitCode::Config;
        }
    };

    let effective = match load_effective(args.config, args.host_config, &args.workspace, &args.overrides) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::Config;
        }
    };

    let config = match PublisherConfig::from_effective(&effective) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::Config;
        }
    };

    let log: Arc<dyn LogSink> = if args.verbose {
        Arc::new(StderrLogSink)
    } else {
        Arc::new(NullLogSink)
    };

    let factory = LocalClientFactory::new(&args.job_details, &args.store);
    let publisher = match Publisher::new(config, Arc::new(factory)) {
        Ok(p) => p.with_log_sink(log),
        Err(e) => {
            eprintln!("Error: {}", e);
            return e.exit_code();
        }
    };

    let token = CancellationToken::new();
    if let Err(e) = SignalHandler::new(token.clone()).install() {
        eprintln!("Warning: could not install signal handler: {}", e);
    }

    if args.verbose {
        eprintln!(
            "Publishing {} expected artifact(s) for job {}...",
            task.job.output_artifacts.len(),
            task.job.id
        );
    }

    let report = match publisher.publish(&task, &args.workspace, Some(&token)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return e.exit_code();
        }
    };

    print_report(&report);

    if let Some(path) = &args.report {
        if let Err(e) = report.write_to_file(path) {
            eprintln!("Error writing report {}: {}", path.display(), e);
        }
    }

    report.status.exit_code()
}

fn print_report(report: &PublishReport) {
    for outcome in &report.outcomes {
        let marker = if outcome.outcome.is_uploaded() { "ok" } else { "FAIL" };
        println!("  [{}] {}", marker, outcome.describe());
    }
    println!("{}", report.human_summary);
}

fn run_config(config: Option<PathBuf>, host_config: Option<PathBuf>, workspace: &Path) {
    let effective = match load_effective(config, host_config, workspace, &Overrides::default()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(ExitCode::Config.as_i32());
        }
    };

    if let Err(e) = PublisherConfig::from_effective(&effective) {
        eprintln!("Configuration error: {}", e);
        process::exit(ExitCode::Config.as_i32());
    }

    match effective.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(ExitCode::Config.as_i32());
        }
    }
}
