use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};
use crate::logging;
use crate::quota::config::ConfigOverrides;

#[derive(Debug, Parser)]
#[command(name = "quotawatch")]
#[command(about = "Read Claude usage-quota screenshots with a vision model", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    shared: SharedArgs,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read one screenshot and print the full reading as JSON
    Parse {
        /// Screenshot to read
        image: PathBuf,

        /// Write the reading to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Watch a directory and keep the status file current
    Monitor {
        /// Directory the capture tool writes screenshots into
        #[arg(long, value_name = "DIR")]
        watch_dir: Option<String>,

        /// Glob matched against file names
        #[arg(long, value_name = "GLOB")]
        pattern: Option<String>,

        /// Seconds between cycles (fractional, minimum 0.5)
        #[arg(long, value_name = "N")]
        poll_seconds: Option<f64>,

        /// Compact status file for the status line
        #[arg(long, value_name = "FILE")]
        quota_file: Option<String>,

        /// Also write the full reading here
        #[arg(long, value_name = "FILE")]
        full_output: Option<String>,

        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
}

#[derive(Debug, Args)]
struct SharedArgs {
    /// Inference API flavor: ollama or openai-compatible
    #[arg(long, global = true, value_name = "NAME")]
    provider: Option<String>,

    /// Vision model name
    #[arg(long, global = true, value_name = "MODEL")]
    model: Option<String>,

    /// Inference endpoint base URL
    #[arg(long, global = true, value_name = "URL")]
    host: Option<String>,

    /// Bearer token for remote endpoints
    #[arg(long, global = true, value_name = "KEY")]
    api_key: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Log each cycle
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log raw model replies
    #[arg(long, global = true)]
    debug: bool,
}

impl SharedArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            provider: self.provider.clone(),
            host: self.host.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            timeout_secs: self.timeout,
            ..ConfigOverrides::default()
        }
    }
}

fn finish(report: CommandReport) -> Result<()> {
    eprint!("{}", report.render());
    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.shared.verbose, cli.shared.debug);
    let mut overrides = cli.shared.overrides();

    let report = match cli.command {
        Command::Parse { image, output } => commands::parse::run(&commands::parse::ParseOptions {
            image,
            output,
            overrides,
        })?,
        Command::Monitor {
            watch_dir,
            pattern,
            poll_seconds,
            quota_file,
            full_output,
            once,
        } => {
            overrides.watch_dir = watch_dir;
            overrides.pattern = pattern;
            overrides.poll_interval_secs = poll_seconds;
            overrides.status_file = quota_file;
            overrides.full_output = full_output;
            commands::monitor::run(&commands::monitor::MonitorOptions { once, overrides })?
        }
    };

    finish(report)
}
