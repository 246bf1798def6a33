use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use section::common::config::{Config, config_file};
use section::common::log;
use section::replay::{self, Transcript};
use tracing::info;

/// Window switcher core: gesture handling, thumbnails and live previews.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the effective configuration as TOML.
    CheckConfig,
    /// Play an input transcript against a synthetic desktop.
    Replay {
        /// JSON transcript of windows and input steps.
        transcript: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    log::init_logging(cli.verbose);

    let path = cli.config.unwrap_or_else(config_file);
    let config = Config::load_or_default(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;

    match cli.command {
        Command::CheckConfig => {
            let text = toml::to_string_pretty(&config).context("serializing config")?;
            print!("{text}");
        }
        Command::Replay { transcript } => {
            let buf = fs::read_to_string(&transcript)
                .with_context(|| format!("reading {}", transcript.display()))?;
            let transcript = Transcript::parse(&buf)
                .with_context(|| format!("parsing {}", transcript.display()))?;
            info!(steps = transcript.steps.len(), windows = transcript.windows.len(), "replaying");

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .context("starting runtime")?;
            let report = runtime.block_on(replay::replay(config, transcript));
            print!("{report}");
        }
    }
    Ok(())
}
