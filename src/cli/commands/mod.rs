//! CLI parser and command dispatch.

mod id;
mod run;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use artacquire::config::{Config, LoadOptions};

#[derive(Parser)]
#[command(name = "artacquire")]
#[command(about = "Artwork page acquisition through a logged-in browser session")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every unprocessed artwork in the backlog
    Run {
        /// Backlog file with one artwork URL per line
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output root for artwork directories
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Artworks extracted concurrently per batch
        #[arg(short, long)]
        batch_size: Option<usize>,
        /// Seconds to sleep between batches
        #[arg(short, long)]
        delay: Option<f64>,
    },

    /// Show how much of the backlog has been processed
    Status {
        /// Backlog file with one artwork URL per line
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output root for artwork directories
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the artwork id of a URL
    Id {
        /// Artwork page URL
        url: String,
    },
}

/// Input and output locations after CLI overrides.
pub(crate) struct Paths {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl Paths {
    fn resolve(
        config: &Config,
        options: &LoadOptions,
        input: Option<PathBuf>,
        output: Option<PathBuf>,
    ) -> Self {
        let base = config.base_dir(options);
        Self {
            input: input.unwrap_or_else(|| Config::resolve_path(&config.paths.input, &base)),
            output: output.unwrap_or_else(|| Config::resolve_path(&config.paths.output, &base)),
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Id { url } = &cli.command {
        return id::cmd_id(url);
    }

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
    };
    let config = Config::load(&options).await?;

    match cli.command {
        Commands::Run {
            input,
            output,
            batch_size,
            delay,
        } => {
            let paths = Paths::resolve(&config, &options, input, output);
            let mut batch = config.to_batch_settings();
            if let Some(size) = batch_size {
                batch.batch_size = size.max(1);
            }
            if let Some(delay) = delay {
                batch.delay = std::time::Duration::try_from_secs_f64(delay)
                    .map_err(|_| anyhow::anyhow!("Invalid delay: {}", delay))?;
            }
            run::cmd_run(&config, &options, &paths, batch).await
        }
        Commands::Status { input, output } => {
            let paths = Paths::resolve(&config, &options, input, output);
            status::cmd_status(&paths)
        }
        Commands::Id { .. } => Ok(()),
    }
}
