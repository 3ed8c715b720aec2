//! `confect-generate` entry point

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use confect_typegen::{generate, watch, Configuration, DEFAULT_CONVEX_DIR, DEFAULT_OUT_FILE};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Generate TypeScript error types for Confect functions.
///
/// Log verbosity is controlled with CONFECT_LOG (e.g. CONFECT_LOG=debug).
#[derive(Debug, Parser)]
#[command(name = "confect-generate", version, about)]
struct Cli
{
    /// Directory containing the Convex function files
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONVEX_DIR)]
    convex_dir: PathBuf,

    /// Declaration file to write
    #[arg(long, value_name = "PATH", default_value = DEFAULT_OUT_FILE)]
    output: PathBuf,

    /// Regenerate whenever a source file changes
    #[arg(long)]
    watch: bool,

    /// Module to augment (detected from package.json by default)
    #[arg(long, value_name = "NAME")]
    module_name: Option<String>,

    /// Also emit a `<Function>Returns` alias per function
    #[arg(long)]
    emit_returns: bool,

    /// Skip the .gitignore, reference-stub, and package.json updates
    #[arg(long)]
    no_post_process: bool,
}

impl From<&Cli> for Configuration
{
    fn from(cli: &Cli) -> Self
    {
        Self {
            convex_dir: cli.convex_dir.clone(),
            out_file: cli.output.clone(),
            module_name: cli.module_name.clone(),
            emit_return_types: cli.emit_returns,
            post_process: !cli.no_post_process,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode
{
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).without_time())
        .with(EnvFilter::try_from_env("CONFECT_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Configuration::from(&cli);

    let result = if cli.watch {
        watch::watch(&config).await
    } else {
        generate(&config).map(|_| ())
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}
