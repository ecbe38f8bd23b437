// Copyright 2026 Pixmirror Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use pixmirror::cli::{self, DiscoverOverrides, DownloadOverrides};
use pixmirror::renderer::RendererKind;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pixmirror",
    about = "pixmirror: discover every image on a site and mirror it locally",
    version,
    after_help = "Run 'pixmirror <command> --help' for details on each command."
)]
struct Cli {
    /// Config file (default: $PIXMIRROR_CONFIG, then ./pixmirror.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Default)]
struct DiscoverArgs {
    /// Site to crawl (overrides site.base_url)
    #[arg(long)]
    base_url: Option<String>,
    /// Where to write the URL list
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
    /// Renderer to drive pages with
    #[arg(long, value_enum)]
    renderer: Option<RendererKind>,
    /// Show the browser window
    #[arg(long)]
    headful: bool,
}

impl From<DiscoverArgs> for DiscoverOverrides {
    fn from(a: DiscoverArgs) -> Self {
        Self {
            base_url: a.base_url,
            output: a.output,
            renderer: a.renderer,
            headful: a.headful,
        }
    }
}

#[derive(Args, Default)]
struct DownloadArgs {
    /// URL list to read
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,
    /// Root of the mirrored tree
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
}

impl From<DownloadArgs> for DownloadOverrides {
    fn from(a: DownloadArgs) -> Self {
        Self {
            input: a.input,
            output_dir: a.output_dir,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Visit the configured pages and write the image URL list
    Discover(DiscoverArgs),
    /// Download every URL in the list into a mirrored tree
    Download(DownloadArgs),
    /// Discover, then download what was found
    Run {
        #[command(flatten)]
        discover: DiscoverArgs,
        /// Root of the mirrored tree
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(cli: &Cli) {
    let default = if cli.verbose {
        "pixmirror=debug"
    } else if cli.quiet {
        "pixmirror=warn"
    } else {
        "pixmirror=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.json {
        builder.json().init();
    } else {
        builder.with_ansi(!cli.no_color).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var(cli::output::JSON_ENV, "1");
    }
    if cli.quiet {
        std::env::set_var(cli::output::QUIET_ENV, "1");
    }
    if cli.verbose {
        std::env::set_var(cli::output::VERBOSE_ENV, "1");
    }
    if cli.no_color {
        std::env::set_var(cli::output::NO_COLOR_ENV, "1");
    }

    if !matches!(cli.command, Commands::Completions { .. }) {
        init_tracing(&cli);
    }

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Discover(args) => cli::discover_cmd::run(config, &args.into()).await,
        Commands::Download(args) => cli::download_cmd::run(config, &args.into()).await,
        Commands::Run {
            discover,
            output_dir,
        } => {
            let download = DownloadOverrides {
                input: None,
                output_dir,
            };
            cli::run_cmd::run(config, &discover.into(), &download).await
        }
        Commands::Doctor => cli::doctor::run(config).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "pixmirror", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else if !cli::output::is_quiet() {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
