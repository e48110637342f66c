//! Argument parsing, configuration overlay, and command dispatch.

use std::fmt::{self, Display, Formatter};
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Args, Parser, Subcommand, ValueEnum};
use pine_tokens::{BuildConfig, SetId, SkippedPermutation, Theme, Workspace};
use pine_tokens_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging};
use serde::Serialize;
use tracing::error;

use crate::output::{print_build_summary, print_json};

/// Errors surfaced to the process boundary.
#[derive(Debug)]
pub(crate) enum CliError {
    /// Nothing was built: configuration, manifest, or token input was unusable.
    Fatal(anyhow::Error),
    /// The build ran but some targets failed.
    TargetsFailed(usize),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn fatal(error: impl Into<anyhow::Error>) -> Self {
        Self::Fatal(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::TargetsFailed(_) => 1,
            Self::Fatal(_) => 2,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Fatal(error) => format!("{error:#}"),
            Self::TargetsFailed(count) => format!("{count} output target(s) failed"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.display_message())
    }
}

impl std::error::Error for CliError {}

/// Parses arguments, installs logging, and runs the requested command.
/// Returns the process exit code.
pub fn run() -> i32 {
    let cli = Cli::parse();
    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.map_or_else(LogFormat::infer, Into::into),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("error: {err:#}");
        return 2;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match execute(cli, &mut out) {
        Ok(()) => 0,
        Err(err) => {
            error!(error = %err.display_message(), "pine-tokens failed");
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "pine-tokens",
    about = "Build CSS custom property files from design-token JSON"
)]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "PINE_TOKENS_CONFIG",
        help = "JSON build configuration"
    )]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Directory holding token sets and $themes.json")]
    token_root: Option<PathBuf>,
    #[arg(long, global = true, help = "Directory receiving generated files")]
    output_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Custom property prefix")]
    prefix: Option<String>,
    #[arg(
        long,
        global = true,
        env = "PINE_TOKENS_LOG",
        default_value = DEFAULT_LOG_LEVEL
    )]
    log_level: String,
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate all output files (default).
    Build(BuildArgs),
    /// Print valid themes, skipped permutations, and themeable sets.
    Themes,
    /// Print the planned output targets.
    Plan,
}

#[derive(Args, Debug, Default)]
struct BuildArgs {
    #[arg(long, help = "Print the full build report as JSON")]
    report: bool,
    #[arg(long, help = "Build targets one at a time")]
    sequential: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

#[derive(Serialize)]
struct ThemesView<'a> {
    themes: Vec<&'a Theme>,
    skipped: &'a [SkippedPermutation],
    themeable_sets: Vec<&'a SetId>,
}

pub(crate) fn execute(cli: Cli, out: &mut dyn Write) -> CliResult<()> {
    let mut config = load_config(&cli).map_err(CliError::fatal)?;
    match cli.command.unwrap_or_else(|| Command::Build(BuildArgs::default())) {
        Command::Build(args) => {
            if args.sequential {
                config.parallel = false;
            }
            let report = pine_tokens::build(&config).map_err(CliError::fatal)?;
            if args.report {
                print_json(out, &report).map_err(CliError::fatal)?;
            } else {
                print_build_summary(out, &report).map_err(CliError::fatal)?;
            }
            let failed = report.failures().count();
            if failed > 0 {
                return Err(CliError::TargetsFailed(failed));
            }
            Ok(())
        }
        Command::Themes => {
            let workspace = Workspace::open(&config).map_err(CliError::fatal)?;
            let view = ThemesView {
                themes: workspace.themes.iter().collect(),
                skipped: &workspace.themes.skipped,
                themeable_sets: workspace.classification.themeable_sets().collect(),
            };
            print_json(out, &view).map_err(CliError::fatal)
        }
        Command::Plan => {
            let targets = pine_tokens::plan(&config).map_err(CliError::fatal)?;
            print_json(out, &targets).map_err(CliError::fatal)
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<BuildConfig> {
    let mut config = match &cli.config {
        Some(path) => BuildConfig::from_file(path)?,
        None => BuildConfig::default(),
    };
    if let Some(root) = &cli.token_root {
        config.token_root.clone_from(root);
    }
    if let Some(output_dir) = &cli.output_dir {
        config.output_dir.clone_from(output_dir);
    }
    if let Some(prefix) = &cli.prefix {
        if prefix.trim().is_empty() {
            return Err(anyhow!("--prefix must not be empty"));
        }
        config.prefix.clone_from(prefix);
    }
    Ok(config)
}
