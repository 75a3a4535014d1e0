#![forbid(unsafe_code)]

mod cmd;
mod output;

use std::path::PathBuf;
use std::str::FromStr;

use clap::{CommandFactory, Parser, Subcommand};
use output::OutputMode;
use strata_core::config::resolve_config;
use strata_core::env::{parse_env, parse_env_bool};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "strata",
    author,
    version,
    about = "strata: global, session, and browser-persisted state sharing one task",
    long_about = None
)]
struct Cli {
    /// Log debug output from strata (overridden by `STRATA_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Config file (default: `<config_dir>/strata/config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Browser profile whose stored state is used.
    #[arg(long, global = true, default_value = "default")]
    profile: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Run a scripted, reproducible walk through every layer",
        after_help = "EXAMPLES:\n    # Two sessions, three rounds\n    strata demo\n\n    # Bigger run, machine-readable\n    strata demo --seed 42 --sessions 4 --rounds 10 --json"
    )]
    Demo(cmd::demo::DemoArgs),

    #[command(
        about = "Drive the layers interactively, one action per line",
        after_help = "EXAMPLES:\n    # Interactive\n    strata shell\n\n    # Scripted\n    printf 'session\\nbrowser\\nrefresh\\n' | strata shell --json"
    )]
    Shell(cmd::shell::ShellArgs),

    #[command(about = "Inspect or change the browser-persisted layer")]
    Browser(cmd::browser::BrowserArgs),

    #[command(
        about = "Load a CSV, JSON, or Parquet file and preview it",
        after_help = "EXAMPLES:\n    # Shape and first rows\n    strata dataset people.csv\n\n    # One row as JSON\n    strata dataset people.parquet --row 3 --json"
    )]
    Dataset(cmd::dataset::DatasetArgs),

    #[command(about = "Inspect or edit the stored entity profile")]
    Profile(cmd::profile::ProfileArgs),

    #[command(
        about = "Uppercase text",
        after_help = "EXAMPLES:\n    # Built-in samples\n    strata transform\n\n    # Your own text\n    strata transform hello there"
    )]
    Transform(cmd::transform::TransformArgs),

    #[command(about = "Print a nested record as indented JSON")]
    JsonFormat(cmd::json_format::JsonFormatArgs),

    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Bash\n    strata completions bash > ~/.local/share/bash-completion/completions/strata"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

/// `STRATA_LOG_FORMAT`: `compact` (default) or `json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

/// Filter used when `STRATA_LOG` is unset.
const fn default_directives(debug: bool) -> &'static str {
    if debug {
        "strata=debug,info"
    } else {
        "strata=info,warn"
    }
}

fn init_tracing(verbose: bool) {
    let debug = verbose || parse_env_bool("DEBUG", Some("false")).unwrap_or(false);
    let filter = EnvFilter::try_from_env("STRATA_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_directives(debug)));

    let format = parse_env::<LogFormat>("STRATA_LOG_FORMAT", Some("compact"));

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        Ok(LogFormat::Json) => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        Ok(LogFormat::Compact) | Err(_) => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
    if let Err(err) = format {
        tracing::warn!(error = %err, "falling back to compact logs");
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Completions(args) = &cli.command {
        return cmd::completions::run_completions(args.shell, &mut Cli::command());
    }

    let config = resolve_config(cli.config.as_deref())?;
    let output = output::resolve_output_mode(cli.format, cli.json, config.output.as_deref());

    match cli.command {
        Commands::Demo(ref args) => cmd::demo::run_demo(args, output),
        Commands::Transform(ref args) => cmd::transform::run_transform(args, output),
        Commands::JsonFormat(ref args) => cmd::json_format::run_json_format(args, output),
        Commands::Dataset(ref args) => cmd::dataset::run_dataset(args, output),
        Commands::Shell(ref args) => {
            let mut host = cmd::Host::open(config, &cli.profile, args.seed);
            cmd::shell::run_shell(args, output, &mut host)
        }
        Commands::Browser(ref args) => {
            let mut host = cmd::Host::open(config, &cli.profile, None);
            cmd::browser::run_browser(args, output, &mut host)
        }
        Commands::Profile(ref args) => {
            let mut host = cmd::Host::open(config, &cli.profile, None);
            cmd::profile::run_profile(args, output, &mut host)
        }
        Commands::Completions(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn json_flag_parses_after_subcommand() {
        let cli = Cli::parse_from(["strata", "browser", "show", "--json"]);
        assert!(cli.json);
        assert_eq!(cli.profile, "default");
    }

    #[test]
    fn format_and_profile_are_global() {
        let cli = Cli::parse_from(["strata", "demo", "--format", "text", "--profile", "alice"]);
        assert_eq!(cli.format, Some(OutputMode::Text));
        assert_eq!(cli.profile, "alice");
        assert!(matches!(cli.command, Commands::Demo(_)));
    }

    #[test]
    fn completions_subcommand_parses() {
        let cli = Cli::parse_from(["strata", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Commands::Completions(cmd::completions::CompletionsArgs {
                shell: clap_complete::Shell::Bash,
            })
        ));
    }

    #[test]
    fn all_subcommands_listed() {
        let subcommands = [
            vec!["strata", "demo"],
            vec!["strata", "shell"],
            vec!["strata", "browser", "show"],
            vec!["strata", "browser", "change"],
            vec!["strata", "browser", "clear"],
            vec!["strata", "dataset", "people.csv", "--row", "2"],
            vec!["strata", "profile", "show"],
            vec!["strata", "profile", "random"],
            vec!["strata", "profile", "random", "--seed", "3"],
            vec!["strata", "shell", "--seed", "3"],
            vec!["strata", "profile", "update", "--namespace", "Holmes"],
            vec!["strata", "transform", "hi"],
            vec!["strata", "json-format", "--number", "7"],
            vec!["strata", "completions", "zsh"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(result.is_ok(), "Failed to parse {args:?}: {:?}", result.err());
        }
    }

    #[test]
    fn verbose_is_global_and_raises_the_default_filter() {
        let cli = Cli::parse_from(["strata", "browser", "show", "-v"]);
        assert!(cli.verbose);
        assert_eq!(default_directives(true), "strata=debug,info");
        assert_eq!(default_directives(false), "strata=info,warn");
    }

    #[test]
    fn log_format_parses_known_names() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("compact".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn browser_requires_a_subcommand() {
        assert!(Cli::try_parse_from(["strata", "browser"]).is_err());
    }
}
