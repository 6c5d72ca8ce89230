//! Binary entry point for the branchsync CLI.

use std::env;
use std::ffi::OsString;
use std::io::{self, Write};
use std::process;

use clap::{CommandFactory, Parser};
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use branchsync::{RunOptions, SettingsError, SyncError, SyncSettings, Syncer, split_file_list};

mod cli;

use cli::Cli;

/// Environment variable holding the log filter directives.
const LOG_ENV: &str = "BRANCHSYNC_LOG";

/// Go-style single-dash long flags and their clap spellings.
const LEGACY_FLAGS: [(&str, &str); 3] = [
    ("-files", "--files"),
    ("-message", "--message"),
    ("-dryRun", "--dry-run"),
];

/// Flags whose value may follow as a separate argument.
const VALUE_FLAGS: [&str; 4] = ["-files", "--files", "-message", "--message"];

#[derive(Debug, Error)]
enum CliError {
    #[error("--files is required: pass one or more sync config files")]
    MissingFiles,
    #[error("configuration error: {0}")]
    Config(#[from] SettingsError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse_from(normalise_legacy_flags(env::args_os()));
    let exit_code = match execute(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

async fn execute(cli: Cli) -> Result<(), CliError> {
    let files = match cli.files.as_deref().map(split_file_list) {
        Some(files) if !files.is_empty() => files,
        _ => {
            write_usage(io::stderr());
            return Err(CliError::MissingFiles);
        }
    };

    let mut settings = SyncSettings::load_without_cli_args()?;
    if let Some(message) = cli.message.filter(|message| !message.trim().is_empty()) {
        settings.commit_message = message;
    }

    let syncer = Syncer::with_github(settings)?;
    let options = RunOptions {
        dry_run: cli.dry_run,
        keep_going: cli.keep_going,
    };
    syncer.run(&files, options).await?;
    Ok(())
}

/// Rewrites Go-style `-flag` and `-flag=value` spellings to clap's `--flag`
/// form. Values that follow a value-taking flag are passed through untouched.
fn normalise_legacy_flags(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    let mut normalised = Vec::new();
    let mut expect_value = false;
    let mut after_terminator = false;

    for arg in args {
        if expect_value || after_terminator {
            expect_value = false;
            normalised.push(arg);
            continue;
        }
        let Some(text) = arg.to_str() else {
            normalised.push(arg);
            continue;
        };
        if text == "--" {
            after_terminator = true;
            normalised.push(arg);
            continue;
        }

        expect_value = VALUE_FLAGS.contains(&text);
        normalised.push(rewrite_legacy_flag(text).map_or(arg, OsString::from));
    }

    normalised
}

fn rewrite_legacy_flag(arg: &str) -> Option<String> {
    let (name, value) = match arg.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (arg, None),
    };
    let (_, modern) = LEGACY_FLAGS.iter().find(|(legacy, _)| *legacy == name)?;
    Some(value.map_or_else(|| (*modern).to_owned(), |value| format!("{modern}={value}")))
}

fn write_usage(mut target: impl Write) {
    let help = Cli::command().render_help();
    writeln!(target, "{help}").ok();
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
