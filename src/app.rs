use clap::Parser;
use std::env;
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::cli::Cli;
use crate::config::{load_config, Config};
use crate::hook::{handle_hook, HookOutcome};
use crate::logger::Logger;

const DEFAULT_CONFIG_REL: &str = ".config/taskprep.yml";

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

/// Loads the config file named by `--config`, or the default one under
/// `home`, then applies command-line overrides. Problems are reported on
/// `stderr` and fall back to defaults; a hook must not refuse to run.
pub(crate) fn resolve_config<E: Write>(cli: &Cli, home: Option<&Path>, stderr: &mut E) -> Config {
    let candidate = match (&cli.config, home) {
        (Some(path), _) => Some((path.clone(), true)),
        (None, Some(home)) => Some((home.join(DEFAULT_CONFIG_REL), false)),
        (None, None) => None,
    };

    let mut config = match candidate {
        Some((path, _)) if path.is_file() => match load_config(&path) {
            Ok(loaded) => {
                for key in &loaded.warnings {
                    let _ = writeln!(stderr, "Warning: unknown config key: {}", key);
                }
                loaded.config
            }
            Err(message) => {
                let _ = writeln!(stderr, "Warning: {}; using defaults", message);
                Config::default()
            }
        },
        Some((path, true)) => {
            let _ = writeln!(stderr, "Warning: missing config file: {}", path.display());
            Config::default()
        }
        _ => Config::default(),
    };

    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    config
}

pub(crate) fn run_with_cli<R, O, E>(
    cli: Cli,
    stdin: &mut R,
    stdout: &mut O,
    stderr: &mut E,
) -> HookOutcome
where
    R: Read,
    O: Write,
    E: Write,
{
    let config = resolve_config(&cli, home_dir().as_deref(), stderr);
    let logger = Logger::new(config.log_path.as_ref().map(PathBuf::from));

    let mut raw_input = String::new();
    if let Err(err) = stdin.read_to_string(&mut raw_input) {
        let io_error = err.to_string();
        logger.log_event(
            "skip",
            &[("reason", "stdin_unreadable"), ("io_error", io_error.as_str())],
        );
        return HookOutcome::Silent;
    }

    let default_cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let outcome = handle_hook(&raw_input, &config, &logger, &default_cwd);
    match &outcome {
        HookOutcome::Silent => {}
        HookOutcome::Advisory(text) => {
            let _ = writeln!(stdout, "{}", text);
        }
        HookOutcome::Warning(message) => {
            let _ = writeln!(
                stderr,
                "Warning: Failed to create instance directory: {}",
                message
            );
        }
    }
    outcome
}

/// Runs the hook; the returned outcome is `None` when argument parsing
/// stopped early (including `--help` and `--version`).
pub(crate) fn run_with_args<R, O, E>(
    args: Vec<OsString>,
    stdin: &mut R,
    stdout: &mut O,
    stderr: &mut E,
) -> Option<HookOutcome>
where
    R: Read,
    O: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            // Rendered by hand so output lands on the given writers.
            let _ = if err.use_stderr() {
                write!(stderr, "{err}")
            } else {
                write!(stdout, "{err}")
            };
            return None;
        }
    };
    Some(run_with_cli(cli, stdin, stdout, stderr))
}

pub(crate) fn main_with_args(args: Vec<OsString>) -> ExitCode {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let stderr = io::stderr();
    run_with_args(
        args,
        &mut stdin.lock(),
        &mut stdout.lock(),
        &mut stderr.lock(),
    );
    // Hook mode always exits 0.
    ExitCode::SUCCESS
}

pub(crate) fn main() -> ExitCode {
    main_with_args(env::args_os().collect())
}
