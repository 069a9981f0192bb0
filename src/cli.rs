use clap::Parser;
use std::path::PathBuf;

use crate::advisory::OutputFormat;
use crate::allocator::Strategy;

#[derive(Debug, Parser)]
#[command(
    name = "taskprep",
    version,
    about = "Prepares a numbered session directory when a prompt opens a /task or /analyze session.",
    long_about = "Prompt-submit hook: reads the hook payload (JSON with `prompt` and `cwd`) from stdin. When the prompt starts with /task, /analyze or /task_medium, the next claude-code-storage/claude-instance-<N> directory is created under cwd and an advisory is printed.\n\nThe hook always exits 0; failures are reported on stderr."
)]
pub(crate) struct Cli {
    /// Load configuration from PATH instead of ~/.config/taskprep.yml.
    #[arg(
        short = 'c',
        long = "config",
        value_name = "PATH",
        help = "Load configuration from PATH instead of ~/.config/taskprep.yml."
    )]
    pub(crate) config: Option<PathBuf>,

    #[arg(
        long = "format",
        value_enum,
        value_name = "FORMAT",
        help = "Print the advisory as plain text or as hook JSON (overrides config)."
    )]
    pub(crate) format: Option<OutputFormat>,

    #[arg(
        long = "strategy",
        value_enum,
        value_name = "STRATEGY",
        help = "How to resolve a clash on the next instance id (overrides config)."
    )]
    pub(crate) strategy: Option<Strategy>,
}
