//! CLI argument definitions

use clap::{Parser, ValueEnum};

/// Output format of the runtime tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Indented table
    #[default]
    Text,
    /// Pretty-printed JSON snapshot
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "clrtree",
    version,
    about = "Show the CLR runtimes, AppDomains and assemblies loaded in a .NET process",
    after_help = "\
EXAMPLES:
    clrtree --pid 1234                   Print the runtime tree
    clrtree --pid 1234 --format json     Print a JSON snapshot

Starting the event tracing session requires administrative privileges."
)]
pub struct Args {
    /// Process ID to inspect
    #[arg(short, long)]
    pub pid: u32,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Give up on the rundown after N seconds (0 = wait indefinitely)
    #[arg(long, default_value = "30", value_name = "SECS")]
    pub timeout: u64,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}
