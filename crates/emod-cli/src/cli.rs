use clap::{CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};
use clap_complete::Shell;
use std::path::PathBuf;

/// Name of the installed binary; completion scripts register under it.
pub const BIN_NAME: &str = "emod";

#[derive(Parser, Debug)]
#[command(
    name = BIN_NAME,
    author,
    version,
    about = "Energy-system model assembly and solving",
    long_about = None
)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assemble, solve and persist one scenario
    Solve(SolveArgs),
    /// Print the model flags a scenario resolves to
    Flags {
        /// Scenario directory
        #[arg(value_hint = ValueHint::DirPath)]
        scenario: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,
    },
    /// Print the table inventory of a scenario
    Inspect {
        /// Scenario directory
        #[arg(value_hint = ValueHint::DirPath)]
        scenario: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
        /// Write output to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct SolveArgs {
    /// Scenario directory
    #[arg(value_hint = ValueHint::DirPath)]
    pub scenario: PathBuf,

    /// Run configuration file; command-line flags override its values
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Comma-separated variable families to persist after solve
    #[arg(long)]
    pub vars: Option<String>,

    /// Worker threads for queries and index restriction ("auto" = CPU count)
    #[arg(long)]
    pub workers: Option<String>,

    /// Declare variables over full dimension products instead of observed data
    #[arg(long)]
    pub no_restrict: bool,

    /// Persist zero-valued variable instances
    #[arg(long)]
    pub report_zeros: bool,

    /// Keep transmission build decisions binary
    #[arg(long, conflicts_with = "continuous_transmission")]
    pub binary_transmission: bool,

    /// Relax transmission build decisions to [0, 1]
    #[arg(long)]
    pub continuous_transmission: bool,

    /// Skip the nodal/transmission sub-model
    #[arg(long)]
    pub no_nodal: bool,

    /// LP/MIP backend (clarabel, highs)
    #[arg(long)]
    pub solver: Option<String>,

    /// Relax integer and binary variables even when the solver supports them
    #[arg(long)]
    pub relax_integers: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Plain,
    Json,
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli_command().debug_assert();
    }

    #[test]
    fn solve_flags_parse() {
        let cli = Cli::try_parse_from([
            "emod",
            "solve",
            "scenarios/utopia",
            "--vars",
            "new_capacity,trade",
            "--workers",
            "auto",
            "--no-nodal",
            "--report-zeros",
        ])
        .unwrap();
        let Commands::Solve(args) = cli.command else {
            panic!("expected solve");
        };
        assert_eq!(args.scenario, PathBuf::from("scenarios/utopia"));
        assert_eq!(args.vars.as_deref(), Some("new_capacity,trade"));
        assert!(args.no_nodal && args.report_zeros && !args.no_restrict);
    }

    #[test]
    fn transmission_modes_conflict() {
        let parsed = Cli::try_parse_from([
            "emod",
            "solve",
            "s",
            "--binary-transmission",
            "--continuous-transmission",
        ]);
        assert!(parsed.is_err());
    }
}
