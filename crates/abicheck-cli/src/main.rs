use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

mod commands;
mod logging;
mod reporter;

/// Aggregate call verification harness.
///
/// Calls C functions through libffi from type signatures such as `i{ff}i{ff}`,
/// has each callee echo its arguments back, and checks both the echoed
/// arguments and the returned value against a seeded expected table.
///
/// EXAMPLES:
///     abicheck run                      Run every built-in case
///     abicheck run --case 3 --case 7    Run two cases
///     abicheck run --from 10 --to 15    Run an inclusive range
///     abicheck run --json               Print the run summary as JSON
///     abicheck list                     Show the built-in cases
///
/// ENVIRONMENT VARIABLES:
///     ABICHECK_ARG_BUFFER_SIZE  Call-engine argument capacity in bytes
///     ABICHECK_MAX_ARGS         Value-table bound
///     ABICHECK_LOG              Log filter directive (falls back to RUST_LOG)
///     ABICHECK_LOG_LEVEL        Log level when no filter directive is set
///     ABICHECK_LOG_JSON         Set to '1' for JSON log lines
///     ABICHECK_JSON             Set to '1' for JSON output by default
///     NO_COLOR                  Set to disable colored output
#[derive(Parser)]
#[command(name = "abicheck")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the built-in aggregate call suite
    ///
    /// Prints `index:signature:1|0` per case, the diagnostic of each
    /// failing case, and a closing `result: call_aggrs: 1|0` line.
    /// Exits with status 1 if any selected case failed.
    ///
    /// EXAMPLES:
    ///     abicheck run                          Run every case
    ///     abicheck run -c 12                    Run case 12
    ///     abicheck run --from 5 --to 9 -v       Verbose run of cases 5..=9
    ///     abicheck run --config ci/abicheck.toml
    #[command(visible_alias = "r")]
    Run {
        /// Case index to run (repeatable)
        #[arg(long = "case", short = 'c', value_name = "N", conflicts_with_all = ["from", "to"])]
        cases: Vec<usize>,
        /// First case of an inclusive range
        #[arg(long, value_name = "N")]
        from: Option<usize>,
        /// Last case of an inclusive range
        #[arg(long, value_name = "N")]
        to: Option<usize>,
        /// Output the run summary in JSON format
        #[arg(long, env = "ABICHECK_JSON")]
        json: bool,
        /// Show PASS/FAIL lines with timings and a summary
        #[arg(long, short = 'v')]
        verbose: bool,
        /// Disable colored output
        #[arg(long, env = "NO_COLOR")]
        no_color: bool,
        /// Configuration file (default: nearest abicheck.toml)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
        /// Log filter, e.g. `debug` or `abicheck_runtime=trace`
        #[arg(long, value_name = "LEVEL")]
        log_level: Option<String>,
        /// Call-engine argument capacity in bytes
        #[arg(long, value_name = "BYTES")]
        arg_buffer_size: Option<usize>,
        /// Value-table bound
        #[arg(long, value_name = "N")]
        max_args: Option<usize>,
    },

    /// List the built-in cases
    ///
    /// EXAMPLES:
    ///     abicheck list              One `index:signature` line per case
    ///     abicheck list --json       JSON array of cases
    #[command(visible_alias = "ls")]
    List {
        /// Output in JSON format
        #[arg(long, env = "ABICHECK_JSON")]
        json: bool,
    },

    /// Generate shell completion scripts
    ///
    /// EXAMPLES:
    ///     abicheck completions bash > ~/.local/share/bash-completion/completions/abicheck
    ///     abicheck completions zsh > ~/.zfunc/_abicheck
    ///     abicheck completions fish > ~/.config/fish/completions/abicheck.fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            cases,
            from,
            to,
            json,
            verbose,
            no_color,
            config,
            log_level,
            arg_buffer_size,
            max_args,
        } => {
            let args = commands::run::RunArgs {
                cases,
                from,
                to,
                json,
                verbose,
                no_color,
                config,
                log_level,
                arg_buffer_size,
                max_args,
            };
            let code = commands::run::run(args)?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::List { json } => commands::list::run(json)?,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_repeated_case_flag() {
        let cli = Cli::parse_from(["abicheck", "run", "--case", "3", "-c", "7"]);
        match cli.command {
            Commands::Run { cases, .. } => assert_eq!(cases, vec![3, 7]),
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_range_flags() {
        let cli = Cli::parse_from(["abicheck", "run", "--from", "2", "--to", "4"]);
        match cli.command {
            Commands::Run { from, to, .. } => {
                assert_eq!(from, Some(2));
                assert_eq!(to, Some(4));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_case_conflicts_with_range() {
        let result = Cli::try_parse_from(["abicheck", "run", "--case", "1", "--from", "2"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_alias_ls_for_list() {
        let cli = Cli::parse_from(["abicheck", "ls"]);
        assert!(matches!(cli.command, Commands::List { .. }));
    }

    #[test]
    fn test_cli_completions_bash() {
        let cli = Cli::parse_from(["abicheck", "completions", "bash"]);
        match cli.command {
            Commands::Completions { shell } => assert_eq!(shell, Shell::Bash),
            _ => panic!("Expected Completions command"),
        }
    }
}
