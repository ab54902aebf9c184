use clap::{Parser as ClapParser, Subcommand};
use space_lua::cli::{self, CheckOptions, CheckResult, CliError, RunOptions, RunOutcome};
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(ClapParser)]
#[command(name = "slua")]
#[command(about = "slua - An embeddable Lua dialect with collection queries")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a script without running it
    Check {
        /// Script file (reads from stdin if not provided)
        file: Option<PathBuf>,

        /// Dump the token stream instead of parsing
        #[arg(long)]
        tokens: bool,
    },

    /// Run a script and print its returned values as JSON
    Run {
        /// Script file (reads from stdin if not provided)
        file: Option<PathBuf>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// JSON document bound as the global `data`
        #[arg(short, long)]
        input: Option<String>,

        /// Maximum call depth before aborting
        #[arg(long)]
        max_call_depth: Option<usize>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { file, tokens } => run_check(file, tokens),
        Commands::Run {
            file,
            pretty,
            input,
            max_call_depth,
        } => run_run(file, pretty, input, max_call_depth),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn read_source(file: Option<PathBuf>) -> Result<String, CliError> {
    match file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
        None => Err(CliError::NoInput),
    }
}

fn run_check(file: Option<PathBuf>, tokens: bool) -> Result<(), CliError> {
    let source = read_source(file)?;
    match cli::execute_check(&CheckOptions { source, tokens })? {
        CheckResult::SyntaxValid => println!("Syntax is valid"),
        CheckResult::Tokens(dump) => {
            for line in dump {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

fn run_run(
    file: Option<PathBuf>,
    pretty: bool,
    input: Option<String>,
    max_call_depth: Option<usize>,
) -> Result<(), CliError> {
    let source = read_source(file)?;
    let options = RunOptions {
        source,
        pretty,
        input,
        max_call_depth,
    };
    match cli::execute_run(&options)? {
        RunOutcome::NoResult => {}
        RunOutcome::Results(rendered) => {
            for line in rendered {
                println!("{}", line);
            }
        }
    }
    Ok(())
}
