// The worldlog CLI.
// Runs an interactive session on stdin, or a script of session lines.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use worldlog::session::{Outcome, Session, SessionConfig};

#[derive(Parser)]
#[clap(
    name = "worldlog",
    about = "An evaluator for lazy nondeterministic expressions over a world of facts",
    long_about = "Expressions evaluate to every alternative they could stand for.\n\nLines starting with '!' assert facts, '#name' defines a name, ':q' quits.",
    version = env!("CARGO_PKG_VERSION")
)]
struct Args {
    #[clap(
        long,
        help = "Load session settings from a JSON file.",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    #[clap(
        long,
        help = "The most alternatives to pull from any one evaluation.",
        value_name = "N"
    )]
    limit: Option<usize>,

    #[clap(
        long,
        help = "Run each line of a file through the session, then exit.",
        value_name = "FILE"
    )]
    script: Option<PathBuf>,
}

fn main() {
    // Use RUST_LOG env var to control log levels, e.g.:
    //   RUST_LOG=worldlog::evaluator=trace cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).without_time())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path).unwrap_or_else(|e| {
            println!("Error loading config: {}", e);
            std::process::exit(1);
        }),
        None => SessionConfig::default(),
    };
    if let Some(limit) = args.limit {
        config.max_results = limit;
    }
    let mut session = Session::new(config);

    if let Some(path) = &args.script {
        let script = match std::fs::read_to_string(path) {
            Ok(script) => script,
            Err(e) => {
                println!("Error reading {}: {}", path.display(), e);
                std::process::exit(1);
            }
        };
        for line in session.run_script(&script) {
            println!("{}", line);
        }
        return;
    }

    run_interactive(&mut session);
}

fn run_interactive(session: &mut Session) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("{}", session.config.prompt);
        if let Err(e) = stdout.flush() {
            println!("Error writing prompt: {}", e);
            return;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            // End of input.
            Ok(0) => {
                println!();
                return;
            }
            Ok(_) => {}
            Err(e) => {
                println!("Error reading input: {}", e);
                return;
            }
        }

        match session.run_line(&line) {
            Ok(Outcome::Quit) => return,
            Ok(Outcome::Lines(lines)) => {
                for line in lines {
                    println!("{}", line);
                }
            }
            Err(e) => println!("{}", e),
        }
    }
}
