use std::{fs, process};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sicheck_cli::{render, App, Command};
use sicheck_core::history::text::parse_history;
use sicheck_core::verifier::{Verdict, VerifyOptions};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let app = App::parse();
    match &app.command {
        Command::Verify(args) => verify(args),
    }
}

fn verify(args: &sicheck_cli::VerifyArgs) {
    let input = fs::read_to_string(&args.history).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {e}", args.history.display());
        process::exit(2);
    });

    let sessions = parse_history(&input).unwrap_or_else(|e| {
        eprintln!("Failed to parse {}: {e}", args.history.display());
        process::exit(2);
    });

    let options = VerifyOptions::builder()
        .coalesce_constraints(!args.no_coalesce)
        .enable_pruning(!args.no_pruning)
        .stop_threshold(args.stop_threshold)
        .build();

    let verdict = sicheck_sat::verify(&sessions, &options).unwrap_or_else(|e| {
        eprintln!("Invalid history: {e}");
        process::exit(2);
    });

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&verdict).expect("verdict serializes")
        );
        process::exit(i32::from(!verdict.is_accept()));
    }

    match verdict {
        Verdict::Accept => println!("ACCEPT"),
        Verdict::Reject(counterexample) => {
            println!("REJECT");
            if args.dot {
                print!("{}", render::to_dot(&counterexample));
            } else {
                print!("{}", render::to_text(&sessions, &counterexample));
            }
            process::exit(1);
        }
    }
}
