//! sicheck CLI -- verify transactional histories against snapshot
//! isolation.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod render;

#[derive(Debug, Parser)]
#[command(
    name = "sicheck",
    about = "Offline snapshot-isolation checker for transactional key-value histories"
)]
pub struct App {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Verify a history file against snapshot isolation
    Verify(VerifyArgs),
}

#[derive(Debug, Parser)]
pub struct VerifyArgs {
    /// History file with one `r(key,value,session,txn)` or
    /// `w(key,value,session,txn)` event per line
    pub history: PathBuf,
    /// Render the counterexample as Graphviz dot instead of plain text
    #[arg(long)]
    pub dot: bool,
    /// Output the verdict as JSON
    #[arg(long, conflicts_with = "dot")]
    pub json: bool,
    /// Emit one constraint per conflicting key and reader instead of one
    /// per conflicting transaction pair
    #[arg(long)]
    pub no_coalesce: bool,
    /// Skip the reachability pruning pass
    #[arg(long)]
    pub no_pruning: bool,
    /// Stop pruning when a round discharges at most this fraction of all
    /// constraints
    #[arg(long, default_value_t = 0.01)]
    pub stop_threshold: f64,
}
