//! Core algorithms of the sicheck snapshot-isolation checker: the history
//! model, the known precedence graph, bitmap reachability, constraint
//! generation, and pruning. The SAT-backed decision procedure lives in
//! `sicheck_sat`.

pub mod graph;
pub mod history;
pub mod verifier;

pub use verifier::{Counterexample, Verdict, VerifyOptions};
