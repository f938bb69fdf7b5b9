//! qtorsion - pooled z-test analysis of comparative measurement experiments
//!
//! Reads result units holding the outcome counts of two (A, B) or three
//! (A, B, C) jobs, pools the counts across a directory of units, and reports
//! the probability of the all-zero outcome per variant together with the z
//! statistics separating them.

pub mod batch;
pub mod cli;
pub mod config;
pub mod counts;
pub mod csv_output;
pub mod extremal;
pub mod json_output;
pub mod loader;
pub mod report;
pub mod statistics;
