//! Integration tests.
#![allow(unused_crate_dependencies)]

// Tests related to the search of patterns
mod patterns;

mod evaluation;


// Tests related to different limits set.
mod limits;

// Tests related to ruleset loading and concurrent scans
mod concurrency;

// utils to compile rules and check scan results
mod utils;
