//! # RelMap Bench
//!
//! Criterion benchmarks for the RelMap core: graph expansion,
//! dependency ordering, and end-to-end transaction throughput.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;
