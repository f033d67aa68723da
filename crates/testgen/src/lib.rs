//! Synthetic transactional workloads for exercising the anomaly checker.
//!
//! Not on the verification path: the generator exists so tests and the
//! CLI have realistic histories to feed through `adya_core`.

pub mod generator;

pub use generator::{
    generate_history, generate_mult_histories, Generator, GeneratorParams, History, KeyDist,
};
