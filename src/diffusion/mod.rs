//! Batched generation: sub-batch loop, on-disk artifacts, grid tiling and
//! media upload.

pub mod grid;
mod runner;

#[cfg(test)]
mod tests;

pub use runner::{BatchResult, BatchRunner, SubBatches};
