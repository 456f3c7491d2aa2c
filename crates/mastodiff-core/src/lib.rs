//! # mastodiff-core
//!
//! Core types, traits, configuration, and request compilation for the
//! mastodiff bot.

pub mod config;
pub mod context;
pub mod error;
pub mod knobs;
pub mod message;
pub mod normalize;
pub mod params;
pub mod traits;
