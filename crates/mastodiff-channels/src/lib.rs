//! # mastodiff-channels
//!
//! Social network integrations for mastodiff.

pub mod mastodon;
