//! # mastodiff-providers
//!
//! HTTP collaborators for mastodiff: the diffusion pipeline server, an
//! OpenAI-compatible chat assistant and paste services.

pub mod diffusers;
pub mod openai;
pub mod paste;
