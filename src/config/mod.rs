//! Harness settings for mswarm.
//!
//! This module defines `SwarmSettings`, the optional YAML file passed with
//! `--config`. Unknown fields are ignored, every field has a default, and
//! values are validated after parsing.

mod model;
mod operations;


pub use model::SwarmSettings;
