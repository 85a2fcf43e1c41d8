//! # Configuration
//!
//! Layered server configuration: profile defaults, an optional file,
//! `LOADBOARD_*` environment overrides, then command-line overrides.

pub mod server;
