//! # lgtv-bridge: LG TV Bridge Service
//!
//! Keeps an in-memory state store in sync with an LG TV over its serial
//! command protocol on TCP, and takes change requests from a line
//! console on stdin.
//!
//! ## Modes
//!
//! - **Run**: connect to the configured TV and bridge until Ctrl-C.
//! - **Generate config**: print the default configuration (`--gen-config`).

pub mod config;
pub mod service;
