//! # stripctl
//!
//! Terminal controller for a BLE RGB LED strip.
//!
//! This library exists to enable testing of the internals and to keep CLI
//! dispatch (main.rs) separate from application logic.
//!
//! ## Architecture
//!
//! - **Entry Point**: `Stripctl` runs an interactive session with resource management
//! - **Core**: `core` owns the shared color state, the animator and the session threads
//! - **Device**: `device` holds the link trait, the wire format and the rate-limited transport
//! - **Samplers**: `sampler` turns screen content and microphone input into color requests
//! - **Controller**: `ui` is the crossterm terminal front end
//! - **Configuration**: `config` for TOML-based settings
//! - **Commands**: `commands` for the one-shot CLI commands (set, on, off, help)
//! - **Infrastructure**: signal handling, lock file, logging and utilities

// Logger must be first for macro availability
#[macro_use]
pub mod common;

pub mod args;
pub mod color;
pub mod commands;
pub mod config;
pub mod core;
pub mod device;
pub mod io;
pub mod sampler;
pub mod ui;

mod stripctl;

pub use stripctl::Stripctl;
