#![deny(unsafe_code)]
//! Command-line front end for runway.
//!
//! `serve` runs the gateway in-process; the other commands talk to a
//! running gateway over HTTP.

pub mod client;
pub mod commands;
pub mod handlers;
pub mod parser;

pub use client::{GatewayClient, GatewayClientError};
pub use commands::Commands;
pub use parser::Cli;
