//! Sharegate - access-gated share links for self-hosted media servers
//!
//! This library crate exposes the proxy for the binary and for integration
//! testing.

pub mod config;
pub mod origin;
pub mod proxy;
pub mod server;
