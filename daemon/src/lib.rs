// Meridian Daemon Library
// Exposes the execution core for integration tests and RPC embedding

#![allow(clippy::type_complexity)]
#![allow(clippy::collapsible_else_if)]

extern crate log;

pub mod config;
pub mod core;
