//! Application layer: settings, one-shot command handlers and the stdio tool server.

pub(crate) mod commands;
pub(crate) mod config;
pub(crate) mod rpc;
