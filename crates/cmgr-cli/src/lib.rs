// cmgr-cli: clap commands, logging setup, terminal output
// Depends on cmgr-core, cmgr-runtime, cmgr-api

pub mod commands;
pub mod logging;
pub mod ui;

pub use commands::run;
