//! # colima-manager: serialized lifecycle control for Colima profiles
//!
//! Facade crate that re-exports the workspace crates so consumers
//! can depend on a single `colima_manager` library.
//!
//! ## Crate breakdown
//!
//! | Module | Crate | Purpose |
//! |--------|-------|---------|
//! | [`core`] | cmgr-core | Faults, profile types, lock registry, status classifier, config |
//! | [`runtime`] | cmgr-runtime | Subprocesses, Colima/Homebrew collaborators, orchestrator, readiness |
//! | [`api`] | cmgr-api | HTTP routes, fault-to-status mapping, graceful shutdown |
//! | [`cli`] | cmgr-cli | Clap commands, logging, terminal output |

pub use cmgr_api as api;
pub use cmgr_cli as cli;
pub use cmgr_core as core;
pub use cmgr_runtime as runtime;
