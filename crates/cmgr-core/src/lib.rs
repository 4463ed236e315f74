// cmgr-core: Pure types, fault taxonomy, locking and classification
// No process or network I/O here; this is the foundation crate.

pub mod classify;
pub mod config;
pub mod deps;
pub mod error;
pub mod layout;
pub mod lock;
pub mod naming;
pub mod profile;
