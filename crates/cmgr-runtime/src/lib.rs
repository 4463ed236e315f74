// cmgr-runtime: Host integration and profile lifecycle orchestration
// Depends on cmgr-core (types, faults, classifier, locks)

pub mod bootstrap;
pub mod brew;
pub mod colima;
pub mod fs;
pub mod orchestrator;
pub mod readiness;
pub mod shell;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod traits;
