use std::io;
use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::traits::StateStore;

/// [`StateStore`] over the local filesystem. Removal goes through
/// `tokio::fs` so multi-gigabyte disk images never block a runtime worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStateStore;

#[async_trait]
impl StateStore for LocalStateStore {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed state directory");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
