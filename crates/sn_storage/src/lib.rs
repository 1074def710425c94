use async_trait::async_trait;
use sn_core::{NewsStorage, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub mod backends;

pub use backends::*;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn get_error_message() -> &'static str;
    async fn new() -> Result<Self> where Self: Sized;
}

/// Build the repository named on the command line.
pub async fn create_storage(kind: &str, database: Option<&Path>) -> Result<Arc<dyn NewsStorage>> {
    let storage: Arc<dyn NewsStorage> = match kind {
        "memory" => Arc::new(MemoryStorage::new()),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let storage = match database {
                Some(path) => SQLiteStorage::new_with_path(path).await,
                None => <SQLiteStorage as StorageBackend>::new().await,
            };
            match storage {
                Ok(storage) => Arc::new(storage),
                Err(e) => {
                    warn!("{}", SQLiteStorage::get_error_message());
                    return Err(e);
                }
            }
        }
        other => {
            return Err(sn_core::Error::Config(format!("Unknown storage backend: {}", other)));
        }
    };
    info!("🏦 Storage backend initialized (using {})", kind);
    Ok(storage)
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, StorageBackend};
}
