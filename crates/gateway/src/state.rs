use std::sync::Arc;

use common::allocation::{LocalAllocation, MemoryAllocation};
use common::gateway::{AllocationGateway, StorageGateway};

use crate::config::{AllocationConfig, AppConfig};

/// Shared state handed to every request handler
#[derive(Clone)]
pub struct AppState {
    gateway: Arc<dyn StorageGateway>,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Result<Self, StateSetupError> {
        let staging_dir = config.gateway.staging_dir();
        std::fs::create_dir_all(&staging_dir)?;
        tracing::info!("staging reads in {}", staging_dir.display());

        let gateway: Arc<dyn StorageGateway> = match &config.allocation {
            AllocationConfig::Memory => {
                tracing::info!("serving an in-memory allocation");
                let alloc = MemoryAllocation::new(staging_dir);
                Arc::new(AllocationGateway::new(alloc, &config.gateway))
            }
            AllocationConfig::Local { path } => {
                tracing::info!("serving the allocation at {}", path.display());
                let alloc = LocalAllocation::new(path, staging_dir);
                Arc::new(AllocationGateway::new(alloc, &config.gateway))
            }
        };

        Ok(Self { gateway })
    }

    pub fn gateway(&self) -> &dyn StorageGateway {
        self.gateway.as_ref()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("failed to prepare staging directory: {0}")]
    Staging(#[from] std::io::Error),
}
