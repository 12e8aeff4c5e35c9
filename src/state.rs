use std::sync::Arc;

use crate::azure::{AzureClient, AzureError};
use crate::config::AppConfig;
use crate::database::SharedStore;

/// Shared handler state: configuration, persistence and the Azure client
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: SharedStore,
    pub azure: AzureClient,
}

impl AppState {
    pub fn new(config: AppConfig, store: SharedStore) -> Result<Self, AzureError> {
        let azure = AzureClient::new(config.azure.clone())?;
        Ok(Self {
            config: Arc::new(config),
            store,
            azure,
        })
    }
}
