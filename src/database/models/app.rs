use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Budget value meaning "no budget configured"
pub const NO_BUDGET: f64 = -1.0;

/// Dashboard app. Starts as a draft; `app_name` is the Azure site name and is
/// only set once the web app exists (created here or discovered by sync).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub app_service_name: String,
    pub app_name: Option<String>,
    pub location: Option<String>,
    pub budget: f64,
    pub current_cost: f64,
    pub status: bool,
    pub is_draft: bool,
    pub auto_stop: bool,
    pub env_vars: Json<BTreeMap<String, String>>,
    pub deployed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl App {
    pub fn has_budget(&self) -> bool {
        self.budget > 0.0
    }
}

#[derive(Debug, Clone)]
pub struct NewApp {
    pub user_id: Uuid,
    pub name: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub app_service_name: String,
    pub budget: f64,
}

/// A web app discovered in Azure during sync
#[derive(Debug, Clone)]
pub struct SyncedApp {
    pub user_id: Uuid,
    pub subscription_id: String,
    pub app_name: String,
    pub resource_group: String,
    pub location: Option<String>,
}

/// Partial update from the monitor page; `env_vars` is merged, not replaced
#[derive(Debug, Clone, Default)]
pub struct AppSettingsUpdate {
    pub budget: Option<f64>,
    pub auto_stop: Option<bool>,
    pub env_vars: Option<BTreeMap<String, String>>,
}
