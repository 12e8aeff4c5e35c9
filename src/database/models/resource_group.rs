use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Local mirror of an Azure resource group plus its budget settings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: String,
    pub name: String,
    pub location: Option<String>,
    pub budget: f64,
    pub auto_stop: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewResourceGroup {
    pub user_id: Uuid,
    pub subscription_id: String,
    pub name: String,
    pub location: Option<String>,
}
