use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    App, AppSettingsUpdate, AzureLink, NewApp, NewResourceGroup, NewSubscription, NewUser,
    ResourceGroup, Subscription, SyncedApp, User,
};

pub type SharedStore = Arc<dyn Store>;

/// Persistence for the four dashboard collections.
///
/// Implemented by [`super::PgStore`] (sqlx/PostgreSQL) and
/// [`super::MemoryStore`] (in-process, used by tests and `memory://`).
/// Every write is a single-row operation.
#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> Result<(), DatabaseError>;

    // Users

    /// Fails with `Conflict` when the email is taken
    async fn create_user(&self, user: NewUser) -> Result<User, DatabaseError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;
    /// Stores ARM tokens and flips `is_dev_ops`
    async fn save_azure_link(&self, user_id: Uuid, link: &AzureLink) -> Result<User, DatabaseError>;

    // Subscriptions

    async fn upsert_subscription(&self, sub: NewSubscription) -> Result<Subscription, DatabaseError>;
    async fn list_subscriptions(&self, user_id: Uuid) -> Result<Vec<Subscription>, DatabaseError>;
    /// Lookup by Azure subscription id across all users (budget webhooks carry no session)
    async fn find_subscription(&self, subscription_id: &str) -> Result<Option<Subscription>, DatabaseError>;

    // Resource groups

    /// Fails with `Conflict` when (user, subscription, name) exists
    async fn create_resource_group(&self, group: NewResourceGroup) -> Result<ResourceGroup, DatabaseError>;
    async fn upsert_resource_group(&self, group: NewResourceGroup) -> Result<ResourceGroup, DatabaseError>;
    async fn list_resource_groups(&self, user_id: Uuid) -> Result<Vec<ResourceGroup>, DatabaseError>;
    /// Every group of that name the user tracks, one per subscription, oldest first
    async fn find_resource_groups(&self, user_id: Uuid, name: &str) -> Result<Vec<ResourceGroup>, DatabaseError>;
    async fn find_resource_group_in_subscription(
        &self,
        subscription_id: &str,
        name: &str,
    ) -> Result<Option<ResourceGroup>, DatabaseError>;
    async fn update_resource_group_budget(
        &self,
        id: Uuid,
        budget: f64,
        auto_stop: bool,
    ) -> Result<ResourceGroup, DatabaseError>;

    // Apps

    /// Fails with `Conflict` when the user already has an app with that name
    async fn create_app(&self, app: NewApp) -> Result<App, DatabaseError>;
    async fn find_app(&self, id: Uuid) -> Result<Option<App>, DatabaseError>;
    async fn list_apps(&self, user_id: Uuid) -> Result<Vec<App>, DatabaseError>;
    async fn list_all_apps(&self) -> Result<Vec<App>, DatabaseError>;
    async fn list_apps_in_resource_group(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> Result<Vec<App>, DatabaseError>;
    /// Match on (user, subscription, site name). Existing apps keep their display name.
    async fn upsert_synced_app(&self, app: SyncedApp) -> Result<App, DatabaseError>;
    async fn mark_app_deployed(&self, id: Uuid, app_name: &str) -> Result<App, DatabaseError>;
    async fn update_app_settings(&self, id: Uuid, update: AppSettingsUpdate) -> Result<App, DatabaseError>;
    async fn update_app_cost(&self, id: Uuid, cost: f64) -> Result<(), DatabaseError>;
    async fn delete_app(&self, id: Uuid) -> Result<(), DatabaseError>;
}
