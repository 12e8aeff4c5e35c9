pub mod app;
pub mod resource_group;
pub mod subscription;
pub mod user;

pub use app::{App, AppSettingsUpdate, NewApp, SyncedApp, NO_BUDGET};
pub use resource_group::{NewResourceGroup, ResourceGroup};
pub use subscription::{NewSubscription, Subscription};
pub use user::{AzureLink, NewUser, User};
