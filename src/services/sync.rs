use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::azure::ArmSubscription;
use crate::database::DatabaseError;
use crate::database::models::{NewResourceGroup, NewSubscription, SyncedApp, User};
use crate::error::ApiError;
use crate::state::AppState;

/// Counts of records written by one sync
#[derive(Debug, Default, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub subscriptions: usize,
    pub resource_groups: usize,
    pub apps: usize,
}

/// Mirror the user's subscriptions, resource groups and web apps from Azure.
/// Subscriptions are processed concurrently; any failure aborts the sync.
pub async fn sync_azure(state: &AppState, user: &User, token: &str) -> Result<SyncSummary, ApiError> {
    let subscriptions = state.azure.list_subscriptions(token).await?;

    for sub in &subscriptions {
        state
            .store
            .upsert_subscription(NewSubscription {
                user_id: user.id,
                subscription_id: sub.subscription_id.clone(),
                display_name: sub.display_name.clone(),
                tenant_id: sub.tenant_id.clone(),
            })
            .await?;
    }

    let per_subscription = try_join_all(subscriptions.iter().map(|sub| sync_subscription(state, user, token, sub))).await?;

    let summary = per_subscription.into_iter().fold(
        SyncSummary {
            subscriptions: subscriptions.len(),
            ..SyncSummary::default()
        },
        |mut acc, (groups, apps)| {
            acc.resource_groups += groups;
            acc.apps += apps;
            acc
        },
    );

    info!(
        "Synced {} subscriptions, {} resource groups, {} apps for {}",
        summary.subscriptions, summary.resource_groups, summary.apps, user.email
    );
    Ok(summary)
}

async fn sync_subscription(
    state: &AppState,
    user: &User,
    token: &str,
    sub: &ArmSubscription,
) -> Result<(usize, usize), ApiError> {
    let (groups, sites) = futures::try_join!(
        state.azure.list_resource_groups(token, &sub.subscription_id),
        state.azure.list_web_apps(token, &sub.subscription_id),
    )?;

    for group in &groups {
        state
            .store
            .upsert_resource_group(NewResourceGroup {
                user_id: user.id,
                subscription_id: sub.subscription_id.clone(),
                name: group.name.clone(),
                location: group.location.clone(),
            })
            .await?;
    }

    let mut apps = 0;
    for site in &sites {
        let Some(resource_group) = site.resource_group() else {
            debug!("Skipping site {} without a resource group in its id", site.id);
            continue;
        };
        let synced = state
            .store
            .upsert_synced_app(SyncedApp {
                user_id: user.id,
                subscription_id: sub.subscription_id.clone(),
                app_name: site.name.clone(),
                resource_group,
                location: site.location.clone(),
            })
            .await;

        match synced {
            Ok(_) => apps += 1,
            // A draft app already uses the site name as its display name
            Err(DatabaseError::Conflict(_)) => {
                warn!("Skipping site {}: an app named {} already exists", site.id, site.name);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok((groups.len(), apps))
}
