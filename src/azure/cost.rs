use serde_json::{json, Value};

use super::{expect_success, AzureClient, AzureError, SiteRef};

const COST_API: &str = "2023-03-01";

impl AzureClient {
    /// Month-to-date pre-tax cost of one site
    pub async fn site_cost(&self, token: &str, site: SiteRef<'_>) -> Result<f64, AzureError> {
        let url = self.arm_url(
            &format!(
                "/subscriptions/{}/providers/Microsoft.CostManagement/query",
                site.subscription_id
            ),
            COST_API,
        );
        let request = self.http.post(url).bearer_auth(token).json(&cost_query(&site.path()));
        let body = expect_success(self.send(request).await?).await?;
        Ok(cost_from_rows(&body))
    }
}

fn cost_query(resource_id: &str) -> Value {
    json!({
        "type": "ActualCost",
        "timeframe": "MonthToDate",
        "dataset": {
            "granularity": "None",
            "aggregation": {
                "totalCost": { "name": "PreTaxCost", "function": "Sum" }
            },
            "filter": {
                "dimensions": {
                    "name": "ResourceId",
                    "operator": "In",
                    "values": [resource_id]
                }
            }
        }
    })
}

/// `properties.rows[0][0]`, 0 when the query returned nothing
fn cost_from_rows(body: &Value) -> f64 {
    body.pointer("/properties/rows/0/0")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}
