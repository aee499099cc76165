//! Auto-order dispatcher (spec.md §4.C8): one independent order call per
//! order intent. Failures are logged but never cancel sibling orders or
//! revert evaluator state (spec.md §7).

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sniper_core::OrderIntent;
use tracing::warn;

use crate::errors::DispatchError;

#[async_trait]
pub trait OrderDispatcher: Send + Sync {
    /// Issues one order call. Returns `Ok(())` on success; any failure is
    /// already logged by the implementation before returning.
    async fn dispatch_one(&self, intent: &OrderIntent) -> Result<(), DispatchError>;
}

#[derive(Debug, Serialize)]
struct OrderRequest<'a> {
    #[serde(rename = "planCode")]
    plan_code: &'a str,
    datacenter: &'a str,
    options: &'a [String],
    #[serde(rename = "fromMonitor")]
    from_monitor: bool,
    #[serde(rename = "skipDuplicateCheck")]
    skip_duplicate_check: bool,
}

/// `reqwest`-backed implementation hitting
/// `POST /api/config-sniper/quick-order` (spec.md §6).
pub struct ReqwestOrderDispatcher {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    deadline: Duration,
}

impl ReqwestOrderDispatcher {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: String, api_key: String, deadline: Duration) -> Self {
        Self { client, base_url, api_key, deadline }
    }
}

#[async_trait]
impl OrderDispatcher for ReqwestOrderDispatcher {
    async fn dispatch_one(&self, intent: &OrderIntent) -> Result<(), DispatchError> {
        let url = format!("{}/api/config-sniper/quick-order", self.base_url);
        let body = OrderRequest {
            plan_code: &intent.plan_code,
            datacenter: &intent.datacenter,
            options: &intent.options,
            from_monitor: true,
            skip_duplicate_check: true,
        };

        let fut = self
            .client
            .post(url)
            .header("X-API-Key", &self.api_key)
            .json(&body)
            .send();

        let response = tokio::time::timeout(self.deadline, fut)
            .await
            .map_err(|_| DispatchError::Deadline)?
            .map_err(DispatchError::Transport)?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(plan_code = %intent.plan_code, datacenter = %intent.datacenter, %status, "order dispatch rejected");
            Err(DispatchError::Rejected(format!("{status}: {text}")))
        }
    }
}

/// Runs `intent.quantity` independent dispatches, logging aggregate
/// success/failure counts (spec.md §4.C8, §4.C6 step 11).
pub async fn dispatch_all(dispatcher: &dyn OrderDispatcher, intents: &[OrderIntent]) -> (u32, u32) {
    let mut succeeded = 0u32;
    let mut failed = 0u32;
    for intent in intents {
        for _ in 0..intent.quantity {
            match dispatcher.dispatch_one(intent).await {
                Ok(()) => succeeded += 1,
                Err(err) => {
                    failed += 1;
                    warn!(
                        plan_code = %intent.plan_code,
                        datacenter = %intent.datacenter,
                        error = %err,
                        "auto-order attempt failed"
                    );
                }
            }
        }
    }
    (succeeded, failed)
}
