//! Price verifier (spec.md §4.C4): a bounded-deadline call to the internal
//! price oracle, collapsing every failure mode into `orderable = false` with
//! a human-readable reason. Grounded on the teacher's
//! `service/middleware/timeout.rs` (`tokio::time::timeout` wrapping a
//! future) and on the HTTP-client idiom in
//! `other_examples/0aa55b13_t0rbik-services__crates-alerter-src-main.rs.rs`
//! (`reqwest::Client` + a small typed response struct per endpoint).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sniper_core::{PriceHint, VerifierOutcome};
use tracing::warn;

use crate::errors::VerifierError;

#[async_trait]
pub trait PriceVerifier: Send + Sync {
    async fn verify(&self, plan_code: &str, datacenter: &str, options: &[String]) -> VerifierOutcome;
}

#[derive(Debug, Serialize)]
struct PriceRequest<'a> {
    plan_code: &'a str,
    datacenter: &'a str,
    options: &'a [String],
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    success: bool,
    price: Option<PriceBlock>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceBlock {
    prices: PricesInner,
}

#[derive(Debug, Deserialize)]
struct PricesInner {
    #[serde(rename = "withTax")]
    with_tax: Option<f64>,
    #[serde(rename = "currencyCode")]
    currency_code: Option<String>,
}

/// `reqwest`-backed implementation of [`PriceVerifier`] hitting
/// `POST /api/internal/monitor/price` (spec.md §6).
pub struct ReqwestPriceVerifier {
    client: reqwest::Client,
    base_url: String,
    deadline: Duration,
}

impl ReqwestPriceVerifier {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: String, deadline: Duration) -> Self {
        Self { client, base_url, deadline }
    }

    async fn call(
        &self,
        plan_code: &str,
        datacenter: &str,
        options: &[String],
    ) -> Result<PriceResponse, VerifierError> {
        let url = format!("{}/api/internal/monitor/price", self.base_url);
        let body = PriceRequest { plan_code, datacenter, options };

        let fut = self.client.post(url).json(&body).send();
        let response = tokio::time::timeout(self.deadline, fut)
            .await
            .map_err(|_| VerifierError::Deadline)??;

        response.json::<PriceResponse>().await.map_err(VerifierError::Transport)
    }
}

#[async_trait]
impl PriceVerifier for ReqwestPriceVerifier {
    async fn verify(&self, plan_code: &str, datacenter: &str, options: &[String]) -> VerifierOutcome {
        match self.call(plan_code, datacenter, options).await {
            Err(err) => {
                warn!(plan_code, datacenter, error = %err, "price verification failed");
                VerifierOutcome { orderable: false, reason: Some(err.reason()), price_hint: None }
            }
            Ok(resp) if !resp.success => {
                let msg = resp.error.unwrap_or_else(|| "no reason given".to_string());
                VerifierOutcome {
                    orderable: false,
                    reason: Some(VerifierError::OracleFailure(msg).reason()),
                    price_hint: None,
                }
            }
            Ok(resp) => {
                let block = resp.price;
                let with_tax = block.as_ref().and_then(|p| p.prices.with_tax);
                let currency = block.and_then(|p| p.prices.currency_code);
                match with_tax {
                    Some(amount) if amount != 0.0 => VerifierOutcome {
                        orderable: true,
                        reason: None,
                        price_hint: Some(PriceHint { with_tax: amount, currency }),
                    },
                    _ => VerifierOutcome {
                        orderable: false,
                        reason: Some(VerifierError::MissingPrice.reason()),
                        price_hint: None,
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_response_parses_nonzero_with_tax() {
        let json = r#"{"success":true,"price":{"prices":{"withTax":199.99,"currencyCode":"EUR"}}}"#;
        let parsed: PriceResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.price.unwrap().prices.with_tax, Some(199.99));
    }

    #[test]
    fn price_response_parses_failure_shape() {
        let json = r#"{"success":false,"error":"no stock"}"#;
        let parsed: PriceResponse = serde_json::from_str(json).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.error.as_deref(), Some("no stock"));
    }
}
