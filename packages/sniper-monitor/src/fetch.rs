//! Availability fetchers for the demonstration binary. Catalog discovery is
//! out of scope (spec.md §1 Non-goals): the real integration is left to
//! embedders, who implement [`FetchAvailability`] against their own catalog
//! client. This module provides the two fetchers the binary needs to be
//! runnable on its own: a no-op stub and a fixture file reader for
//! smoke-testing against a real price/order API pair.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use sniper_core::{ConfigRow, FetchAvailability, FetchedAvailability};
use tracing::warn;

/// Always reports a fetch failure. Useful for wiring a scheduler when only
/// the auto-order/notification path is under test.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullFetchAvailability;

#[async_trait]
impl FetchAvailability for NullFetchAvailability {
    async fn fetch(&self, _plan_code: &str) -> Option<FetchedAvailability> {
        None
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAvailability {
    Configured(HashMap<String, RawConfigRow>),
    Simple(HashMap<String, String>),
}

#[derive(Debug, Deserialize)]
struct RawConfigRow {
    datacenters: HashMap<String, String>,
    memory: String,
    storage: String,
    #[serde(default)]
    options: Vec<String>,
}

/// Re-reads a JSON fixture from disk on every call and reshapes it into
/// [`FetchedAvailability`]. The file is expected to hold either
/// `{dc: status}` or `{configKey: {datacenters, memory, storage, options}}`.
pub struct FileFetchAvailability {
    path: PathBuf,
}

impl FileFetchAvailability {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl FetchAvailability for FileFetchAvailability {
    async fn fetch(&self, plan_code: &str) -> Option<FetchedAvailability> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) => {
                warn!(plan_code, path = %self.path.display(), error = %err, "fixture read failed");
                return None;
            }
        };
        match serde_json::from_str::<RawAvailability>(&contents) {
            Ok(RawAvailability::Simple(map)) => Some(FetchedAvailability::Simple(map)),
            Ok(RawAvailability::Configured(rows)) => Some(FetchedAvailability::Configured(
                rows.into_iter()
                    .map(|(key, row)| {
                        (
                            key,
                            ConfigRow {
                                datacenters: row.datacenters,
                                memory: row.memory,
                                storage: row.storage,
                                options: row.options,
                            },
                        )
                    })
                    .collect(),
            )),
            Err(err) => {
                warn!(plan_code, error = %err, "fixture parse failed");
                None
            }
        }
    }
}
