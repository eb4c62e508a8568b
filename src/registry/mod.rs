//! Async HTTP clients for package registries (PyPI, npm, the Go module proxy).
//!
//! Each module answers the same questions for its registry: does a package
//! (and version) exist, what is its latest version, and what does its
//! metadata say. "Not found" is a value (`Ok(None)` or an invalid
//! [`Validation`](crate::models::Validation)); `Err` means the registry
//! could not be reached or answered garbage.

pub mod goproxy;
pub mod index_cache;
pub mod npm;
pub mod pypi;

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use reqwest::Client;

pub const USER_AGENT: &str = concat!("depdeck/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for registry lookups.
pub fn client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

/// Look up the latest version of every name, `batch_size` requests at a time.
///
/// Lookups that fail are logged and reported as `None`, same as unknown packages.
pub async fn fetch_latest_batched<F, Fut>(
    names: &[String],
    batch_size: usize,
    fetch: F,
) -> HashMap<String, Option<String>>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Option<String>>>,
{
    let mut latest = HashMap::with_capacity(names.len());

    for batch in names.chunks(batch_size.max(1)) {
        let futures: Vec<_> = batch.iter().map(|name| fetch(name.clone())).collect();
        let results = join_all(futures).await;

        for (name, result) in batch.iter().zip(results) {
            let version = match result {
                Ok(version) => version,
                Err(e) => {
                    log::warn!("Latest version lookup for {} failed: {e:#}", name);
                    None
                }
            };
            latest.insert(name.clone(), version);
        }
    }

    latest
}
