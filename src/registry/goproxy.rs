use std::collections::BTreeMap;

use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;

use crate::models::Validation;

const PROXY: &str = "https://proxy.golang.org";

/// `@latest` and `@v/<version>.info` response body.
#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "Version")]
    version: String,
    #[serde(rename = "Time", default)]
    time: Option<String>,
}

/// Module path escaping for the proxy protocol: each uppercase letter becomes
/// `!` followed by its lowercase form.
pub fn escape_path(module: &str) -> String {
    let mut escaped = String::with_capacity(module.len());
    for c in module.chars() {
        if c.is_ascii_uppercase() {
            escaped.push('!');
            escaped.push(c.to_ascii_lowercase());
        } else {
            escaped.push(c);
        }
    }
    escaped
}

async fn fetch_version_info(client: &Client, module: &str) -> Result<Option<VersionInfo>> {
    let url = format!("{}/{}/@latest", PROXY, escape_path(module));
    let response = client.get(&url).send().await?;

    if !response.status().is_success() {
        return Ok(None);
    }

    Ok(Some(response.json().await?))
}

pub async fn fetch_latest(client: &Client, module: &str) -> Result<Option<String>> {
    Ok(fetch_version_info(client, module).await?.map(|i| i.version))
}

pub async fn validate(client: &Client, module: &str, version: Option<&str>) -> Result<Validation> {
    let Some(info) = fetch_version_info(client, module).await? else {
        return Ok(Validation::invalid(
            format!("Module '{}' not found on the Go module proxy", module),
            None,
        ));
    };
    let latest = Some(info.version);

    let Some(version) = version else {
        return Ok(Validation::ok(latest));
    };

    let url = format!("{}/{}/@v/list", PROXY, escape_path(module));
    let response = client.get(&url).send().await?;
    let listing = if response.status().is_success() {
        response.text().await?
    } else {
        String::new()
    };

    if version_listed(&listing, version) || latest.as_deref() == Some(version) {
        Ok(Validation::ok(latest))
    } else {
        Ok(Validation::invalid(
            format!("Version {} not found for '{}'", version, module),
            latest,
        ))
    }
}

fn version_listed(listing: &str, version: &str) -> bool {
    listing.lines().any(|line| line.trim() == version)
}

pub async fn fetch_metadata(client: &Client, module: &str) -> Result<BTreeMap<String, String>> {
    let mut meta = BTreeMap::new();
    if let Some(info) = fetch_version_info(client, module).await? {
        meta.insert("name".to_string(), module.to_string());
        meta.insert("version".to_string(), info.version);
        if let Some(time) = info.time {
            meta.insert("published".to_string(), time);
        }
        meta.insert("homepage".to_string(), format!("https://pkg.go.dev/{}", module));
    }
    Ok(meta)
}
