use std::collections::BTreeMap;

use anyhow::Result;
use reqwest::{Client, Url};
use serde_json::Value;

use crate::models::{RegistryPackageInfo, Validation};

const REGISTRY: &str = "https://registry.npmjs.org";

/// Scoped packages need URL encoding: @scope/pkg → %40scope%2Fpkg
fn encode_name(name: &str) -> String {
    name.replace('@', "%40").replace('/', "%2F")
}

async fn get_json(client: &Client, url: &str) -> Result<Option<Value>> {
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await?;

    if !response.status().is_success() {
        return Ok(None);
    }

    Ok(Some(response.json().await?))
}

/// Full packument (`GET /<name>`).
async fn fetch_packument(client: &Client, name: &str) -> Result<Option<Value>> {
    get_json(client, &format!("{}/{}", REGISTRY, encode_name(name))).await
}

/// Manifest of the `latest` dist-tag (`GET /<name>/latest`).
async fn fetch_latest_manifest(client: &Client, name: &str) -> Result<Option<Value>> {
    get_json(client, &format!("{}/{}/latest", REGISTRY, encode_name(name))).await
}

pub async fn validate(client: &Client, name: &str, version: Option<&str>) -> Result<Validation> {
    let Some(data) = fetch_packument(client, name).await? else {
        return Ok(Validation::invalid(
            format!("Package '{}' not found on npm", name),
            None,
        ));
    };
    Ok(validate_packument(&data, name, version))
}

fn validate_packument(data: &Value, name: &str, version: Option<&str>) -> Validation {
    let latest = data
        .get("dist-tags")
        .and_then(|d| d.get("latest"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    if let Some(version) = version {
        let known = data
            .get("versions")
            .and_then(|vs| vs.as_object())
            .is_some_and(|vs| vs.contains_key(version));
        if !known {
            return Validation::invalid(
                format!("Version {} not found for '{}'", version, name),
                latest,
            );
        }
    }
    Validation::ok(latest)
}

pub async fn fetch_latest(client: &Client, name: &str) -> Result<Option<String>> {
    Ok(fetch_latest_manifest(client, name)
        .await?
        .and_then(|m| m.get("version").and_then(|v| v.as_str()).map(str::to_string)))
}

pub async fn fetch_metadata(client: &Client, name: &str) -> Result<BTreeMap<String, String>> {
    Ok(fetch_latest_manifest(client, name)
        .await?
        .map(|m| manifest_metadata(&m))
        .unwrap_or_default())
}

fn manifest_metadata(manifest: &Value) -> BTreeMap<String, String> {
    let mut meta = BTreeMap::new();
    for (field, label) in [
        ("name", "name"),
        ("version", "version"),
        ("description", "summary"),
        ("license", "license"),
        ("homepage", "homepage"),
    ] {
        if let Some(value) = manifest.get(field).and_then(|v| v.as_str()) {
            if !value.is_empty() {
                meta.insert(label.to_string(), value.to_string());
            }
        }
    }
    // `author` is either "Name <mail>" or {"name": ...}
    let author = manifest.get("author").and_then(|a| {
        a.as_str()
            .or_else(|| a.get("name").and_then(|n| n.as_str()))
            .map(str::to_string)
    });
    if let Some(author) = author {
        meta.insert("author".to_string(), author);
    }
    let deps = dependency_names(manifest);
    if !deps.is_empty() {
        meta.insert("requires".to_string(), deps.join(", "));
    }
    meta
}

fn dependency_names(manifest: &Value) -> Vec<String> {
    manifest
        .get("dependencies")
        .and_then(|d| d.as_object())
        .map(|deps| deps.keys().cloned().collect())
        .unwrap_or_default()
}

/// Runtime dependencies declared by the latest published version.
pub async fn fetch_requires(client: &Client, name: &str) -> Result<Vec<String>> {
    Ok(fetch_latest_manifest(client, name)
        .await?
        .map(|m| dependency_names(&m))
        .unwrap_or_default())
}

pub async fn search(client: &Client, query: &str, size: usize) -> Result<Vec<RegistryPackageInfo>> {
    let url = Url::parse_with_params(
        &format!("{}/-/v1/search", REGISTRY),
        &[("text", query), ("size", &size.to_string())],
    )?;
    let Some(data) = get_json(client, url.as_str()).await? else {
        return Ok(Vec::new());
    };
    Ok(search_results(&data))
}

fn search_results(data: &Value) -> Vec<RegistryPackageInfo> {
    let Some(objects) = data.get("objects").and_then(|o| o.as_array()) else {
        return Vec::new();
    };
    objects
        .iter()
        .filter_map(|o| o.get("package"))
        .filter_map(|pkg| {
            let text = |key: &str| pkg.get(key).and_then(|v| v.as_str()).map(str::to_string);
            Some(RegistryPackageInfo {
                name: text("name")?,
                latest_version: text("version").unwrap_or_default(),
                description: text("description").unwrap_or_default(),
                license: text("license"),
                homepage: pkg
                    .get("links")
                    .and_then(|l| l.get("homepage"))
                    .and_then(|h| h.as_str())
                    .map(str::to_string),
                author: pkg
                    .get("publisher")
                    .and_then(|p| p.get("username"))
                    .and_then(|u| u.as_str())
                    .map(str::to_string),
                requires: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_scoped_name() {
        assert_eq!(encode_name("@types/node"), "%40types%2Fnode");
        assert_eq!(encode_name("lodash"), "lodash");
    }

    #[test]
    fn test_validate_packument() {
        let data = json!({
            "dist-tags": {"latest": "4.17.21"},
            "versions": {"4.17.20": {}, "4.17.21": {}}
        });
        assert_eq!(
            validate_packument(&data, "lodash", Some("4.17.20")),
            Validation::ok(Some("4.17.21".to_string()))
        );
        let bad = validate_packument(&data, "lodash", Some("5.0.0"));
        assert!(!bad.valid);
        assert_eq!(
            bad.error.as_deref(),
            Some("Version 5.0.0 not found for 'lodash'")
        );
    }

    #[test]
    fn test_manifest_metadata_author_forms() {
        let meta = manifest_metadata(&json!({
            "name": "express",
            "version": "4.19.2",
            "author": {"name": "TJ Holowaychuk"},
            "dependencies": {"accepts": "~1.3.8", "body-parser": "1.20.2"}
        }));
        assert_eq!(meta["author"], "TJ Holowaychuk");
        assert_eq!(meta["requires"], "accepts, body-parser");

        let meta = manifest_metadata(&json!({"name": "x", "author": "Jane <j@x.io>"}));
        assert_eq!(meta["author"], "Jane <j@x.io>");
        assert!(!meta.contains_key("requires"));
    }

    #[test]
    fn test_search_results_skip_nameless() {
        let data = json!({
            "objects": [
                {"package": {"name": "react", "version": "18.3.1", "description": "UI",
                             "links": {"homepage": "https://react.dev"}}},
                {"package": {"version": "1.0.0"}},
                {"score": {}}
            ]
        });
        let results = search_results(&data);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "react");
        assert_eq!(results[0].homepage.as_deref(), Some("https://react.dev"));
    }
}
