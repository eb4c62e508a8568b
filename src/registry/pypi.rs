use std::collections::BTreeMap;

use anyhow::Result;
use futures::future::join_all;
use reqwest::Client;
use serde_json::Value;

use super::index_cache::IndexCache;
use crate::models::{RegistryPackageInfo, Validation};

const SIMPLE_INDEX_URL: &str = "https://pypi.org/simple/";
const SIMPLE_JSON: &str = "application/vnd.pypi.simple.v1+json";
pub const SEARCH_LIMIT: usize = 20;
const SUMMARY_CHARS: usize = 80;

/// Fetch `/pypi/<name>/json`; `Ok(None)` when PyPI does not know the project.
pub async fn fetch_project(client: &Client, name: &str) -> Result<Option<Value>> {
    let url = format!("https://pypi.org/pypi/{}/json", name);
    let response = client.get(&url).send().await?;

    if !response.status().is_success() {
        return Ok(None);
    }

    Ok(Some(response.json().await?))
}

/// Check that `name` (and `version`, when given) exists on PyPI.
pub async fn validate(client: &Client, name: &str, version: Option<&str>) -> Result<Validation> {
    let Some(data) = fetch_project(client, name).await? else {
        return Ok(Validation::invalid(
            format!("Package '{}' not found on PyPI", name),
            None,
        ));
    };
    Ok(validate_project(&data, name, version))
}

fn validate_project(data: &Value, name: &str, version: Option<&str>) -> Validation {
    let latest = latest_version(data);
    if let Some(version) = version {
        let known = data
            .get("releases")
            .and_then(|r| r.as_object())
            .is_some_and(|r| r.contains_key(version));
        if !known {
            return Validation::invalid(
                format!("Version {} not found for '{}'", version, name),
                latest,
            );
        }
    }
    Validation::ok(latest)
}

fn latest_version(data: &Value) -> Option<String> {
    data.get("info")
        .and_then(|i| i.get("version"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

pub async fn fetch_latest(client: &Client, name: &str) -> Result<Option<String>> {
    Ok(fetch_project(client, name)
        .await?
        .as_ref()
        .and_then(latest_version))
}

/// Flatten the interesting `info` fields of a project into display pairs.
pub async fn fetch_metadata(client: &Client, name: &str) -> Result<BTreeMap<String, String>> {
    Ok(fetch_project(client, name)
        .await?
        .map(|data| project_metadata(&data))
        .unwrap_or_default())
}

fn project_metadata(data: &Value) -> BTreeMap<String, String> {
    let mut meta = BTreeMap::new();
    let Some(info) = data.get("info") else {
        return meta;
    };
    for (field, label) in [
        ("name", "name"),
        ("version", "version"),
        ("summary", "summary"),
        ("license", "license"),
        ("home_page", "homepage"),
        ("author", "author"),
        ("requires_python", "requires_python"),
    ] {
        if let Some(value) = info.get(field).and_then(|v| v.as_str()) {
            if !value.is_empty() {
                meta.insert(label.to_string(), value.to_string());
            }
        }
    }
    if let Some(reqs) = info.get("requires_dist").and_then(|v| v.as_array()) {
        let reqs: Vec<&str> = reqs.iter().filter_map(|r| r.as_str()).collect();
        if !reqs.is_empty() {
            meta.insert("requires".to_string(), reqs.join(", "));
        }
    }
    meta
}

/// Every project name on PyPI, from the cache when fresh.
pub async fn fetch_index(client: &Client, cache: Option<&IndexCache>) -> Result<Vec<String>> {
    if let Some(names) = cache.and_then(|c| c.load()) {
        return Ok(names);
    }

    let response = client
        .get(SIMPLE_INDEX_URL)
        .header("Accept", SIMPLE_JSON)
        .send()
        .await?
        .error_for_status()?;
    let data: Value = response.json().await?;
    let names: Vec<String> = data
        .get("projects")
        .and_then(|p| p.as_array())
        .map(|projects| {
            projects
                .iter()
                .filter_map(|p| p.get("name").and_then(|n| n.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if let Some(cache) = cache {
        if let Err(e) = cache.store(&names) {
            log::warn!("Could not write {}: {e:#}", cache.path().display());
        }
    }

    Ok(names)
}

/// Names containing `query`, ranked exact < prefix < substring, at most `limit`.
pub fn rank_matches(names: &[String], query: &str, limit: usize) -> Vec<String> {
    let q = query.to_lowercase();
    let mut matches: Vec<(u8, &String)> = names
        .iter()
        .filter_map(|name| {
            let n = name.to_lowercase();
            if n == q {
                Some((0, name))
            } else if n.starts_with(&q) {
                Some((1, name))
            } else if n.contains(&q) {
                Some((2, name))
            } else {
                None
            }
        })
        .collect();
    matches.sort_by_key(|(score, _)| *score);
    matches
        .into_iter()
        .take(limit)
        .map(|(_, name)| name.clone())
        .collect()
}

/// Search the cached name index and enrich the top hits with version and summary.
pub async fn search(
    client: &Client,
    cache: Option<&IndexCache>,
    query: &str,
) -> Result<Vec<RegistryPackageInfo>> {
    let names = fetch_index(client, cache).await?;
    let top = rank_matches(&names, query, SEARCH_LIMIT);

    let futures: Vec<_> = top
        .iter()
        .map(|name| async move {
            let data = fetch_project(client, name).await.ok().flatten();
            search_hit(name, data.as_ref())
        })
        .collect();

    Ok(join_all(futures).await)
}

fn search_hit(name: &str, data: Option<&Value>) -> RegistryPackageInfo {
    let info = data.and_then(|d| d.get("info"));
    let field = |key: &str| {
        info.and_then(|i| i.get(key))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    RegistryPackageInfo {
        name: field("name").unwrap_or_else(|| name.to_string()),
        latest_version: field("version").unwrap_or_default(),
        description: field("summary")
            .map(|s| crate::error::truncate(&s, SUMMARY_CHARS))
            .unwrap_or_default(),
        license: field("license"),
        homepage: field("home_page"),
        author: field("author"),
        requires: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rank_matches_orders_exact_prefix_substring() {
        let index = names(&["pytest-flask", "Flask", "flask-login", "quart"]);
        assert_eq!(
            rank_matches(&index, "flask", 10),
            names(&["Flask", "flask-login", "pytest-flask"])
        );
        assert_eq!(rank_matches(&index, "flask", 1), names(&["Flask"]));
    }

    #[test]
    fn test_validate_project_versions() {
        let data = json!({
            "info": {"version": "2.32.3"},
            "releases": {"2.31.0": [], "2.32.3": []}
        });
        assert_eq!(
            validate_project(&data, "requests", None),
            Validation::ok(Some("2.32.3".to_string()))
        );
        assert!(validate_project(&data, "requests", Some("2.31.0")).valid);

        let missing = validate_project(&data, "requests", Some("9.9"));
        assert!(!missing.valid);
        assert_eq!(
            missing.error.as_deref(),
            Some("Version 9.9 not found for 'requests'")
        );
        assert_eq!(missing.resolved_version.as_deref(), Some("2.32.3"));
    }

    #[test]
    fn test_project_metadata() {
        let data = json!({
            "info": {
                "name": "rich",
                "version": "13.7.1",
                "summary": "Render rich text",
                "license": "",
                "requires_dist": ["markdown-it-py>=2.2.0", "pygments<3.0.0,>=2.13.0"]
            }
        });
        let meta = project_metadata(&data);
        assert_eq!(meta["version"], "13.7.1");
        assert!(!meta.contains_key("license"));
        assert_eq!(
            meta["requires"],
            "markdown-it-py>=2.2.0, pygments<3.0.0,>=2.13.0"
        );
    }

    #[test]
    fn test_search_hit_truncates_summary() {
        let data = json!({"info": {"name": "x", "version": "1", "summary": "s".repeat(120)}});
        let hit = search_hit("x", Some(&data));
        assert_eq!(hit.description.len(), 80);
        assert_eq!(search_hit("ghost", None).name, "ghost");
    }
}
