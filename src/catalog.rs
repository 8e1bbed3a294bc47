//! Remote catalog client
//!
//! Fetches the package catalog and per-package object info over HTTPS and
//! parses the JSON the catalog server produces. Both fetches are blocking
//! and are meant to be called from a background worker, never from the
//! consuming context.
//!
//! Transport and parse failures are absorbed here: a failed or malformed
//! fetch yields an empty result (logged at warn level), so a refresh that
//! hits a flaky network simply produces a smaller or empty catalog
//! instead of an error. Callers pass a cancellation flag that is checked
//! between network operations.

use crate::config::CatalogConfig;
use crate::{platform, Error, PackageMetadata, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::warn;

/// Connection timeout for catalog fetches and package downloads.
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Blocking HTTP client for the catalog endpoints.
pub struct CatalogClient {
    search_url: String,
    info_url: String,
    http: reqwest::blocking::Client,
}

// Catalog response shape:
// { result: { libraries: { <name>: [ [ {archs, name, author, ...}, ... ], ... ] } } }
#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: SearchResult,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResult {
    #[serde(default)]
    libraries: BTreeMap<String, Vec<Vec<ArchVariant>>>,
}

#[derive(Debug, Deserialize)]
struct ArchVariant {
    #[serde(default)]
    archs: Vec<Option<String>>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    version: String,
}

// Object-info response: only the first nested element is meaningful.
#[derive(Debug, Default, Deserialize)]
struct InfoResponse {
    #[serde(default)]
    result: InfoResult,
}

#[derive(Debug, Default, Deserialize)]
struct InfoResult {
    #[serde(default)]
    libraries: BTreeMap<String, Vec<Vec<InfoVariant>>>,
}

#[derive(Debug, Deserialize)]
struct InfoVariant {
    #[serde(default)]
    objects: Vec<ObjectInfo>,
}

#[derive(Debug, Deserialize)]
struct ObjectInfo {
    #[serde(default)]
    name: String,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            search_url: config.search_url.clone(),
            info_url: config.info_url.clone(),
            http,
        })
    }

    /// The underlying HTTP client, shared with download tasks.
    pub(crate) fn http(&self) -> &reqwest::blocking::Client {
        &self.http
    }

    /// Fetch the catalog and reduce it to one entry per package name.
    ///
    /// Each architecture variant is filtered through the platform matcher;
    /// matching variants get their object list fetched (one extra round
    /// trip each) and become candidates. Per package the candidate with
    /// the lexicographically greatest timestamp wins, and ids already in
    /// the catalog are skipped. Any failure yields an empty catalog.
    pub fn fetch_catalog(&self, cancel: &AtomicBool) -> Vec<PackageMetadata> {
        let body = match self.get_text(&self.search_url) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "catalog fetch failed");
                return Vec::new();
            }
        };
        if body.is_empty() || cancel.load(Ordering::Relaxed) {
            return Vec::new();
        }

        let parsed: SearchResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "invalid JSON in catalog response");
                return Vec::new();
            }
        };

        let mut packages: Vec<PackageMetadata> = Vec::new();

        for version_groups in parsed.result.libraries.into_values() {
            if cancel.load(Ordering::Relaxed) {
                return Vec::new();
            }

            let mut candidates: Vec<PackageMetadata> = Vec::new();

            for group in version_groups {
                for variant in group {
                    let tag = variant
                        .archs
                        .first()
                        .and_then(|a| a.clone())
                        .unwrap_or_default();
                    if !platform::matches(&tag) {
                        continue;
                    }

                    let objects = self.fetch_object_names(&variant.url);
                    candidates.push(PackageMetadata::new(
                        variant.name,
                        variant.author,
                        variant.timestamp,
                        variant.url,
                        variant.description,
                        variant.version,
                        objects,
                    ));
                }
            }

            if let Some(best) = best_candidate(candidates) {
                if !packages.contains(&best) {
                    packages.push(best);
                }
            }
        }

        packages
    }

    /// Fetch the object names exported by the package at `url`.
    ///
    /// Returns an empty list on any transport or parse failure.
    pub fn fetch_object_names(&self, url: &str) -> Vec<String> {
        let info_url = format!("{}?url={}", self.info_url, urlencoding::encode(url));

        let body = match self.get_text(&info_url) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "object info fetch failed");
                return Vec::new();
            }
        };
        if body.is_empty() {
            return Vec::new();
        }

        let parsed: InfoResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "invalid JSON in object info response");
                return Vec::new();
            }
        };

        parsed
            .result
            .libraries
            .into_values()
            .next()
            .and_then(|groups| groups.into_iter().next())
            .and_then(|group| group.into_iter().next())
            .map(|variant| variant.objects.into_iter().map(|o| o.name).collect())
            .unwrap_or_default()
    }

    fn get_text(&self, url: &str) -> Result<String> {
        let response = self.http.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport {
                status: status.as_u16(),
            });
        }
        Ok(response.text()?)
    }
}

/// Pick the newest published build out of a candidate list.
///
/// Stable sort on the textual timestamp, descending; ties keep their
/// catalog order.
fn best_candidate(mut candidates: Vec<PackageMetadata>) -> Option<PackageMetadata> {
    candidates.sort_by(|a, b| b.timestamp().cmp(a.timestamp()));
    candidates.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{FLOAT_SIZE, MACHINE, OS};

    fn host_tag() -> String {
        format!("{}-{}-{}", OS, MACHINE[0], FLOAT_SIZE)
    }

    fn client_for(server: &mockito::ServerGuard) -> CatalogClient {
        let config = CatalogConfig {
            search_url: format!("{}/search.json", server.url()),
            info_url: format!("{}/info.json", server.url()),
        };
        CatalogClient::new(&config).unwrap()
    }

    fn sample(name: &str, timestamp: &str) -> PackageMetadata {
        PackageMetadata::new(
            name,
            "alice",
            timestamp,
            "https://example.org/pkg.tar.gz",
            "",
            "1.0",
            vec![],
        )
    }

    #[test]
    fn test_best_candidate_prefers_latest_timestamp() {
        let old = sample("foo", "2020:01:01 00:00:00");
        let new = sample("foo", "2021:06:15 12:00:00");

        let best = best_candidate(vec![old.clone(), new.clone()]).unwrap();
        assert_eq!(best.timestamp(), "2021:06:15 12:00:00");

        // Order of arrival must not matter
        let best = best_candidate(vec![new.clone(), old]).unwrap();
        assert_eq!(best, new);
    }

    #[test]
    fn test_best_candidate_empty() {
        assert!(best_candidate(vec![]).is_none());
    }

    #[test]
    fn test_fetch_catalog_filters_and_dedups() {
        let mut server = mockito::Server::new();
        let tag = host_tag();

        let catalog_body = serde_json::json!({
            "result": { "libraries": {
                "cyclone": [
                    [
                        { "archs": [tag], "name": "cyclone", "author": "porres",
                          "timestamp": "2020:01:01 00:00:00",
                          "description": "old build", "url": "https://example.org/cyclone-old.tar.gz",
                          "version": "0.5" },
                        { "archs": [tag], "name": "cyclone", "author": "porres",
                          "timestamp": "2021:06:15 12:00:00",
                          "description": "new build", "url": "https://example.org/cyclone.tar.gz",
                          "version": "0.6" },
                        { "archs": ["Sunos-sparc-32"], "name": "cyclone", "author": "porres",
                          "timestamp": "2022:01:01 00:00:00",
                          "description": "wrong platform", "url": "https://example.org/nope.tar.gz",
                          "version": "0.7" }
                    ]
                ]
            }}
        })
        .to_string();

        let _search = server
            .mock("GET", "/search.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(catalog_body)
            .create();

        let info_body = serde_json::json!({
            "result": { "libraries": {
                "cyclone": [[ { "objects": [ { "name": "coll" }, { "name": "prepend" } ] } ]]
            }}
        })
        .to_string();

        let _info = server
            .mock("GET", "/info.json")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(info_body)
            .expect_at_least(1)
            .create();

        let client = client_for(&server);
        let cancel = AtomicBool::new(false);
        let catalog = client.fetch_catalog(&cancel);

        // The incompatible variant is dropped, the newest compatible wins
        assert_eq!(catalog.len(), 1);
        let pkg = &catalog[0];
        assert_eq!(pkg.version(), "0.6");
        assert_eq!(pkg.timestamp(), "2021:06:15 12:00:00");
        assert_eq!(pkg.objects(), ["coll".to_string(), "prepend".to_string()]);
    }

    #[test]
    fn test_fetch_catalog_bad_json_is_empty() {
        let mut server = mockito::Server::new();
        let _search = server
            .mock("GET", "/search.json")
            .with_status(200)
            .with_body("this is not json")
            .create();

        let client = client_for(&server);
        let catalog = client.fetch_catalog(&AtomicBool::new(false));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_fetch_catalog_server_error_is_empty() {
        let mut server = mockito::Server::new();
        let _search = server.mock("GET", "/search.json").with_status(500).create();

        let client = client_for(&server);
        let catalog = client.fetch_catalog(&AtomicBool::new(false));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_fetch_catalog_cancelled_is_empty() {
        let mut server = mockito::Server::new();
        let _search = server
            .mock("GET", "/search.json")
            .with_status(200)
            .with_body(r#"{"result":{"libraries":{}}}"#)
            .create();

        let client = client_for(&server);
        let cancel = AtomicBool::new(true);
        assert!(client.fetch_catalog(&cancel).is_empty());
    }

    #[test]
    fn test_fetch_object_names_failure_is_empty() {
        let mut server = mockito::Server::new();
        let _info = server
            .mock("GET", "/info.json")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create();

        let client = client_for(&server);
        assert!(client
            .fetch_object_names("https://example.org/pkg.tar.gz")
            .is_empty());
    }
}
