//! Package metadata and identity
//!
//! A [`PackageMetadata`] describes one published build of an external
//! library, as reported by the remote catalog or reconstructed from the
//! local registry. It is immutable once constructed; its identity is a
//! stable id derived from the (name, version, timestamp, author) tuple,
//! and two records compare equal exactly when their ids match.
//!
//! # Examples
//!
//! ```
//! use dekpm::PackageMetadata;
//!
//! let pkg = PackageMetadata::new(
//!     "cyclone", "porres", "2021:06:15 12:00:00",
//!     "http://example.org/cyclone.tar.gz",
//!     "cyclone objects", "0.6.1",
//!     vec!["coll".to_string(), "prepend".to_string()],
//! );
//!
//! assert_eq!(pkg.version(), "0.6.1");
//! assert!(pkg.with_secure_url().url().starts_with("https://"));
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Metadata for one published package build.
#[derive(Debug, Clone)]
pub struct PackageMetadata {
    name: String,
    author: String,
    timestamp: String,
    url: String,
    description: String,
    version: String,
    objects: Vec<String>,
    id: String,
}

impl PackageMetadata {
    /// Build a metadata record and derive its stable id.
    ///
    /// The timestamp is the catalog's publication time in the
    /// lexicographically sortable `"YYYY:MM:DD HH:MM:SS"` form.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        author: impl Into<String>,
        timestamp: impl Into<String>,
        url: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
        objects: Vec<String>,
    ) -> Self {
        let name = name.into();
        let author = author.into();
        let timestamp = timestamp.into();
        let version = version.into();
        let id = derive_id(&name, &version, &timestamp, &author);
        Self {
            name,
            author,
            timestamp,
            url: url.into(),
            description: description.into(),
            version,
            objects,
            id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Object names exported by this build, when the catalog provided them.
    pub fn objects(&self) -> &[String] {
        &self.objects
    }

    /// Stable identifier derived from (name, version, timestamp, author).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Return a copy whose download URL uses secure transport.
    ///
    /// A leading `http://` scheme is rewritten to `https://`; any other
    /// URL is returned unchanged. Loopback hosts are exempt so local
    /// catalog mirrors can serve plain http. The id is unaffected since
    /// it is not derived from the URL.
    pub fn with_secure_url(&self) -> Self {
        let mut copy = self.clone();
        if let Some(rest) = copy.url.strip_prefix("http://") {
            let loopback = rest.starts_with("localhost")
                || rest.starts_with("127.0.0.1")
                || rest.starts_with("[::1]");
            if !loopback {
                copy.url = format!("https://{}", rest);
            }
        }
        copy
    }
}

impl PartialEq for PackageMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PackageMetadata {}

/// Derive the stable package id from the identity tuple.
///
/// The encoding matches the catalog ecosystem's convention: base64 over
/// `name_version_timestamp_author`.
fn derive_id(name: &str, version: &str, timestamp: &str, author: &str) -> String {
    STANDARD.encode(format!("{}_{}_{}_{}", name, version, timestamp, author))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, version: &str, timestamp: &str, author: &str) -> PackageMetadata {
        PackageMetadata::new(
            name,
            author,
            timestamp,
            "http://example.org/pkg.tar.gz",
            "a package",
            version,
            vec![],
        )
    }

    #[test]
    fn test_id_equal_iff_tuple_equal() {
        let a = sample("foo", "1.0", "2021:01:01 00:00:00", "alice");
        let b = sample("foo", "1.0", "2021:01:01 00:00:00", "alice");
        assert_eq!(a.id(), b.id());
        assert_eq!(a, b);

        // Changing any single tuple component changes the id
        let name = sample("bar", "1.0", "2021:01:01 00:00:00", "alice");
        let version = sample("foo", "1.1", "2021:01:01 00:00:00", "alice");
        let timestamp = sample("foo", "1.0", "2022:01:01 00:00:00", "alice");
        let author = sample("foo", "1.0", "2021:01:01 00:00:00", "bob");
        for other in [name, version, timestamp, author] {
            assert_ne!(a.id(), other.id());
            assert_ne!(a, other);
        }
    }

    #[test]
    fn test_equality_ignores_url_and_description() {
        let a = sample("foo", "1.0", "2021:01:01 00:00:00", "alice");
        let mut b = a.clone();
        b.url = "https://mirror.example.org/other.tar.gz".to_string();
        b.description = "different text".to_string();
        assert_eq!(a, b);
    }

    #[test]
    fn test_with_secure_url_rewrites_scheme() {
        let pkg = sample("foo", "1.0", "2021:01:01 00:00:00", "alice");
        let secure = pkg.with_secure_url();
        assert_eq!(secure.url(), "https://example.org/pkg.tar.gz");
        // Original is untouched, id unchanged
        assert_eq!(pkg.url(), "http://example.org/pkg.tar.gz");
        assert_eq!(pkg.id(), secure.id());
    }

    #[test]
    fn test_with_secure_url_leaves_https_alone() {
        let pkg = PackageMetadata::new(
            "foo",
            "alice",
            "2021:01:01 00:00:00",
            "https://example.org/pkg.tar.gz",
            "",
            "1.0",
            vec![],
        );
        assert_eq!(pkg.with_secure_url().url(), pkg.url());
    }

    #[test]
    fn test_with_secure_url_keeps_loopback_plain() {
        let pkg = PackageMetadata::new(
            "foo",
            "alice",
            "2021:01:01 00:00:00",
            "http://127.0.0.1:8080/pkg.tar.gz",
            "",
            "1.0",
            vec![],
        );
        assert_eq!(pkg.with_secure_url().url(), "http://127.0.0.1:8080/pkg.tar.gz");
    }
}
