//! Storage key layout
//!
//! Every lease lives at `services/<namespace><name>/<fingerprint>`. The
//! fingerprint is derived from the instance identity (name and URL), so
//! re-registering the same instance overwrites its own key instead of adding
//! a second one.

use sha1::{Digest, Sha1};

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "rr";

const SERVICES_ROOT: &str = "services/";

/// Replace every character outside `[A-Za-z0-9-]` with `-`
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Hex SHA-1 of `<name>-<url>`
pub fn fingerprint(name: &str, url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(name.as_bytes());
    hasher.update(b"-");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Key layout for one registry namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    namespace: String,
}

impl KeySpace {
    /// Leading slash is stripped, a trailing slash is enforced on non-empty namespaces
    pub fn new(namespace: &str) -> Self {
        let trimmed = namespace.strip_prefix('/').unwrap_or(namespace);
        let namespace = if trimmed.is_empty() || trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };
        Self { namespace }
    }

    /// Normalized namespace segment, including its trailing slash
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Key a lease for `name` served at `url` is stored under
    pub fn storage_key(&self, name: &str, url: &str) -> String {
        format!(
            "{}{}/{}",
            self.root(),
            normalize_name(name),
            fingerprint(name, url)
        )
    }

    /// Prefix covering every instance of `name`, or the whole namespace
    ///
    /// The trailing slash on a named prefix keeps `api` from also matching
    /// keys that belong to `api-gateway`.
    pub fn scan_prefix(&self, name: Option<&str>) -> String {
        match name.filter(|n| !n.is_empty()) {
            Some(name) => format!("{}{}/", self.root(), normalize_name(name)),
            None => self.root(),
        }
    }

    fn root(&self) -> String {
        format!("{SERVICES_ROOT}{}", self.namespace)
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}
