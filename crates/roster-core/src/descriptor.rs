//! Service descriptors
//!
//! A descriptor is what a registrant advertises: where it can be reached and any
//! free-form metadata it wants lookups to see. Callers hand in a partially
//! filled [`DescriptorInput`]; [`ServiceDescriptor::resolve`] applies the
//! defaulting rules and produces the record that gets written to the store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol used for the descriptor URL when the caller does not pick one
pub const DEFAULT_PROTOCOL: &str = "http";

/// Fully populated service descriptor as stored under a lease key
///
/// Decoding is lenient about `port` and `protocol`: records from other clients
/// may carry them with a different JSON type, in which case the typed field is
/// `None` and the raw value stays in `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredDescriptor")]
pub struct ServiceDescriptor {
    /// Logical service name the instance joined under
    pub name: String,
    /// Bare hostname or IP address of the instance
    pub hostname: String,
    /// Hostname with the port appended when one was given
    pub host: String,
    /// `protocol://host`
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Caller-supplied fields, flattened into the stored JSON object
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl ServiceDescriptor {
    /// Fill in every field the caller left out.
    ///
    /// `local_hostname` is only invoked when the input carries no hostname, so
    /// interface enumeration is skipped for fully specified descriptors.
    pub fn resolve(
        name: &str,
        input: DescriptorInput,
        local_hostname: impl FnOnce() -> String,
    ) -> Self {
        let DescriptorInput {
            hostname,
            host,
            url,
            port,
            protocol,
            mut metadata,
        } = input;

        // Reserved keys would collide with the typed fields once flattened
        for reserved in ["name", "hostname", "host", "url", "port", "protocol"] {
            metadata.remove(reserved);
        }

        let hostname = hostname.unwrap_or_else(local_hostname);
        let host = host.unwrap_or_else(|| match port {
            Some(port) => format!("{hostname}:{port}"),
            None => hostname.clone(),
        });
        let url = url.unwrap_or_else(|| {
            format!(
                "{}://{}",
                protocol.as_deref().unwrap_or(DEFAULT_PROTOCOL),
                host
            )
        });

        Self {
            name: name.to_string(),
            hostname,
            host,
            url,
            port,
            protocol,
            metadata,
        }
    }

    /// Look up a metadata field by key
    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}

/// Wire shape of a stored record before the typed optional fields are lifted out
#[derive(Deserialize)]
struct StoredDescriptor {
    name: String,
    hostname: String,
    host: String,
    url: String,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl From<StoredDescriptor> for ServiceDescriptor {
    fn from(stored: StoredDescriptor) -> Self {
        let StoredDescriptor {
            name,
            hostname,
            host,
            url,
            mut rest,
        } = stored;

        let port = rest
            .get("port")
            .and_then(Value::as_u64)
            .and_then(|port| u16::try_from(port).ok());
        if port.is_some() {
            rest.remove("port");
        }

        let protocol = rest
            .get("protocol")
            .and_then(Value::as_str)
            .map(str::to_string);
        if protocol.is_some() {
            rest.remove("protocol");
        }

        Self {
            name,
            hostname,
            host,
            url,
            port,
            protocol,
            metadata: rest,
        }
    }
}

/// Caller-side descriptor with every field optional
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorInput {
    pub hostname: Option<String>,
    pub host: Option<String>,
    pub url: Option<String>,
    pub port: Option<u16>,
    pub protocol: Option<String>,
    pub metadata: Map<String, Value>,
}

impl DescriptorInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Attach a free-form metadata field
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A bare port number is shorthand for "this host, this port"
impl From<u16> for DescriptorInput {
    fn from(port: u16) -> Self {
        Self::new().port(port)
    }
}

impl From<Option<DescriptorInput>> for DescriptorInput {
    fn from(input: Option<DescriptorInput>) -> Self {
        input.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixed_host() -> String {
        "10.0.0.7".to_string()
    }

    #[test]
    fn test_defaults_without_port() {
        let desc = ServiceDescriptor::resolve("api", DescriptorInput::default(), fixed_host);

        assert_eq!(desc.name, "api");
        assert_eq!(desc.hostname, "10.0.0.7");
        assert_eq!(desc.host, "10.0.0.7");
        assert_eq!(desc.url, "http://10.0.0.7");
        assert!(desc.port.is_none());
    }

    #[test]
    fn test_bare_port_input() {
        let desc = ServiceDescriptor::resolve("api", 8080u16.into(), fixed_host);

        assert_eq!(desc.host, "10.0.0.7:8080");
        assert_eq!(desc.url, "http://10.0.0.7:8080");
        assert_eq!(desc.port, Some(8080));
    }

    #[test]
    fn test_explicit_fields_win() {
        let input = DescriptorInput::new()
            .hostname("svc.internal")
            .port(9000)
            .protocol("grpc");
        let desc = ServiceDescriptor::resolve("api", input, || panic!("hostname was given"));

        assert_eq!(desc.host, "svc.internal:9000");
        assert_eq!(desc.url, "grpc://svc.internal:9000");

        let input = DescriptorInput::new()
            .hostname("a")
            .host("b:1")
            .url("https://c");
        let desc = ServiceDescriptor::resolve("api", input, fixed_host);
        assert_eq!(desc.hostname, "a");
        assert_eq!(desc.host, "b:1");
        assert_eq!(desc.url, "https://c");
    }

    #[test]
    fn test_metadata_flattened_and_reserved_keys_dropped() {
        let input = DescriptorInput::new()
            .port(80)
            .meta("inserted", 1700000000u64)
            .meta("name", "spoofed");
        let desc = ServiceDescriptor::resolve("web", input, fixed_host);

        assert_eq!(desc.name, "web");
        assert_eq!(desc.meta("inserted"), Some(&json!(1700000000u64)));
        assert!(desc.meta("name").is_none());

        let value = serde_json::to_value(&desc).unwrap();
        assert_eq!(value["inserted"], json!(1700000000u64));
        assert_eq!(value["name"], json!("web"));
        assert_eq!(value["port"], json!(80));
    }

    #[test]
    fn test_mistyped_port_and_protocol_kept_as_metadata() {
        let value = json!({
            "name": "api",
            "hostname": "h",
            "host": "h:8080",
            "url": "http://h:8080",
            "port": "8080",
            "protocol": 7,
        });
        let desc: ServiceDescriptor = serde_json::from_value(value.clone()).unwrap();

        assert_eq!(desc.port, None);
        assert_eq!(desc.protocol, None);
        assert_eq!(desc.meta("port"), Some(&json!("8080")));
        assert_eq!(desc.meta("protocol"), Some(&json!(7)));

        // Re-encoding writes the record back unchanged
        assert_eq!(serde_json::to_value(&desc).unwrap(), value);
    }

    #[test]
    fn test_out_of_range_port_is_not_typed() {
        let desc: ServiceDescriptor = serde_json::from_value(json!({
            "name": "api",
            "hostname": "h",
            "host": "h",
            "url": "http://h",
            "port": 70000,
            "protocol": "https",
        }))
        .unwrap();

        assert_eq!(desc.port, None);
        assert_eq!(desc.protocol.as_deref(), Some("https"));
        assert_eq!(desc.meta("port"), Some(&json!(70000)));
        assert!(desc.meta("protocol").is_none());
    }
}
