//! Connection profile builder.
//!
//! Turns a VirtualMachine's override annotations and its resolved hostname
//! into the Guacamole connection definition sent on create and update.

use crate::annotations::{self, annotation};
use crate::store::ResourceKey;
use guacamole_client::Connection;
use std::collections::BTreeMap;
use std::fmt;

pub const RDP_DEFAULT_PORT: &str = "3389";
pub const VNC_DEFAULT_PORT: &str = "5900";
pub const SSH_DEFAULT_PORT: &str = "22";

const VNC_PARAMETERS: &[(&str, &str)] = &[
    ("color-depth", "24"),
    ("cursor", "remote"),
    ("read-only", "false"),
    ("swap-red-blue", "false"),
    ("disable-copy", "false"),
    ("disable-paste", "false"),
    ("enable-audio", "false"),
];

const RDP_PARAMETERS: &[(&str, &str)] = &[
    ("security", "any"),
    ("ignore-cert", "true"),
    ("disable-auth", "false"),
    ("resize-method", "reconnect"),
    ("console-audio", "false"),
    ("disable-audio", "false"),
    ("enable-wallpaper", "false"),
    ("enable-theming", "false"),
    ("enable-font-smoothing", "false"),
];

const SSH_PARAMETERS: &[(&str, &str)] = &[
    ("font-size", "12"),
    ("color-scheme", ""),
    ("scrollback", ""),
    ("terminal-type", ""),
];

/// Parameters Guacamole's connection schema expects on every connection
pub const REQUIRED_EMPTY_PARAMETERS: &[&str] = &[
    "recording-path",
    "recording-name",
    "recording-exclude-output",
    "recording-exclude-mouse",
    "recording-include-keys",
    "create-recording-path",
    "dest-host",
    "dest-port",
];

/// Connection attributes; always sent empty (no pooling or failover)
pub const CONNECTION_ATTRIBUTES: &[&str] = &[
    "max-connections",
    "max-connections-per-user",
    "weight",
    "failover-only",
    "guacd-port",
    "guacd-encryption",
    "guacd-hostname",
];

/// Remote desktop protocol of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Protocol {
    Rdp,
    Vnc,
    Ssh,
    /// Passed to Guacamole verbatim, without protocol-specific parameters
    Other(String),
}

impl Protocol {
    /// Parse an override value; matching is case-insensitive
    pub fn from_override(value: Option<&str>) -> Self {
        match value.map(str::to_lowercase).as_deref() {
            None | Some("rdp") => Self::Rdp,
            Some("vnc") => Self::Vnc,
            Some("ssh") => Self::Ssh,
            Some(other) => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Rdp => "rdp",
            Self::Vnc => "vnc",
            Self::Ssh => "ssh",
            Self::Other(p) => p,
        }
    }

    /// Final port for this protocol given the override, if any.
    ///
    /// A port equal to another protocol's default is treated as unset and
    /// replaced with this protocol's default; any other port is kept.
    pub fn select_port(&self, port_override: Option<&str>) -> String {
        let port = port_override.unwrap_or(RDP_DEFAULT_PORT);
        let corrected = match self {
            Self::Vnc if port == RDP_DEFAULT_PORT => VNC_DEFAULT_PORT,
            Self::Rdp if port == VNC_DEFAULT_PORT => RDP_DEFAULT_PORT,
            Self::Ssh if port == RDP_DEFAULT_PORT || port == VNC_DEFAULT_PORT => SSH_DEFAULT_PORT,
            _ => port,
        };
        corrected.to_string()
    }

    fn fixed_parameters(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Rdp => RDP_PARAMETERS,
            Self::Vnc => VNC_PARAMETERS,
            Self::Ssh => SSH_PARAMETERS,
            Self::Other(_) => &[],
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-supplied connection overrides read from annotations
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionOverrides {
    pub protocol: Option<String>,
    pub port: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub domain: Option<String>,
    pub private_key: Option<String>,
}

impl ConnectionOverrides {
    pub fn from_annotations(annotations: Option<&BTreeMap<String, String>>) -> Self {
        let read = |key| annotation(annotations, key).map(str::to_string);
        Self {
            protocol: read(annotations::PROTOCOL),
            port: read(annotations::PORT),
            username: read(annotations::USERNAME),
            password: read(annotations::PASSWORD),
            domain: read(annotations::DOMAIN),
            private_key: read(annotations::PRIVATE_KEY),
        }
    }

    /// Credential parameters the protocol accepts
    fn credentials(&self, protocol: &Protocol) -> Vec<(&'static str, &str)> {
        let fields = match protocol {
            Protocol::Vnc => vec![("password", &self.password)],
            Protocol::Rdp => vec![
                ("username", &self.username),
                ("password", &self.password),
                ("domain", &self.domain),
            ],
            Protocol::Ssh => vec![
                ("username", &self.username),
                ("password", &self.password),
                ("private-key", &self.private_key),
            ],
            Protocol::Other(_) => Vec::new(),
        };
        fields
            .into_iter()
            .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
            .collect()
    }
}

impl fmt::Debug for ConnectionOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("ConnectionOverrides")
            .field("protocol", &self.protocol)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("domain", &self.domain)
            .field("private_key", &redacted(&self.private_key))
            .finish()
    }
}

/// Guacamole connection name for a VM
pub fn connection_name(key: &ResourceKey) -> String {
    format!("{}-{}", key.namespace, key.name)
}

/// Build the connection definition for a VM reachable at `hostname`
pub fn build_connection(key: &ResourceKey, overrides: &ConnectionOverrides, hostname: &str) -> Connection {
    let protocol = Protocol::from_override(overrides.protocol.as_deref());
    let port = protocol.select_port(overrides.port.as_deref());

    let mut parameters = BTreeMap::from([
        ("hostname".to_string(), hostname.to_string()),
        ("port".to_string(), port),
    ]);
    for (k, v) in protocol.fixed_parameters() {
        parameters.insert(k.to_string(), v.to_string());
    }
    for (k, v) in overrides.credentials(&protocol) {
        parameters.insert(k.to_string(), v.to_string());
    }
    for k in REQUIRED_EMPTY_PARAMETERS {
        parameters.entry(k.to_string()).or_default();
    }

    let attributes = CONNECTION_ATTRIBUTES
        .iter()
        .map(|k| (k.to_string(), String::new()))
        .collect();

    Connection::new(connection_name(key), protocol.as_str(), parameters, attributes)
}
