//! Extractor configuration, loadable from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

/// Layer constructors recognized outside a composition chain.
pub const DEFAULT_LAYERS: &[&str] = &[
    "Ether",
    "IP",
    "IPv6",
    "TCP",
    "UDP",
    "ICMP",
    "ICMPv6EchoRequest",
    "ICMPv6EchoReply",
    "ICMPv6DestUnreach",
    "Raw",
    "Dot1Q",
    "GRE",
    "MPLS",
];

/// Names and conventions the extractor looks for in a generator script.
///
/// ```toml
/// emit_function = "write_pcap"
/// fragment_functions = ["fragment", "fragment6"]
/// extra_layers = ["ARP", "SCTP"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractorConfig {
    /// Canonical artifact-writing function; wrappers share its name as a prefix.
    pub emit_function: String,
    pub fragment_functions: Vec<String>,
    /// Keyword arguments of a fragmentation call that carry the fragment size.
    pub fragment_size_keywords: Vec<String>,
    /// Layer parameters holding addresses, eligible for CIDR expansion.
    pub address_keys: Vec<String>,
    /// Constructors added to [`DEFAULT_LAYERS`].
    pub extra_layers: Vec<String>,
    /// Base name for the bare `send` / `expect` artifacts.
    pub default_base_name: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            emit_function: "write_pcap".to_string(),
            fragment_functions: vec!["fragment".to_string(), "fragment6".to_string()],
            fragment_size_keywords: vec!["fragSize".to_string(), "fragsize".to_string()],
            address_keys: vec!["src".to_string(), "dst".to_string()],
            extra_layers: Vec::new(),
            default_base_name: "default".to_string(),
        }
    }
}

impl ExtractorConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ExtractError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ExtractError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn is_layer(&self, name: &str) -> bool {
        DEFAULT_LAYERS.contains(&name) || self.extra_layers.iter().any(|l| l == name)
    }

    pub fn is_fragmenter(&self, name: &str) -> bool {
        self.fragment_functions.iter().any(|f| f == name)
    }

    pub fn is_fragment_size_keyword(&self, name: &str) -> bool {
        self.fragment_size_keywords.iter().any(|k| k == name)
    }

    pub fn is_address_key(&self, name: &str) -> bool {
        self.address_keys.iter().any(|k| k == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ExtractorConfig::from_toml_str(
            r#"
emit_function = "wrpcap"
extra_layers = ["ARP"]
"#,
        )
        .expect("config");
        assert_eq!(config.emit_function, "wrpcap");
        assert!(config.is_layer("ARP"));
        assert!(config.is_layer("TCP"));
        assert!(config.is_fragmenter("fragment6"));
        assert_eq!(config.default_base_name, "default");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ExtractorConfig::from_toml_str("emit_fn = \"x\"\n").unwrap_err();
        assert!(matches!(err, ExtractError::Config(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "address_keys = [\"src\", \"dst\", \"psrc\"]").expect("write");
        let config = ExtractorConfig::from_file(file.path()).expect("config");
        assert!(config.is_address_key("psrc"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ExtractorConfig::from_file("/nonexistent/scapy-ir.toml").unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }
}
