//! Intermediate representation handed to the downstream generator.
//!
//! Everything here is plain data with a fixed JSON shape:
//!
//! ```text
//! { "pcap_pairs": [ { "send_file", "expect_file", "send_packets", "expect_packets" } ],
//!   "helper_functions": [ name, ... ] }
//! ```
//!
//! Each packet is `{ "layers": [ { "type", "params" } ], "special_handling" }`.
//! Maps are insertion-ordered so output is byte-identical across runs.

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::value::Value;

/// Reserved params key holding a layer's special-handling descriptors.
pub const SPECIAL_KEY: &str = "_special";

/// One protocol header or payload unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub layer_type: String,
    pub params: IndexMap<String, Value>,
    /// Descriptors keyed by the parameter they came from (`payload` for repetition).
    pub special: IndexMap<String, SpecialHandling>,
}

impl Layer {
    pub fn new(layer_type: impl Into<String>) -> Self {
        Self {
            layer_type: layer_type.into(),
            params: IndexMap::new(),
            special: IndexMap::new(),
        }
    }

    /// Payload layer carrying literal content as `_arg0`.
    pub fn raw(content: Value) -> Self {
        let mut layer = Layer::new("Raw");
        layer.params.insert("_arg0".to_string(), content);
        layer
    }
}

struct Params<'a>(&'a Layer);

impl Serialize for Params<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let layer = self.0;
        let extra = usize::from(!layer.special.is_empty());
        let mut map = serializer.serialize_map(Some(layer.params.len() + extra))?;
        for (key, value) in &layer.params {
            map.serialize_entry(key, value)?;
        }
        if !layer.special.is_empty() {
            map.serialize_entry(SPECIAL_KEY, &layer.special)?;
        }
        map.end()
    }
}

impl Serialize for Layer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", &self.layer_type)?;
        map.serialize_entry("params", &Params(self))?;
        map.end()
    }
}

/// Declarative expansion request attached to a layer parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpecialHandling {
    PortRange { range: [Value; 2] },
    ParamArray { values: Vec<Value> },
    CidrExpansion { cidr: String },
    StringMult { content: String, count: i128 },
}

/// Packet-level fragmentation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fragmentation {
    /// Name of the fragmentation function (`fragment`, `fragment6`).
    #[serde(rename = "type")]
    pub kind: String,
    pub frag_size: Value,
    /// `None`: every fragment. `Some`: only the fragment at that position.
    pub fragment_index: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PacketDefinition {
    pub layers: Vec<Layer>,
    pub special_handling: Option<Fragmentation>,
}

impl PacketDefinition {
    pub fn layer_types(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.layer_type.as_str()).collect()
    }
}

/// One discovered artifact-writing call.
#[derive(Debug, Clone, PartialEq)]
pub struct EmitCall {
    pub filename: String,
    pub packets: Vec<PacketDefinition>,
    pub line: usize,
}

fn empty_if_absent<S: Serializer>(file: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(file.as_deref().unwrap_or(""))
}

/// Matched send/expect artifacts sharing a base name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArtifactPair {
    #[serde(skip)]
    pub base_name: String,
    #[serde(serialize_with = "empty_if_absent")]
    pub send_file: Option<String>,
    #[serde(serialize_with = "empty_if_absent")]
    pub expect_file: Option<String>,
    pub send_packets: Vec<PacketDefinition>,
    pub expect_packets: Vec<PacketDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Ir {
    pub pcap_pairs: Vec<ArtifactPair>,
    pub helper_functions: Vec<String>,
}

impl Ir {
    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }

    pub fn pair(&self, base_name: &str) -> Option<&ArtifactPair> {
        self.pcap_pairs.iter().find(|p| p.base_name == base_name)
    }
}

/// A construct skipped during extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

/// Result of one extraction: the IR plus everything that was skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub ir: Ir,
    pub diagnostics: Vec<Diagnostic>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn special_entries_follow_plain_params() {
        let mut layer = Layer::new("TCP");
        layer.params.insert("dport".to_string(), Value::Int(80));
        layer.special.insert(
            "sport".to_string(),
            SpecialHandling::PortRange {
                range: [Value::Int(1000), Value::Int(1010)],
            },
        );
        layer.params.insert("flags".to_string(), Value::from("S"));
        let json = serde_json::to_value(&layer).expect("json");
        assert_eq!(
            json,
            json!({
                "type": "TCP",
                "params": {
                    "dport": 80,
                    "flags": "S",
                    "_special": {"sport": {"type": "port_range", "range": [1000, 1010]}}
                }
            })
        );
        let text = serde_json::to_string(&layer).expect("json");
        assert!(text.find("flags").unwrap() < text.find("_special").unwrap());
    }

    #[test]
    fn absent_files_serialize_empty() {
        let pair = ArtifactPair {
            base_name: "001".to_string(),
            send_file: Some("001-send.pcap".to_string()),
            ..ArtifactPair::default()
        };
        let json = serde_json::to_value(&pair).expect("json");
        assert_eq!(json["expect_file"], json!(""));
        assert!(json.get("base_name").is_none());
    }

    #[test]
    fn fragmentation_shape() {
        let packet = PacketDefinition {
            layers: vec![Layer::new("IP")],
            special_handling: Some(Fragmentation {
                kind: "fragment".to_string(),
                frag_size: Value::Int(8),
                fragment_index: None,
            }),
        };
        let json = serde_json::to_value(&packet).expect("json");
        assert_eq!(
            json["special_handling"],
            json!({"type": "fragment", "frag_size": 8, "fragment_index": null})
        );
    }
}
