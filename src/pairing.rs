//! Grouping of emitted artifacts into send/expect pairs.

use indexmap::IndexMap;

use crate::ir::{ArtifactPair, EmitCall};

const SUFFIXES: [&str; 4] = ["-send", "-expect", "_send", "_expect"];

/// Which half of a pair an artifact fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Send,
    Expect,
}

/// Classify by file name. Heuristic: any name mentioning `expect` is the
/// expect side, everything else is the send side. A name containing both
/// `send` and `expect` therefore counts as expect.
pub fn classify(filename: &str) -> Side {
    if filename.to_lowercase().contains("expect") || filename == "expect.pcap" {
        Side::Expect
    } else {
        Side::Send
    }
}

/// Pairing key: `001-send.pcap` → `001`, `send.pcap` → `default_base`.
pub fn base_name(filename: &str, default_base: &str) -> String {
    let stem = filename.replace(".pcap", "");
    if let Some(base) = SUFFIXES.iter().find_map(|suffix| stem.strip_suffix(suffix)) {
        return base.to_string();
    }
    match stem.as_str() {
        "send" | "expect" => default_base.to_string(),
        _ => stem,
    }
}

/// Merge emit calls by base name, in first-discovery order. A later artifact
/// for an already filled side replaces the earlier one.
pub fn pair_artifacts(emits: Vec<EmitCall>, default_base: &str) -> Vec<ArtifactPair> {
    let mut pairs: IndexMap<String, ArtifactPair> = IndexMap::new();
    for emit in emits {
        let base = base_name(&emit.filename, default_base);
        let pair = pairs.entry(base.clone()).or_insert_with(|| ArtifactPair {
            base_name: base,
            ..ArtifactPair::default()
        });
        match classify(&emit.filename) {
            Side::Send => {
                pair.send_file = Some(emit.filename);
                pair.send_packets = emit.packets;
            }
            Side::Expect => {
                pair.expect_file = Some(emit.filename);
                pair.expect_packets = emit.packets;
            }
        }
    }
    pairs.into_values().collect()
}
