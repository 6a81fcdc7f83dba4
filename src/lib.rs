//! # scapy-ir — packet-test extraction from Scapy generator scripts
//!
//! Reads a packet-fixture generator script, walks its syntax tree and lowers
//! every artifact it writes into a language-neutral JSON IR for a downstream
//! code generator. Nothing is executed: values are resolved by syntactic
//! substitution and partial evaluation, and anything that cannot be resolved
//! becomes a placeholder.
//!
//! ## Pipeline
//!
//! - **Layout** ([`layout`]): physical lines → logical lines with indentation.
//! - **Parser** ([`parser`], `grammar.pest`): logical lines → [`ast::Module`].
//! - **Extraction** ([`extract`]): helpers and variables go into a
//!   [`symbols::SymbolTable`]; each `write_pcap(...)` call is normalized into
//!   packet definitions ([`packet`], [`layer`], [`eval`]).
//! - **Pairing** ([`pairing`]): artifacts are grouped into send/expect pairs.
//! - **IR** ([`ir`]): serde serialization of the result.
//!
//! ## Recognized forms
//!
//! - Composition chains: `Ether()/IP(dst="10.0.0.1")/TCP(dport=80)`
//! - Helper inlining: `def pkt(): return Ether()/IP()`, then `pkt()/TCP()`
//! - Port ranges `sport=(1024, 1040)`, parameter arrays `code=[0, 1, 3]`,
//!   CIDR expansion `dst="10.0.0.0/30"`, payload repetition `"AB" * 100`
//! - Fragmentation `fragment(pkt, fragSize=8)` with optional `[index]`
//!
//! ## Example
//!
//! ```
//! use scapy_ir::{extract_source, ExtractorConfig};
//!
//! let script = r#"
//! write_pcap("001-send.pcap", Ether()/IP(dst="10.0.0.1")/TCP(dport=80))
//! "#;
//! let extraction = extract_source(script, &ExtractorConfig::default()).unwrap();
//! let pair = &extraction.ir.pcap_pairs[0];
//! assert_eq!(pair.send_packets[0].layer_types(), vec!["Ether", "IP", "TCP"]);
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod eval;
pub mod extract;
pub mod ir;
pub mod layer;
pub mod layout;
pub mod packet;
pub mod pairing;
pub mod parser;
pub mod symbols;
pub mod value;

use std::path::Path;

pub use config::ExtractorConfig;
pub use error::{ExtractError, ParseError};
pub use extract::extract;
pub use ir::{ArtifactPair, Diagnostic, Extraction, Fragmentation, Ir, Layer, PacketDefinition, SpecialHandling};
pub use parser::parse;
pub use value::Value;

/// Parse and extract a script held in memory.
pub fn extract_source(source: &str, config: &ExtractorConfig) -> Result<Extraction, ExtractError> {
    let module = parse(source)?;
    Ok(extract(&module, config))
}

/// Read, parse and extract a script file.
pub fn extract_file<P: AsRef<Path>>(path: P, config: &ExtractorConfig) -> Result<Extraction, ExtractError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = source.len(), "read script");
    extract_source(&source, config)
}
