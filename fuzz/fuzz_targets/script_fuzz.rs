//! Script fuzz target: feed arbitrary text to the parser and, when it parses,
//! to the extractor. Neither may panic or loop forever; malformed input is a
//! `ParseError` and unhandled shapes become diagnostics.
//! Build with: cargo fuzz run script_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    if let Ok(module) = scapy_ir::parse(s) {
        let extraction = scapy_ir::extract(&module, &scapy_ir::ExtractorConfig::default());
        let _ = extraction.ir.to_json(false);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run script_fuzz");
}
