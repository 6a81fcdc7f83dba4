//! End-to-end tests of the `scapy_ir` binary.

use std::io::Write;
use std::process::{Command, Output};

use tempfile::NamedTempFile;

const SCRIPT: &str = r#"
from scapy.all import *

def base():
    return Ether()/IP(dst="192.0.2.0/30")

write_pcap("001-send.pcap", base()/TCP(dport=80))
write_pcap("001-expect.pcap", base()/TCP(dport=80, flags="R"))
"#;

fn script(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write script");
    file
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_scapy_ir"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run scapy_ir")
}

fn path(file: &NamedTempFile) -> &str {
    file.path().to_str().expect("utf-8 temp path")
}

#[test]
fn prints_ir_as_json() {
    let file = script(SCRIPT);
    let out = run(&[path(&file)]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let ir: serde_json::Value = serde_json::from_slice(&out.stdout).expect("stdout is JSON");
    assert_eq!(ir["helper_functions"], serde_json::json!(["base"]));
    let pair = &ir["pcap_pairs"][0];
    assert_eq!(pair["send_file"], "001-send.pcap");
    assert_eq!(pair["expect_file"], "001-expect.pcap");
    let ip = &pair["send_packets"][0]["layers"][1];
    assert_eq!(ip["params"]["dst"], "192.0.2.0");
    assert_eq!(ip["params"]["_special"]["dst"]["cidr"], "192.0.2.0/30");
}

#[test]
fn compact_output_is_one_line() {
    let file = script(SCRIPT);
    let out = run(&["--compact", path(&file)]);
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).expect("utf-8");
    assert_eq!(stdout.trim_end().lines().count(), 1);
    serde_json::from_str::<serde_json::Value>(&stdout).expect("stdout is JSON");
}

#[test]
fn pretty_output_is_stable() {
    let file = script(SCRIPT);
    let first = run(&[path(&file)]);
    let second = run(&[path(&file)]);
    assert_eq!(first.stdout, second.stdout);
    assert!(String::from_utf8_lossy(&first.stdout).lines().count() > 1);
}

#[test]
fn missing_file_fails() {
    let out = run(&["/nonexistent/generator.py"]);
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
    assert!(String::from_utf8_lossy(&out.stderr).contains("cannot read"));
}

#[test]
fn syntax_error_fails_without_output() {
    let file = script("write_pcap(\"x-send.pcap\", IP()\n");
    let out = run(&[path(&file)]);
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
    assert!(String::from_utf8_lossy(&out.stderr).contains("syntax error"));
}

#[test]
fn unhandled_constructs_do_not_fail() {
    let file = script("write_pcap(\"x-send.pcap\", mystery)\n");
    let out = run(&[path(&file)]);
    assert!(out.status.success());
    let ir: serde_json::Value = serde_json::from_slice(&out.stdout).expect("stdout is JSON");
    assert_eq!(ir["pcap_pairs"][0]["send_packets"], serde_json::json!([]));
    assert!(String::from_utf8_lossy(&out.stderr).contains("mystery"));
}

#[test]
fn config_file_overrides_names() {
    let file = script("emit(\"y-send.pcap\", Ether()/CustomLayer())\nemit(\"y-expect.pcap\", CustomLayer())\n");
    let config = script("emit_function = \"emit\"\nextra_layers = [\"CustomLayer\"]\n");
    let out = run(&["--config", path(&config), path(&file)]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let ir: serde_json::Value = serde_json::from_slice(&out.stdout).expect("stdout is JSON");
    assert_eq!(ir["pcap_pairs"][0]["expect_packets"][0]["layers"][0]["type"], "CustomLayer");
}

#[test]
fn invalid_config_fails() {
    let file = script(SCRIPT);
    let config = script("no_such_option = 1\n");
    let out = run(&["--config", path(&config), path(&file)]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("invalid configuration"));
}
