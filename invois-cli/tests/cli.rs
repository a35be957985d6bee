use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const SIGNING_TIME: &str = "2025-02-06T01:50:00Z";

fn credentials_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../invois-core/tests/fixtures/credentials")
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn scratch(name: &str) -> PathBuf {
    Path::new(env!("CARGO_TARGET_TMPDIR")).join(name)
}

fn invois(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_invois"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("run invois")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "invois failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).expect("utf8 stdout")
}

fn build(family: &str, path: &Path) {
    let record = fixture("invoice-record.json");
    let text = stdout(&invois(&[
        "build",
        "--record",
        record.to_str().unwrap(),
        "--family",
        family,
    ]));
    std::fs::write(path, text.trim_end()).expect("write clean document");
}

fn sign(input: &Path, output: &Path) {
    let cert = credentials_dir().join("signer-cert.pem");
    let key = credentials_dir().join("signer-key.pem");
    stdout(&invois(&[
        "sign",
        "--document",
        input.to_str().unwrap(),
        "--certificate",
        cert.to_str().unwrap(),
        "--private-key",
        key.to_str().unwrap(),
        "--signing-time",
        SIGNING_TIME,
        "--output",
        output.to_str().unwrap(),
    ]));
}

#[test]
fn build_sign_and_verify_both_families() {
    for (family, extension) in [("json", "json"), ("xml", "xml")] {
        let clean = scratch(&format!("cli-clean.{extension}"));
        let signed = scratch(&format!("cli-signed.{extension}"));
        build(family, &clean);
        sign(&clean, &signed);

        let report = stdout(&invois(&["verify", "--document", signed.to_str().unwrap()]));
        assert!(report.contains("signature valid"), "{family}: {report}");
        assert!(report.contains(SIGNING_TIME));
    }
}

#[test]
fn digest_ignores_the_signature() {
    let clean = scratch("cli-digest-clean.json");
    let signed = scratch("cli-digest-signed.json");
    build("json", &clean);
    sign(&clean, &signed);

    let before = stdout(&invois(&["digest", "--document", clean.to_str().unwrap()]));
    let after = stdout(&invois(&["digest", "--document", signed.to_str().unwrap()]));
    assert_eq!(before.trim(), after.trim());
    assert_eq!(before.trim().len(), 44);
}

#[test]
fn transport_hashes_the_file_bytes() {
    let clean = scratch("cli-transport.xml");
    build("xml", &clean);
    let text = stdout(&invois(&["transport", "--document", clean.to_str().unwrap()]));
    let value: serde_json::Value = serde_json::from_str(&text).expect("json output");
    assert_eq!(value["format"], "xml");
    assert_eq!(value["documentHash"].as_str().map(str::len), Some(64));
    assert!(value["document"].as_str().is_some_and(|doc| !doc.is_empty()));
}

#[test]
fn incompatible_canonicalization_fails() {
    let clean = scratch("cli-incompatible.json");
    build("json", &clean);
    let output = invois(&[
        "digest",
        "--document",
        clean.to_str().unwrap(),
        "--canonicalization",
        "exclusive_xml",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot be used with json documents"), "{stderr}");
}

#[test]
fn signing_an_already_signed_document_fails() {
    let clean = scratch("cli-resign-clean.json");
    let signed = scratch("cli-resign-signed.json");
    build("json", &clean);
    sign(&clean, &signed);

    let cert = credentials_dir().join("signer-cert.pem");
    let key = credentials_dir().join("signer-key.pem");
    let output = invois(&[
        "sign",
        "--document",
        signed.to_str().unwrap(),
        "--certificate",
        cert.to_str().unwrap(),
        "--private-key",
        key.to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("signature sub-tree"), "{stderr}");
}
