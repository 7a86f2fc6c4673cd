//! `-i -` reads the whole input from stdin; the format is sniffed from content.

mod common;

use assert_cmd::Command;
use predicates::str::contains;

use common::{fixture_bytes, fixture_path};

#[test]
fn summary_reads_csv_from_stdin() -> anyhow::Result<()> {
    let data = std::fs::read_to_string(fixture_path("inventory_es.csv"))?;
    Command::cargo_bin("inventory-report")?
        .args(["summary", "-i", "-"])
        .write_stdin(data)
        .assert()
        .success()
        .stdout(contains("Preview (5 of 5 row(s))"));
    Ok(())
}

#[test]
fn report_sniffs_workbook_from_stdin() -> anyhow::Result<()> {
    let output = Command::cargo_bin("inventory-report")?
        .args(["report", "-i", "-", "--manifest", "yaml"])
        .write_stdin(fixture_bytes("inventory.xlsx"))
        .output()?;
    assert!(output.status.success());
    let document: serde_yaml::Value = serde_yaml::from_str(&String::from_utf8(output.stdout)?)?;
    assert_eq!(document["metadata"]["source"], serde_yaml::Value::from("<stdin>"));
    assert_eq!(
        document["inventory"]["rows"].as_sequence().map(Vec::len),
        Some(3)
    );
    Ok(())
}
