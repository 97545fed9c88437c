use anyhow::{Context, Result};
use insta_cmd::assert_cmd_snapshot;
use serde_json::Value;

use crate::{CliTest, OUTPUT_FILE, run};

/// Validates config file structure and default values.
fn assert_config_content(content: &str) -> Result<()> {
    let parsed: Value = serde_json::from_str(content).context("Config should be valid JSON")?;

    for field in [
        "ignores",
        "includes",
        "ignoreTestFiles",
        "outputFile",
        "cacheFile",
        "runtimeImport",
        "runtimeAlias",
    ] {
        assert!(parsed.get(field).is_some(), "Config should have '{}' field", field);
    }
    assert_eq!(parsed["outputFile"], OUTPUT_FILE);
    assert_eq!(parsed["ignoreTestFiles"], true);

    assert!(
        content.contains("\n  \""),
        "Config should use 2-space indentation"
    );
    assert!(content.ends_with("}\n"));

    Ok(())
}

#[test]
fn test_init_creates_config() -> Result<()> {
    let test = CliTest::new()?;

    assert_cmd_snapshot!(test.command().arg("init"), @r"
    success: true
    exit_code: 0
    ----- stdout -----
    ✓ Created .wiregenrc.json

    ----- stderr -----
    ");

    assert!(test.exists(".wiregenrc.json"));
    let content = test.read_file(".wiregenrc.json")?;
    assert_config_content(&content)?;

    Ok(())
}

#[test]
fn test_init_fails_if_exists() -> Result<()> {
    let test = CliTest::new()?;
    test.write_file(".wiregenrc.json", "{}")?;

    assert_cmd_snapshot!(test.command().arg("init"), @r"
    success: false
    exit_code: 1
    ----- stdout -----

    ----- stderr -----
    Error: .wiregenrc.json already exists
    ");

    assert_eq!(test.read_file(".wiregenrc.json")?, "{}");

    Ok(())
}

#[test]
fn test_init_config_is_immediately_usable() -> Result<()> {
    let test = CliTest::new()?;
    run({
        let mut cmd = test.command();
        cmd.arg("init");
        cmd
    })?;

    test.write_file(
        "svc/mailer.go",
        "package svc\n\n// @Service(\"mailer\")\ntype Mailer struct{}\n",
    )?;

    let (code, stdout, stderr) = run(test.generate_command())?;
    assert_eq!(code, 0, "stderr: {}", stderr);
    assert!(stdout.contains("Generated svc/zz_wiregen.go (1 service)"));

    Ok(())
}

#[test]
fn test_config_output_file_is_used() -> Result<()> {
    let test = CliTest::with_file(".wiregenrc.json", r#"{ "outputFile": "wire_gen.go" }"#)?;
    test.write_file(
        "svc/mailer.go",
        "package svc\n\n// @Service\ntype Mailer struct{}\n",
    )?;

    let (code, _, _) = run(test.generate_command())?;
    assert_eq!(code, 0);
    assert!(test.exists("svc/wire_gen.go"));
    assert!(!test.exists(&format!("svc/{}", OUTPUT_FILE)));

    Ok(())
}

#[test]
fn test_invalid_config_is_reported() -> Result<()> {
    let test = CliTest::with_file(".wiregenrc.json", r#"{ "outputFile": "wire_gen.txt" }"#)?;
    test.write_file("svc/a.go", "package svc\n")?;

    let (code, _, stderr) = run(test.generate_command())?;
    assert_eq!(code, 2);
    assert!(stderr.starts_with("Error: "), "{}", stderr);
    assert!(stderr.contains(".go"), "{}", stderr);

    Ok(())
}
