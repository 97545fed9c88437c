use anyhow::Result;
use pretty_assertions::assert_eq;

use crate::{CliTest, OUTPUT_FILE, run};

const USERS: &str = r#"package svc

import (
	"context"
	"time"
)

// @Router(prefix="/api")
type Users struct {
	// @Config(key="http.timeout", default="15m")
	Timeout time.Duration
}

// @Route("GET /users/{id}")
func (u *Users) Get(ctx context.Context, id string) (string, error) {
	return id, nil
}
"#;

const USERS_WITHOUT_DIRECTIVES: &str = r#"package svc

import (
	"context"
	"time"
)

type Users struct {
	Timeout time.Duration
}

func (u *Users) Get(ctx context.Context, id string) (string, error) {
	return id, nil
}
"#;

fn output() -> String {
    format!("svc/{}", OUTPUT_FILE)
}

#[test]
fn test_generate_router_service() -> Result<()> {
    let test = CliTest::with_file("svc/users.go", USERS)?;

    let (code, stdout, _) = run(test.generate_command())?;
    assert_eq!(code, 0);
    assert!(stdout.contains("Generated svc/zz_wiregen.go (1 service)\n"), "{}", stdout);
    assert!(stdout.contains("Processed 1 folder: 1 generated, 0 removed, 0 unchanged"));

    let generated = test.read_file(&output())?;
    assert!(generated.starts_with("// Code generated by wiregen. DO NOT EDIT.\n"));
    assert!(generated.contains("\npackage svc\n"));
    assert!(generated.contains("\t\"time\"\n"));
    assert!(generated.contains("svc.Timeout = 15 * time.Minute\n"));
    assert_eq!(generated.matches("router.Handle(").count(), 1);
    assert!(generated.contains("router.Handle(\"GET\", \"/api/users/{id}\", nil,"));

    Ok(())
}

#[test]
fn test_removing_directives_deletes_output() -> Result<()> {
    let test = CliTest::with_file("svc/users.go", USERS)?;
    let (code, _, _) = run(test.generate_command())?;
    assert_eq!(code, 0);
    assert!(test.exists(&output()));

    test.write_file("svc/users.go", USERS_WITHOUT_DIRECTIVES)?;
    let (code, stdout, _) = run(test.generate_command())?;
    assert_eq!(code, 0);
    assert!(stdout.contains("Removed svc/zz_wiregen.go\n"), "{}", stdout);
    assert!(stdout.contains("0 generated, 1 removed, 0 unchanged"));
    assert!(!test.exists(&output()));

    Ok(())
}

#[test]
fn test_deleting_marked_file_deletes_output() -> Result<()> {
    let test = CliTest::with_file("svc/users.go", USERS)?;
    test.write_file("svc/helpers.go", "package svc\n\nfunc helper() {}\n")?;
    run(test.generate_command())?;
    assert!(test.exists(&output()));

    test.remove_file("svc/users.go")?;
    let (code, stdout, _) = run(test.generate_command())?;
    assert_eq!(code, 0);
    assert!(stdout.contains("Removed svc/zz_wiregen.go\n"), "{}", stdout);
    assert!(!test.exists(&output()));

    Ok(())
}

#[test]
fn test_second_run_is_unchanged() -> Result<()> {
    let test = CliTest::with_file("svc/users.go", USERS)?;
    run(test.generate_command())?;
    let first = test.read_file(&output())?;

    let (code, stdout, _) = run(test.generate_command())?;
    assert_eq!(code, 0);
    assert!(!stdout.contains("Generated"));
    assert!(stdout.contains("Processed 1 folder: 0 generated, 0 removed, 1 unchanged"));
    assert_eq!(test.read_file(&output())?, first);

    Ok(())
}

#[test]
fn test_string_defaults_keep_their_quoting() -> Result<()> {
    let test = CliTest::with_file(
        "svc/greeter.go",
        r#"package svc

// @Service
type Greeter struct {
	// @Config(key="greeting.raw", default=`say "hi"`)
	Raw string
	// @Config(key="greeting.plain", default="say \"hi\"\t")
	Plain string
}
"#,
    )?;

    let (code, _, _) = run(test.generate_command())?;
    assert_eq!(code, 0);

    let generated = test.read_file(&output())?;
    assert!(generated.contains(r#"svc.Raw = `say "hi"`"#), "{}", generated);
    assert!(generated.contains(r#"svc.Plain = "say \"hi\"\t""#), "{}", generated);

    Ok(())
}

#[test]
fn test_marker_on_function_fails_file() -> Result<()> {
    let test = CliTest::with_file(
        "svc/users.go",
        "package svc\n\n// @Service\nfunc NewUsers() *Users { return nil }\n\ntype Users struct{}\n",
    )?;

    let (code, stdout, _) = run(test.generate_command())?;
    assert_eq!(code, 1);
    assert!(stdout.contains(
        "error: @Service must precede a struct declaration, found function `NewUsers`  placement"
    ));
    assert!(stdout.contains("--> svc/users.go:3:"));
    assert!(stdout.contains("1 problems (1 error, 0 warnings)"));
    assert!(!stdout.contains("Processed"));
    assert!(!test.exists(&output()));

    Ok(())
}

#[test]
fn test_broken_file_does_not_block_sibling() -> Result<()> {
    let test = CliTest::with_file(
        "svc/broken.go",
        "package svc\n\n// @Service\ntype ID = string\n",
    )?;
    test.write_file("svc/mailer.go", "package svc\n\n// @Service(\"mailer\")\ntype Mailer struct{}\n")?;

    let (code, stdout, _) = run(test.generate_command())?;
    assert_eq!(code, 1);
    assert!(stdout.contains("Generated svc/zz_wiregen.go (1 service)"), "{}", stdout);
    assert!(stdout.contains("found type alias `ID`"));

    let generated = test.read_file(&output())?;
    assert!(generated.contains("r.Provide(\"mailer\""));
    assert!(!generated.contains("ID"));

    Ok(())
}

#[test]
fn test_helper_only_import_is_excluded() -> Result<()> {
    let test = CliTest::with_file(
        "svc/orders.go",
        r#"package svc

import (
	"example.com/app/audit"
	"example.com/app/models"
)

// @Router
type Orders struct{}

// @Route("POST /orders")
func (o *Orders) Create(in models.Order) error {
	return o.record(audit.Entry{})
}

func (o *Orders) record(e audit.Entry) error {
	return nil
}
"#,
    )?;

    let (code, _, _) = run(test.generate_command())?;
    assert_eq!(code, 0);

    let generated = test.read_file(&output())?;
    assert!(generated.contains("\t\"example.com/app/models\"\n"));
    assert!(!generated.contains("example.com/app/audit"));

    Ok(())
}

#[test]
fn test_dry_run_writes_nothing() -> Result<()> {
    let test = CliTest::with_file("svc/users.go", USERS)?;
    let mut cmd = test.generate_command();
    cmd.arg("--dry-run");

    let (code, stdout, _) = run(cmd)?;
    assert_eq!(code, 0);
    assert!(stdout.contains("Would generate svc/zz_wiregen.go (1 service)"), "{}", stdout);
    assert!(stdout.contains("Run without --dry-run to write these files."));
    assert!(!test.exists(&output()));

    Ok(())
}

#[test]
fn test_force_regenerates_hand_edits() -> Result<()> {
    let test = CliTest::with_file("svc/users.go", USERS)?;
    run(test.generate_command())?;
    let original = test.read_file(&output())?;

    test.write_file(&output(), &original.replace("15 * time.Minute", "time.Hour"))?;
    let mut cmd = test.generate_command();
    cmd.arg("--force");

    let (code, stdout, _) = run(cmd)?;
    assert_eq!(code, 0);
    assert!(stdout.contains("1 generated"), "{}", stdout);
    assert_eq!(test.read_file(&output())?, original);

    Ok(())
}

#[test]
fn test_output_file_override() -> Result<()> {
    let test = CliTest::with_file("svc/users.go", USERS)?;
    let mut cmd = test.generate_command();
    cmd.args(["--output-file", "wiring_gen.go"]);

    let (code, stdout, _) = run(cmd)?;
    assert_eq!(code, 0);
    assert!(stdout.contains("Generated svc/wiring_gen.go (1 service)"), "{}", stdout);
    assert!(test.exists("svc/wiring_gen.go"));
    assert!(!test.exists(&output()));

    Ok(())
}

#[test]
fn test_vendor_and_hidden_dirs_are_skipped() -> Result<()> {
    let test = CliTest::with_file("vendor/lib/lib.go", "package lib\n\n// @Service\ntype Lib struct{}\n")?;
    test.write_file(".cache/x.go", "package x\n\n// @Service\ntype X struct{}\n")?;

    let (code, stdout, _) = run(test.generate_command())?;
    assert_eq!(code, 0);
    assert!(stdout.contains("0 generated"), "{}", stdout);
    assert!(!test.exists(&format!("vendor/lib/{}", OUTPUT_FILE)));
    assert!(!test.exists(&format!(".cache/{}", OUTPUT_FILE)));

    Ok(())
}

#[test]
fn test_missing_path_is_an_error() -> Result<()> {
    let test = CliTest::new()?;
    let mut cmd = test.generate_command();
    cmd.arg("does-not-exist");

    let (code, _, stderr) = run(cmd)?;
    assert_eq!(code, 2);
    assert!(stderr.contains("Path is not a directory: does-not-exist"), "{}", stderr);

    Ok(())
}
