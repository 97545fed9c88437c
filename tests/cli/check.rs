use anyhow::Result;
use pretty_assertions::assert_eq;

use crate::{CliTest, OUTPUT_FILE, run};

const MAILER: &str = "package svc\n\n// @Service(\"mailer\")\ntype Mailer struct{}\n";

#[test]
fn test_check_clean_project() -> Result<()> {
    let test = CliTest::with_file("svc/mailer.go", MAILER)?;
    run(test.generate_command())?;

    let (code, stdout, _) = run(test.check_command())?;
    assert_eq!(code, 0);
    assert_eq!(stdout, "✓ Checked 1 folder, 1 service - no issues found\n");

    Ok(())
}

#[test]
fn test_check_reports_stale_output_without_writing() -> Result<()> {
    let test = CliTest::with_file("svc/mailer.go", MAILER)?;

    let (code, stdout, _) = run(test.check_command())?;
    assert_eq!(code, 0);
    assert!(stdout.contains("note: svc/zz_wiregen.go is out of date\n"), "{}", stdout);
    assert!(stdout.contains("Checked 1 folder, 1 service - no issues found"));
    assert!(!test.exists(&format!("svc/{}", OUTPUT_FILE)));
    assert!(!test.exists("svc/.wiregen-cache.json"));

    Ok(())
}

#[test]
fn test_check_reports_malformed_directive() -> Result<()> {
    let test = CliTest::with_file(
        "svc/users.go",
        "package svc\n\n// @Router\ntype Users struct{}\n\n// @Route(\"GET /a\", \"auth\"\nfunc (u *Users) A() error { return nil }\n",
    )?;

    let (code, stdout, _) = run(test.check_command())?;
    assert_eq!(code, 1);
    assert!(stdout.contains("error: malformed @Route"), "{}", stdout);
    assert!(stdout.contains("--> svc/users.go:6:"));
    assert!(stdout.contains("6 | // @Route(\"GET /a\", \"auth\""));
    assert!(!stdout.contains("no issues found"));

    Ok(())
}

#[test]
fn test_check_reports_duplicate_route() -> Result<()> {
    let test = CliTest::with_file(
        "svc/users.go",
        r#"package svc

// @Router
type Users struct{}

// @Route("GET /users")
func (u *Users) List() error { return nil }

// @Route("GET /users")
func (u *Users) All() error { return nil }
"#,
    )?;

    let (code, stdout, _) = run(test.check_command())?;
    assert_eq!(code, 1);
    assert!(stdout.contains("conflict"), "{}", stdout);
    assert!(stdout.contains("GET /users"));

    Ok(())
}

#[test]
fn test_check_indented_comment_is_not_a_directive() -> Result<()> {
    let test = CliTest::with_file(
        "svc/doc.go",
        "package svc\n\n// Example:\n//\n//\t@Service\n//   @Router\ntype Doc struct{}\n",
    )?;

    let (code, stdout, _) = run(test.check_command())?;
    assert_eq!(code, 0);
    assert_eq!(stdout, "✓ Checked 1 folder, 0 services - no issues found\n");

    Ok(())
}

#[test]
fn test_check_warns_on_route_without_router() -> Result<()> {
    let test = CliTest::with_file(
        "svc/plain.go",
        "package svc\n\n// @Service\ntype Plain struct{}\n\n// @Route(\"GET /x\")\nfunc (p *Plain) X() error { return nil }\n",
    )?;

    let (code, stdout, _) = run(test.check_command())?;
    assert_eq!(code, 0);
    assert!(stdout.contains("warning: @Route is ignored"), "{}", stdout);
    assert!(stdout.contains("1 problems (0 errors, 1 warning)"));

    Ok(())
}
