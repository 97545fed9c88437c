use anyhow::Result;
use pretty_assertions::assert_eq;

use crate::{CliTest, OUTPUT_FILE, run};

const MAILER: &str = "package svc\n\n// @Service(\"mailer\")\ntype Mailer struct{}\n";

#[test]
fn test_clean_removes_generated_state() -> Result<()> {
    let test = CliTest::with_file("svc/mailer.go", MAILER)?;
    run(test.generate_command())?;
    assert!(test.exists(&format!("svc/{}", OUTPUT_FILE)));
    assert!(test.exists("svc/.wiregen-cache.json"));

    let (code, stdout, _) = run(test.clean_command())?;
    assert_eq!(code, 0);
    assert!(stdout.contains("Removed svc/zz_wiregen.go\n"), "{}", stdout);
    assert!(stdout.contains("Removed svc/.wiregen-cache.json\n"));
    assert!(stdout.contains("Removed 2 files"));
    assert!(!test.exists(&format!("svc/{}", OUTPUT_FILE)));
    assert!(!test.exists("svc/.wiregen-cache.json"));
    assert!(test.exists("svc/mailer.go"));

    Ok(())
}

#[test]
fn test_clean_keeps_hand_written_output_name() -> Result<()> {
    let test = CliTest::with_file("svc/mailer.go", MAILER)?;
    test.write_file(
        &format!("svc/{}", OUTPUT_FILE),
        "package svc\n\nfunc handWritten() {}\n",
    )?;

    let (code, stdout, _) = run(test.clean_command())?;
    assert_eq!(code, 0);
    assert!(stdout.contains("Removed 0 files"), "{}", stdout);
    assert!(test.exists(&format!("svc/{}", OUTPUT_FILE)));

    Ok(())
}

#[test]
fn test_generate_after_clean_starts_over() -> Result<()> {
    let test = CliTest::with_file("svc/mailer.go", MAILER)?;
    run(test.generate_command())?;
    let first = test.read_file(&format!("svc/{}", OUTPUT_FILE))?;
    run(test.clean_command())?;

    let (code, stdout, _) = run(test.generate_command())?;
    assert_eq!(code, 0);
    assert!(stdout.contains("1 generated"), "{}", stdout);
    assert_eq!(test.read_file(&format!("svc/{}", OUTPUT_FILE))?, first);

    Ok(())
}
