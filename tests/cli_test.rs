use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;

#[test]
fn test_demo_runs_with_defaults() {
    let mut cmd = Command::new(cargo_bin!("circulate"));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("U001 borrowed L001"))
        .stdout(predicate::str::contains("could not borrow L001"))
        .stdout(predicate::str::contains("claimed their reservation of L001"))
        .stdout(predicate::str::contains("loan summary"));
}

#[test]
fn test_demo_accepts_a_config_file() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    write!(
        config,
        r#"{{ "due_soon_window_days": 5, "book_policy": {{ "loanable": true, "loan_term_days": 21, "max_renewals": 1 }} }}"#
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("circulate"));
    cmd.arg("--config").arg(config.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("loan summary"));
}

#[test]
fn test_demo_rejects_malformed_config() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    write!(config, "not json").unwrap();

    let mut cmd = Command::new(cargo_bin!("circulate"));
    cmd.arg("--config").arg(config.path());

    cmd.assert().failure();
}
