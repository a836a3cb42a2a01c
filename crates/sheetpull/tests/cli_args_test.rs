
use predicates::boolean::PredicateBooleanExt;
use predicates::str::contains;
use setup::DEFAULT_TIMEOUT;

use crate::setup::{make_cli, required_args};

#[test]
fn test_help_lists_job_arguments() {
    let mut cmd = make_cli();

    let assert = cmd.timeout(DEFAULT_TIMEOUT).arg("--help").assert();

    assert.success().stdout(
        contains("--google_secret_name")
            .and(contains("--google_spreadsheet_tab"))
            .and(contains("--output_format"))
            .and(contains("--compression")),
    );
}

#[test]
fn test_version() {
    let mut cmd = make_cli();

    let assert = cmd.timeout(DEFAULT_TIMEOUT).arg("--version").assert();

    assert
        .success()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_required_arguments() {
    let mut cmd = make_cli();

    let assert = cmd
        .timeout(DEFAULT_TIMEOUT)
        .args(["--bucket", "bucket"])
        .assert();

    assert.failure().stderr(
        contains("the following required arguments were not provided:")
            .and(contains("--google_secret_name <GOOGLE_SECRET_NAME>")),
    );
}

#[test]
/// Only csv and parquet are valid output formats.
fn test_invalid_output_format() {
    let mut cmd = make_cli();

    let assert = cmd
        .timeout(DEFAULT_TIMEOUT)
        .args(required_args())
        .args(["--output_format", "json"])
        .assert();

    assert
        .failure()
        .stderr(contains("Unsupported output format 'json'"));
}

#[test]
fn test_invalid_delimiter() {
    let mut cmd = make_cli();

    let assert = cmd
        .timeout(DEFAULT_TIMEOUT)
        .args(required_args())
        .args(["--csv_delimiter", "||"])
        .assert();

    assert
        .failure()
        .stderr(contains("Delimiter must be a single ascii character"));
}

#[test]
fn test_arguments_from_env() {
    let mut cmd = make_cli();

    // Everything comes from the environment, but there are no aws
    // credentials so the run stops before any request is made.
    let assert = cmd
        .timeout(DEFAULT_TIMEOUT)
        .env("GOOGLE_SECRET_NAME", "google")
        .env("GOOGLE_SECRET_REGION", "us-east-1")
        .env("GOOGLE_SPREADSHEET_ID", "sheet-id")
        .env("GOOGLE_SPREADSHEET_TAB", "Sheet1")
        .env("BUCKET", "bucket")
        .assert();

    assert
        .code(1)
        .stderr(contains("ERROR: Invalid configuration: No AWS credentials found"));
}

#[test]
fn test_missing_aws_credentials_exits_with_error() {
    let mut cmd = make_cli();

    let assert = cmd
        .timeout(DEFAULT_TIMEOUT)
        .args(required_args())
        .args(["--JOB_NAME", "pull-sheet", "--output_format", "parquet"])
        .assert();

    assert.code(1).stderr(contains("No AWS credentials found"));
}
