//! Integration tests for Stagehand

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn stagehand() -> Command {
        cargo_bin_cmd!("stagehand")
    }

    fn write_pipeline(dir: &Path, content: &str) {
        fs::write(dir.join("stagehand.toml"), content).unwrap();
    }

    #[test]
    fn help_displays() {
        stagehand()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Sequential CI pipeline runner"));
    }

    #[test]
    fn version_displays() {
        stagehand()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("stagehand"));
    }

    #[test]
    fn validate_missing_pipeline_file() {
        let dir = TempDir::new().unwrap();

        stagehand()
            .current_dir(dir.path())
            .arg("validate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Pipeline file not found"))
            .stderr(predicate::str::contains("stagehand init"));
    }

    #[test]
    fn validate_rejects_broken_pipeline() {
        let dir = TempDir::new().unwrap();
        write_pipeline(
            dir.path(),
            r#"
            [[stage]]
            name = "empty"
        "#,
        );

        stagehand()
            .current_dir(dir.path())
            .arg("validate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("no steps"));
    }

    #[test]
    fn init_then_validate() {
        let dir = TempDir::new().unwrap();

        stagehand()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("stagehand.toml"));

        stagehand()
            .current_dir(dir.path())
            .arg("validate")
            .assert()
            .success()
            .stdout(predicate::str::contains("is valid"));
    }

    #[test]
    fn init_refuses_overwrite_without_force() {
        let dir = TempDir::new().unwrap();

        stagehand().current_dir(dir.path()).arg("init").assert().success();

        stagehand()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));

        stagehand()
            .current_dir(dir.path())
            .args(["init", "--force"])
            .assert()
            .success();
    }

    #[test]
    fn run_fails_fast_and_skips_later_stages() {
        let dir = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        write_pipeline(
            dir.path(),
            r#"
            [pipeline]
            name = "demo"
            cache_base = 1

            [[stage]]
            name = "fetch"
            [[stage.step]]
            command = "sh"
            args = ["-c", "true"]

            [[stage]]
            name = "lint"
            [[stage.step]]
            command = "sh"
            args = ["-c", "echo style error >&2; exit 1"]

            [[stage]]
            name = "test"
            [[stage.step]]
            command = "sh"
            args = ["-c", "touch test-ran"]

            [[stage]]
            name = "build"
            [[stage.step]]
            command = "sh"
            args = ["-c", "touch build-ran"]
        "#,
        );

        stagehand()
            .current_dir(dir.path())
            .args(["run", "--cache-dir"])
            .arg(cache.path())
            .assert()
            .failure()
            .stdout(predicate::str::contains("failed"))
            .stdout(predicate::str::contains("lint"))
            .stdout(predicate::str::contains("skipped"))
            .stdout(predicate::str::contains("style error"));

        // Skipped stages never ran their steps
        assert!(!dir.path().join("test-ran").exists());
        assert!(!dir.path().join("build-ran").exists());
    }

    #[test]
    fn run_success_reports_json() {
        let dir = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        write_pipeline(
            dir.path(),
            r#"
            [pipeline]
            name = "demo"

            [[stage]]
            name = "build"
            [[stage.step]]
            command = "sh"
            args = ["-c", "true"]
        "#,
        );

        stagehand()
            .current_dir(dir.path())
            .args(["run", "--format", "json", "--cache-dir"])
            .arg(cache.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("\"state\": \"succeeded\""));
    }

    #[test]
    fn cache_restores_across_runs() {
        let cache = TempDir::new().unwrap();

        // Pipeline whose fetch stage produces vendor/ and caches it
        let producer = r#"
            [pipeline]
            name = "demo"
            cache_base = 1

            [[stage]]
            name = "fetch"
            cache = { template = ["epoch", "arch"], paths = ["vendor"] }
            [[stage.step]]
            command = "sh"
            args = ["-c", "mkdir -p vendor && echo pinned > vendor/dep.txt"]
        "#;

        let first = TempDir::new().unwrap();
        write_pipeline(first.path(), producer);
        stagehand()
            .current_dir(first.path())
            .args(["run", "--cache-dir"])
            .arg(cache.path())
            .assert()
            .success();

        // A fresh project only asserts the restore happened
        let consumer = r#"
            [pipeline]
            name = "demo"
            cache_base = 1

            [[stage]]
            name = "fetch"
            cache = { template = ["epoch", "arch"], paths = ["vendor"] }
            [[stage.step]]
            command = "sh"
            args = ["-c", "test -f vendor/dep.txt"]
        "#;

        let second = TempDir::new().unwrap();
        write_pipeline(second.path(), consumer);
        stagehand()
            .current_dir(second.path())
            .args(["run", "--cache-dir"])
            .arg(cache.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("cache:"));

        // With caching disabled the same assertion fails
        let third = TempDir::new().unwrap();
        write_pipeline(third.path(), consumer);
        stagehand()
            .current_dir(third.path())
            .args(["run", "--no-cache", "--cache-dir"])
            .arg(cache.path())
            .assert()
            .failure();
    }

    #[test]
    fn cache_list_and_clear() {
        let cache = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();
        write_pipeline(
            dir.path(),
            r#"
            [pipeline]
            cache_base = 1

            [[stage]]
            name = "fetch"
            cache = { template = ["epoch"], paths = ["out.txt"] }
            [[stage.step]]
            command = "sh"
            args = ["-c", "echo hi > out.txt"]
        "#,
        );

        stagehand()
            .current_dir(dir.path())
            .args(["run", "--cache-dir"])
            .arg(cache.path())
            .assert()
            .success();

        stagehand()
            .args(["cache", "list", "--format", "plain", "--cache-dir"])
            .arg(cache.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("v1"));

        stagehand()
            .args(["cache", "clear", "--cache-dir"])
            .arg(cache.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("--yes"));

        stagehand()
            .args(["cache", "clear", "--yes", "--cache-dir"])
            .arg(cache.path())
            .assert()
            .success();

        stagehand()
            .args(["cache", "list", "--format", "plain", "--cache-dir"])
            .arg(cache.path())
            .assert()
            .success()
            .stdout(predicate::str::is_empty());
    }

    #[test]
    fn missing_facet_fails_the_run() {
        let dir = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        write_pipeline(
            dir.path(),
            r#"
            [pipeline]
            cache_base = 1

            [[stage]]
            name = "fetch"
            cache = { template = ["epoch", "branch"], paths = ["vendor"] }
            [[stage.step]]
            command = "sh"
            args = ["-c", "touch step-ran"]
        "#,
        );

        // No --branch supplied, so the template cannot resolve
        stagehand()
            .current_dir(dir.path())
            .args(["run", "--cache-dir"])
            .arg(cache.path())
            .assert()
            .failure()
            .stdout(predicate::str::contains("missing facet"));

        assert!(!dir.path().join("step-ran").exists());

        // Supplying the facet makes the same pipeline pass
        stagehand()
            .current_dir(dir.path())
            .args(["run", "--branch", "main", "--cache-dir"])
            .arg(cache.path())
            .assert()
            .success();
    }

    #[test]
    fn completions_generate() {
        stagehand()
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("stagehand"));
    }
}
