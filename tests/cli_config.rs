//! Config discovery, file collection and `guardian check` exit codes.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use guardian::cli::{self, CheckArgs, EXIT_ERROR, EXIT_FAILED, EXIT_SUCCESS};
use guardian::config::{GuardianConfig, Strictness};
use guardian::RuleRegistry;
use tempfile::TempDir;

fn project_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join("project")
}

fn check_args(path: &Path) -> CheckArgs {
    CheckArgs {
        path: path.to_path_buf(),
        config: None,
        format: "json".to_string(),
        strictness: None,
        seed: None,
        rules: Vec::new(),
        fix: false,
    }
}

#[test]
fn test_discovers_config_by_name() {
    let dir = TempDir::new().unwrap();
    assert!(GuardianConfig::discover(dir.path()).is_none());

    fs::write(dir.path().join(".guardian.yaml"), "strictness: lenient\n").unwrap();
    assert_eq!(
        GuardianConfig::discover(dir.path()),
        Some(dir.path().join(".guardian.yaml"))
    );

    // guardian.yaml takes precedence over the dotfile.
    fs::write(dir.path().join("guardian.yaml"), "strictness: strict\n").unwrap();
    let found = GuardianConfig::discover(dir.path()).unwrap();
    assert_eq!(found, dir.path().join("guardian.yaml"));
    assert_eq!(
        GuardianConfig::parse_file(&found).unwrap().strictness,
        Strictness::Strict
    );
}

#[test]
fn test_project_config_resolves() {
    let config = GuardianConfig::parse_file(project_path().join("guardian.yaml")).unwrap();
    assert_eq!(config.debounce(), Duration::from_millis(150));

    let registry = RuleRegistry::builtin();
    let analysis = config.analysis_config(&registry);
    assert_eq!(analysis.seed, 42);
    assert_eq!(analysis.enabled_rules.len(), registry.len() - 1);
    assert!(!analysis.is_enabled("console-log"));
}

#[test]
fn test_collect_files_honors_exclusions() {
    let root = project_path();
    let config = GuardianConfig::parse_file(root.join("guardian.yaml")).unwrap();
    let exclusions = config.exclusions().unwrap();
    let files: Vec<_> = cli::collect_files(&root, &exclusions)
        .unwrap()
        .into_iter()
        .map(|p| p.strip_prefix(&root).unwrap().to_string_lossy().replace('\\', "/"))
        .collect();
    assert_eq!(files, vec!["src/app.ts", "src/view.tsx"]);
}

#[test]
fn test_missing_path_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let args = check_args(&dir.path().join("does-not-exist"));
    assert_eq!(cli::run_check(&args).unwrap(), EXIT_ERROR);
}

#[test]
fn test_invalid_format_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let mut args = check_args(dir.path());
    args.format = "xml".to_string();
    assert_eq!(cli::run_check(&args).unwrap(), EXIT_ERROR);
}

#[test]
fn test_broken_config_is_usage_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("guardian.yaml"), "strictness: [not, a, level]\n").unwrap();
    fs::write(dir.path().join("a.ts"), "let a = 1;\n").unwrap();
    assert_eq!(cli::run_check(&check_args(dir.path())).unwrap(), EXIT_ERROR);
}

#[cfg(feature = "tree-sitter")]
mod check {
    use super::*;

    fn single_file(source: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("input.ts");
        fs::write(&path, source).unwrap();
        (dir, path)
    }

    #[test]
    fn test_clean_file_passes() {
        let (_dir, path) = single_file("export const n: number = 1;\n");
        assert_eq!(cli::run_check(&check_args(&path)).unwrap(), EXIT_SUCCESS);
    }

    #[test]
    fn test_warnings_alone_pass() {
        let (_dir, path) = single_file("export const r = Math.random();\n");
        assert_eq!(cli::run_check(&check_args(&path)).unwrap(), EXIT_SUCCESS);
    }

    #[test]
    fn test_error_violation_fails() {
        let (_dir, path) = single_file("const x: any = 1;\n");
        assert_eq!(cli::run_check(&check_args(&path)).unwrap(), EXIT_FAILED);
    }

    #[test]
    fn test_parse_failure_fails() {
        let (_dir, path) = single_file("const s = 'abc\n");
        assert_eq!(cli::run_check(&check_args(&path)).unwrap(), EXIT_FAILED);
    }

    #[test]
    fn test_rule_filter_limits_findings() {
        let (_dir, path) = single_file("const x: any = 1;\n");
        let mut args = check_args(&path);
        args.rules = vec!["console-log".to_string()];
        assert_eq!(cli::run_check(&args).unwrap(), EXIT_SUCCESS);

        args.rules = vec!["no-such-rule".to_string()];
        assert_eq!(cli::run_check(&args).unwrap(), EXIT_ERROR);
    }

    #[test]
    fn test_fix_rewrites_file() {
        let (_dir, path) = single_file("const x: any = 1;\nconsole.log('hi');\n");
        let mut args = check_args(&path);
        args.strictness = Some("strict".to_string());
        args.fix = true;

        assert_eq!(cli::run_check(&args).unwrap(), EXIT_SUCCESS);
        assert_eq!(fs::read_to_string(&path).unwrap(), "const x: unknown = 1;\n\n");
    }

    #[test]
    fn test_project_directory() {
        let mut args = check_args(&project_path());
        args.format = "sarif".to_string();
        // app.ts imports @sentry/browser, an error under the project config.
        assert_eq!(cli::run_check(&args).unwrap(), EXIT_FAILED);
    }
}
