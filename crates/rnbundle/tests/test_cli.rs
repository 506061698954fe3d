use std::process::Command;
use tempfile::TempDir;

fn rnbundle() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rnbundle"))
}

#[test]
fn test_help_lists_subcommands() {
    let output = rnbundle()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("bundle"));
    assert!(stdout.contains("package-path"));
    assert!(stdout.contains("Increase verbosity (can be repeated: -v, -vv, -vvv)"));
}

#[test]
fn test_package_path_help_describes_relative_result() {
    let output = rnbundle()
        .args(["package-path", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("relative to the directory of"));
    assert!(!stdout.contains("absolute path"));
}

#[test]
fn test_bundle_requires_entry_and_output() {
    let output = rnbundle()
        .args(["bundle", "--platform", "ios"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--entry-file"));
}

#[test]
fn test_invalid_platform_exits_with_diagnostic() {
    let project = TempDir::new().unwrap();
    let output = rnbundle()
        .current_dir(project.path())
        .args([
            "-v",
            "bundle",
            "--entry-file",
            "index.js",
            "--bundle-output",
            "main.jsbundle",
            "--platform",
            "windows",
        ])
        .env_remove("RNBUNDLE_PLATFORMS")
        .env("XDG_CONFIG_HOME", project.path())
        .env("XDG_CONFIG_DIRS", project.path())
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid platform (windows) selected."));
    assert!(stderr.contains("Available platforms are:"));
    assert!(stderr.contains("Invalid platform selected."));
    assert!(!project.path().join("main.jsbundle").exists());
}

#[test]
fn test_package_path_prints_joined_path() {
    let project = TempDir::new().unwrap();
    let output = rnbundle()
        .current_dir(project.path())
        .args(["package-path", "scripts/launchPackager.command"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout
            .trim_end()
            .ends_with("scripts/launchPackager.command"),
        "unexpected output: {stdout}"
    );
}
