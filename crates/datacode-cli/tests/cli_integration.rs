//! Integration tests for the `datacode` binary.

use std::path::PathBuf;
use std::process::Command;

fn datacode() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_datacode"));
    cmd.env_remove("DATACODE_MODULE_PATH").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let output = datacode().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("inspect"));
    assert!(stdout.contains("call"));
}

#[test]
fn test_inspect_missing_module_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = datacode()
        .args(["inspect", "definitely_not_here"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("definitely_not_here"), "{}", stderr);
}

#[test]
fn test_call_missing_library_path_fails() {
    let output = datacode()
        .args(["call", "/nonexistent/libmath.so", "add", "1", "2"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_bad_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("datacode.toml");
    std::fs::write(&config, "collision_policy = \"sometimes\"\n").unwrap();

    let output = datacode()
        .arg("--config")
        .arg(&config)
        .args(["inspect", "math"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("configuration"), "{}", stderr);
}

#[test]
fn test_config_search_path_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let modules = dir.path().join("modules");
    std::fs::create_dir(&modules).unwrap();
    let config = dir.path().join("datacode.toml");
    std::fs::write(
        &config,
        format!("search_paths = [{:?}]\nuse_env_path = false\n", modules.display().to_string()),
    )
    .unwrap();

    let output = datacode()
        .arg("--config")
        .arg(&config)
        .args(["inspect", "math"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(&modules.display().to_string()), "{}", stderr);
}

/// The `datacode-hello` shared library from the same target directory
fn hello_library() -> Option<PathBuf> {
    let exe = PathBuf::from(env!("CARGO_BIN_EXE_datacode"));
    let profile = exe.parent()?;
    let deps = profile.join("deps");
    let (prefix, suffix) = (std::env::consts::DLL_PREFIX, std::env::consts::DLL_SUFFIX);
    let exact = format!("{}datacode_hello{}", prefix, suffix);

    for dir in [profile.to_path_buf(), deps.clone()] {
        let candidate = dir.join(&exact);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    let stem = format!("{}datacode_hello", prefix);
    std::fs::read_dir(&deps)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .find(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&stem) && n.ends_with(suffix))
        })
}

#[test]
fn test_inspect_hello_library() {
    let Some(library) = hello_library() else {
        eprintln!("datacode-hello shared library not built; skipping");
        return;
    };
    let output = datacode().arg("inspect").arg(&library).output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello_module"), "{}", stdout);
    assert!(stdout.contains("Active"), "{}", stdout);
    for function in ["add", "divide", "greet", "hello"] {
        assert!(stdout.contains(function), "{}", stdout);
    }
}

#[test]
fn test_call_hello_library() {
    let Some(library) = hello_library() else {
        eprintln!("datacode-hello shared library not built; skipping");
        return;
    };
    let output = datacode()
        .arg("call")
        .arg(&library)
        .args(["add", "2", "3"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "5");

    let output = datacode()
        .arg("call")
        .arg(&library)
        .args(["divide", "1", "0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("RuntimeError"), "{}", stderr);
    assert!(stderr.contains("division by zero"), "{}", stderr);
}
