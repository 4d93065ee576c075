//! Layering behaviour of [`mxbridge_config::Config`] loading.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;
use rstest::{fixture, rstest};
use tempfile::TempDir;
use ortho_config::OrthoConfig;

use mxbridge_config::{AccessOverride, Config, DEFAULT_MAX_COLLECTION_SIZE, LogFormat};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct EnvOverride {
    key: &'static str,
    previous: Option<OsString>,
}

impl EnvOverride {
    fn set_var(key: &'static str, value: &OsStr) -> Self {
        let previous = std::env::var_os(key);
        // Environment mutation is `unsafe` in edition 2024; the guard below
        // restores the previous value and the tests serialise on ENV_MUTEX.
        unsafe { std::env::set_var(key, value) };
        Self { key, previous }
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => unsafe { std::env::set_var(self.key, value) },
            None => unsafe { std::env::remove_var(self.key) },
        }
    }
}

struct Workspace {
    temp_dir: TempDir,
    _guard: MutexGuard<'static, ()>,
}

impl Workspace {
    fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join("mxbridge.toml");
        fs::write(&path, contents).expect("write configuration file");
        path
    }
}

#[fixture]
fn workspace() -> Workspace {
    let guard = ENV_MUTEX
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    Workspace {
        temp_dir: TempDir::new().expect("create temp dir"),
        _guard: guard,
    }
}

fn args_with_file(path: &PathBuf) -> Vec<OsString> {
    vec![
        OsString::from("mxbridge"),
        OsString::from("--config-path"),
        path.clone().into_os_string(),
    ]
}

#[rstest]
fn file_values_override_defaults(workspace: Workspace) {
    let path = workspace.write_config(concat!(
        "max_depth = 4\n",
        "log_format = \"compact\"\n",
        "[[access_rules]]\n",
        "kind = \"write\"\n",
        "object = \"app:*\"\n",
        "directive = \"deny\"\n",
    ));

    let config = Config::load_from_iter(args_with_file(&path)).expect("load configuration");

    assert_eq!(config.max_depth, 4);
    assert_eq!(config.log_format(), LogFormat::Compact);
    assert_eq!(config.max_collection_size, DEFAULT_MAX_COLLECTION_SIZE);
    let policy = config.access_policy();
    let rule = policy.iter().next().expect("one rule");
    assert_eq!(rule.kind, "write");
    assert_eq!(rule.directive, AccessOverride::Deny);
}

#[rstest]
fn environment_overrides_file(workspace: Workspace) {
    let path = workspace.write_config("max_depth = 4\n");
    let _env = EnvOverride::set_var("MXBRIDGE_MAX_DEPTH", OsStr::new("6"));

    let config = Config::load_from_iter(args_with_file(&path)).expect("load configuration");

    assert_eq!(config.max_depth, 6);
}

#[rstest]
fn malformed_file_is_reported(workspace: Workspace) {
    let path = workspace.write_config("max_depth = \"deep\"\n");

    let result = Config::load_from_iter(args_with_file(&path));

    assert!(result.is_err(), "malformed configuration must not load");
}
