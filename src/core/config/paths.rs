//! Filesystem locations: where `config.yml` is looked up and where the
//! sqlite store, secrets file and logs live.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "IMSKOS";
const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub db_path: PathBuf,
    pub secrets_path: PathBuf,
}

impl AppPaths {
    /// Resolve from `IMSKOS_ROOT` and `IMSKOS_DATA_DIR`, else discover.
    pub fn new() -> Self {
        let project_root = env::var_os("IMSKOS_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(discover_project_root);
        let data_dir = env::var_os("IMSKOS_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_data_dir(&project_root));
        Self::with_dirs(project_root, data_dir)
    }

    /// Lay out paths under explicit directories and create the log directory.
    pub fn with_dirs(project_root: PathBuf, data_dir: PathBuf) -> Self {
        let paths = Self {
            log_dir: data_dir.join("logs"),
            db_path: data_dir.join("knowledge_base.db"),
            secrets_path: data_dir.join("secrets.yaml"),
            project_root,
            data_dir,
        };
        let _ = fs::create_dir_all(&paths.log_dir);
        paths
    }

    /// `config.yml` locations, highest priority first.
    pub fn config_candidates(&self) -> [PathBuf; 2] {
        [
            self.data_dir.join(CONFIG_FILE),
            self.project_root.join(CONFIG_FILE),
        ]
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_project_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if manifest_dir.join(CONFIG_FILE).is_file() {
        return manifest_dir;
    }
    env::current_dir().unwrap_or(manifest_dir)
}

// Debug builds keep data next to the checkout.
fn default_data_dir(project_root: &Path) -> PathBuf {
    if cfg!(debug_assertions) {
        return project_root.join("data");
    }
    platform_data_dir().join(APP_DIR)
}

fn platform_data_dir() -> PathBuf {
    if cfg!(target_os = "windows") {
        return env::var_os("LOCALAPPDATA")
            .or_else(|| env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
    }

    let home = env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    if cfg!(target_os = "macos") {
        return home.join("Library").join("Application Support");
    }
    env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join(".local").join("share"))
}
