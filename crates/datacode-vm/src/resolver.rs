//! Shared-library discovery
//!
//! Maps a module name to a platform library file and searches the configured
//! directories, then `DATACODE_MODULE_PATH`.

use std::path::PathBuf;

use crate::error::LoadError;

/// Environment variable holding extra module directories
pub const MODULE_PATH_ENV: &str = "DATACODE_MODULE_PATH";

/// Platform file name for module `name`
pub fn library_file_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.dll", name)
    } else if cfg!(target_os = "macos") {
        format!("lib{}.dylib", name)
    } else {
        format!("lib{}.so", name)
    }
}

/// Whether `name` should be treated as a path instead of a module name
pub fn is_path_like(name: &str) -> bool {
    name.contains('/') || name.contains(std::path::MAIN_SEPARATOR)
}

/// Ordered list of directories searched for module libraries
#[derive(Debug, Clone, Default)]
pub struct ModuleResolver {
    search_paths: Vec<PathBuf>,
}

impl ModuleResolver {
    /// Resolver over exactly `search_paths`
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Append the entries of `DATACODE_MODULE_PATH`, if set
    pub fn with_env_paths(mut self) -> Self {
        if let Some(value) = std::env::var_os(MODULE_PATH_ENV) {
            self.search_paths
                .extend(std::env::split_paths(&value).filter(|p| !p.as_os_str().is_empty()));
        }
        self
    }

    /// Directories in search order
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Candidate files for `name`, in search order
    pub fn candidates(&self, name: &str) -> Vec<PathBuf> {
        if is_path_like(name) {
            return vec![PathBuf::from(name)];
        }
        let file = library_file_name(name);
        self.search_paths.iter().map(|dir| dir.join(&file)).collect()
    }

    /// First existing candidate for `name`
    pub fn resolve(&self, name: &str) -> Result<PathBuf, LoadError> {
        let candidates = self.candidates(name);
        candidates
            .iter()
            .find(|path| path.is_file())
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                name: name.to_string(),
                searched: candidates.iter().map(|p| p.display().to_string()).collect(),
            })
    }
}
