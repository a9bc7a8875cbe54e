//! Subcommand implementations

pub mod call;
pub mod inspect;

use std::path::Path;

use anyhow::Context;
use datacode_vm::{resolver, ModuleInfo, NativeVm, VmConfig};

/// Build a VM from the optional configuration file
pub fn create_vm(config: Option<&Path>) -> anyhow::Result<NativeVm> {
    let config = match config {
        Some(path) => VmConfig::from_file(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?,
        None => VmConfig::default(),
    };
    Ok(NativeVm::with_config(config))
}

/// Load `target` as a library path when it looks like one, otherwise by name
pub fn load_module(vm: &mut NativeVm, target: &str) -> anyhow::Result<ModuleInfo> {
    let result = if resolver::is_path_like(target) || Path::new(target).is_file() {
        vm.load_path(target)
    } else {
        vm.load(target)
    };
    result.with_context(|| format!("Failed to load module {}", target))
}
