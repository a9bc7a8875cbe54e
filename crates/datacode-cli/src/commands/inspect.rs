//! `datacode inspect`: show what a module registers

use datacode_vm::NativeVm;

use super::load_module;

pub fn execute(vm: &mut NativeVm, target: &str) -> anyhow::Result<()> {
    let info = load_module(vm, target)?;

    println!("Module:       {}", info.name);
    println!("ABI version:  {} (VM {})", info.abi_version, vm.abi_version());
    println!("State:        {}", info.state);
    if let Some(path) = &info.path {
        println!("Library:      {}", path);
    }
    println!("Functions:    {}", info.functions.len());
    for function in &info.functions {
        println!("  {}", function);
    }

    Ok(())
}
