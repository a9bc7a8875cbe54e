//! ABI version stamp embedded in every module descriptor

use std::fmt;

/// ABI contract a module was compiled against.
///
/// Layout changes bump `major`; backward-compatible additions bump `minor`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AbiVersion {
    /// Incompatible layout revision
    pub major: u16,
    /// Compatible additions within a major revision
    pub minor: u16,
}

/// The ABI version implemented by this crate.
pub const DATACODE_ABI_VERSION: AbiVersion = AbiVersion::new(1, 0);

impl AbiVersion {
    /// Create a version stamp
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl Default for AbiVersion {
    fn default() -> Self {
        DATACODE_ABI_VERSION
    }
}

impl fmt::Display for AbiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Whether a module built against `module` may be activated by a VM that
/// implements `vm`.
///
/// Only the major version decides. A lower module minor lacks additions the
/// VM tolerates; a higher one carries additions the VM simply never uses.
pub const fn abi_compatible(vm: AbiVersion, module: AbiVersion) -> bool {
    vm.major == module.major
}
