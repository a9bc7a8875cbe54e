//! Module loading state machine
//!
//! ```text
//! Unloaded ─► SymbolResolved ─► VersionChecked ─► Registered ─► Active
//!    │              │                  │
//!    ▼              ▼                  ▼
//! LoadFailed  VersionMismatch   RegistrationFailed
//! ```
//!
//! A descriptor that cannot be read after the version check (null name,
//! missing callback, duplicate module) also ends in `LoadFailed`.

use std::fmt;

use datacode_abi::AbiVersion;
use tracing::{debug, warn};

use crate::loader::Library;

/// Lifecycle state of one module load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleState {
    /// Nothing has happened yet
    Unloaded,
    /// The entry point was found and returned a descriptor
    SymbolResolved,
    /// The major ABI version matches
    VersionChecked,
    /// The registration callback returned without failure
    Registered,
    /// Functions are callable
    Active,
    /// Library, symbol or descriptor unusable
    LoadFailed,
    /// Major ABI version differs
    VersionMismatch,
    /// The registration callback failed
    RegistrationFailed,
}

impl ModuleState {
    /// Name of the state
    pub fn name(self) -> &'static str {
        match self {
            ModuleState::Unloaded => "Unloaded",
            ModuleState::SymbolResolved => "SymbolResolved",
            ModuleState::VersionChecked => "VersionChecked",
            ModuleState::Registered => "Registered",
            ModuleState::Active => "Active",
            ModuleState::LoadFailed => "LoadFailed",
            ModuleState::VersionMismatch => "VersionMismatch",
            ModuleState::RegistrationFailed => "RegistrationFailed",
        }
    }

    /// True for the three failure states
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            ModuleState::LoadFailed | ModuleState::VersionMismatch | ModuleState::RegistrationFailed
        )
    }

    /// True when no further transition is possible
    pub fn is_terminal(self) -> bool {
        self.is_failure() || self == ModuleState::Active
    }

    /// Whether `self → next` is an edge of the state machine
    pub fn can_transition(self, next: ModuleState) -> bool {
        use ModuleState::*;
        matches!(
            (self, next),
            (Unloaded, SymbolResolved)
                | (Unloaded, LoadFailed)
                | (SymbolResolved, VersionChecked)
                | (SymbolResolved, VersionMismatch)
                | (SymbolResolved, LoadFailed)
                | (VersionChecked, Registered)
                | (VersionChecked, RegistrationFailed)
                | (VersionChecked, LoadFailed)
                | (Registered, Active)
        )
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Record of one load attempt, kept for failures as well as successes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadAttempt {
    /// Path, module name or descriptor label that was loaded
    pub target: String,
    /// Module name, once the descriptor was read
    pub module: Option<String>,
    /// Every state visited, starting with `Unloaded`
    pub states: Vec<ModuleState>,
    /// Error message of a failed attempt
    pub error: Option<String>,
}

impl LoadAttempt {
    /// Final state of the attempt
    pub fn state(&self) -> ModuleState {
        self.states.last().copied().unwrap_or(ModuleState::Unloaded)
    }

    /// Whether the attempt passed through `state`
    pub fn visited(&self, state: ModuleState) -> bool {
        self.states.contains(&state)
    }

    /// First recorded step that is not an edge of the state machine
    pub fn illegal_transition(&self) -> Option<(ModuleState, ModuleState)> {
        self.states
            .windows(2)
            .map(|pair| (pair[0], pair[1]))
            .find(|(from, to)| !from.can_transition(*to))
    }
}

/// Drives one attempt through the state machine
#[derive(Debug)]
pub(crate) struct ModuleLoad {
    attempt: LoadAttempt,
}

impl ModuleLoad {
    pub(crate) fn new(target: &str) -> Self {
        Self {
            attempt: LoadAttempt {
                target: target.to_string(),
                module: None,
                states: vec![ModuleState::Unloaded],
                error: None,
            },
        }
    }

    pub(crate) fn state(&self) -> ModuleState {
        self.attempt.state()
    }

    pub(crate) fn set_module(&mut self, name: &str) {
        self.attempt.module = Some(name.to_string());
    }

    pub(crate) fn advance(&mut self, next: ModuleState) {
        let current = self.state();
        if !current.can_transition(next) {
            warn!(attempt = %self.attempt.target, from = %current, to = %next, "illegal module transition");
        }
        debug!(attempt = %self.attempt.target, from = %current, to = %next, "module state");
        self.attempt.states.push(next);
    }

    pub(crate) fn fail(mut self, next: ModuleState, error: &impl fmt::Display) -> LoadAttempt {
        self.advance(next);
        self.attempt.error = Some(error.to_string());
        self.attempt
    }

    pub(crate) fn finish(self) -> LoadAttempt {
        self.attempt
    }
}

/// An active module held by the VM
#[derive(Debug)]
pub(crate) struct LoadedModule {
    pub(crate) name: String,
    pub(crate) abi_version: AbiVersion,
    pub(crate) path: Option<String>,
    // Function pointers point into the library; it must outlive them.
    pub(crate) _library: Option<Library>,
}

/// Public view of an active module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Declared module name
    pub name: String,
    /// Declared ABI version
    pub abi_version: AbiVersion,
    /// Library path, `None` for in-process descriptors
    pub path: Option<String>,
    /// Current state
    pub state: ModuleState,
    /// Functions currently owned by this module, sorted
    pub functions: Vec<String>,
}
