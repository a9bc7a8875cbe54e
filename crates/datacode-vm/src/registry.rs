//! Native function registry
//!
//! The shared namespace of callable native functions. Modules stage their
//! functions during registration and publish them here in one step, so a
//! module either contributes all of its functions or none.

use datacode_abi::NativeFn;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RegistrationFailure;

/// What happens when a module registers a name another module already owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// The later module fails to load
    #[default]
    Reject,
    /// The later module takes the name over
    Replace,
}

/// A published native function
#[derive(Debug, Clone)]
pub struct RegisteredFn {
    /// Owning module
    pub module: String,
    /// Entry point
    pub func: NativeFn,
}

/// Name → function table shared by every active module
#[derive(Debug, Default)]
pub struct NativeRegistry {
    policy: CollisionPolicy,
    functions: FxHashMap<String, RegisteredFn>,
}

impl NativeRegistry {
    /// Create an empty registry
    pub fn new(policy: CollisionPolicy) -> Self {
        Self {
            policy,
            functions: FxHashMap::default(),
        }
    }

    /// Active collision policy
    pub fn policy(&self) -> CollisionPolicy {
        self.policy
    }

    /// Check `staged` against the table without modifying it
    pub fn check(&self, module: &str, staged: &[(String, NativeFn)]) -> Result<(), RegistrationFailure> {
        if self.policy == CollisionPolicy::Replace {
            return Ok(());
        }
        for (name, _) in staged {
            if let Some(existing) = self.functions.get(name) {
                if existing.module != module {
                    return Err(RegistrationFailure::Collision {
                        name: name.clone(),
                        owner: existing.module.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Insert every staged function of `module`, replacing existing owners.
    ///
    /// Callers run [`NativeRegistry::check`] first; under `Reject` it is the
    /// check that enforces the policy.
    pub fn publish(&mut self, module: &str, staged: Vec<(String, NativeFn)>) {
        for (name, func) in staged {
            let previous = self.functions.insert(
                name.clone(),
                RegisteredFn {
                    module: module.to_string(),
                    func,
                },
            );
            if let Some(previous) = previous {
                debug!(function = %name, from = %previous.module, to = module, "native function replaced");
            }
        }
    }

    /// Get a function by name
    pub fn get(&self, name: &str) -> Option<&RegisteredFn> {
        self.functions.get(name)
    }

    /// Check if a function is registered
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// All function names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Names currently owned by `module`, sorted
    pub fn functions_of(&self, module: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .functions
            .iter()
            .filter(|(_, f)| f.module == module)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Get the number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
