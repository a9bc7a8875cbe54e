//! `NativeVm`: loads native modules and dispatches calls into them

use std::path::Path;

use datacode_abi::{abi_compatible, AbiVersion, ModuleDescriptor};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::VmConfig;
use crate::context::{self, HostContext, Registration};
use crate::error::{CallError, LoadError, RegistrationFailure};
use crate::loader::Library;
use crate::module::{LoadAttempt, LoadedModule, ModuleInfo, ModuleLoad, ModuleState};
use crate::registry::NativeRegistry;
use crate::resolver::ModuleResolver;
use crate::heap;
use crate::value::{lift, reclaim, ArgFrame, Value};

/// Host side of the native-module ABI.
///
/// Loading takes `&mut self`; calls take `&self`.
#[derive(Debug)]
pub struct NativeVm {
    config: VmConfig,
    resolver: ModuleResolver,
    registry: RwLock<NativeRegistry>,
    modules: Vec<LoadedModule>,
    attempts: Vec<LoadAttempt>,
}

impl Default for NativeVm {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeVm {
    /// VM with the default configuration
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// VM with `config`
    pub fn with_config(config: VmConfig) -> Self {
        let resolver = config.resolver();
        let registry = NativeRegistry::new(config.collision_policy);
        Self {
            config,
            resolver,
            registry: RwLock::new(registry),
            modules: Vec::new(),
            attempts: Vec::new(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// ABI version this VM implements
    pub fn abi_version(&self) -> AbiVersion {
        self.config.abi_version()
    }

    /// Library resolver built from the configuration
    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    /// Discover module `name` on the search path and load it
    pub fn load(&mut self, name: &str) -> Result<ModuleInfo, LoadError> {
        self.run_load(name, |vm, load| {
            let path = vm.resolver.resolve(name)?;
            debug!(module = name, path = %path.display(), "module resolved");
            vm.open_library(load, &path)
        })
    }

    /// Load the shared library at `path`
    pub fn load_path(&mut self, path: impl AsRef<Path>) -> Result<ModuleInfo, LoadError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        self.run_load(&label, |vm, load| vm.open_library(load, path))
    }

    /// Load a module linked into the current process
    pub fn load_descriptor(
        &mut self,
        descriptor: &'static ModuleDescriptor,
    ) -> Result<ModuleInfo, LoadError> {
        let label = format!("descriptor@{:p}", descriptor);
        self.run_load(&label, |vm, load| {
            load.advance(ModuleState::SymbolResolved);
            unsafe { vm.activate(load, descriptor, None, &label) }
        })
    }

    fn run_load<F>(&mut self, target: &str, f: F) -> Result<ModuleInfo, LoadError>
    where
        F: FnOnce(&mut Self, &mut ModuleLoad) -> Result<ModuleInfo, LoadError>,
    {
        let mut load = ModuleLoad::new(target);
        match f(self, &mut load) {
            Ok(info) => {
                self.attempts.push(load.finish());
                Ok(info)
            }
            Err(err) => {
                warn!(module = target, state = %err.state(), error = %err, "module load failed");
                self.attempts.push(load.fail(err.state(), &err));
                Err(err)
            }
        }
    }

    fn open_library(&mut self, load: &mut ModuleLoad, path: &Path) -> Result<ModuleInfo, LoadError> {
        let library = Library::open(path)?;
        let descriptor = library.descriptor()?;
        load.advance(ModuleState::SymbolResolved);
        let label = library.path().to_string();
        unsafe { self.activate(load, descriptor, Some(library), &label) }
    }

    /// Version check, registration and publication.
    ///
    /// # Safety
    /// A non-null `descriptor` must stay valid while `library` is loaded.
    unsafe fn activate(
        &mut self,
        load: &mut ModuleLoad,
        descriptor: *const ModuleDescriptor,
        library: Option<Library>,
        label: &str,
    ) -> Result<ModuleInfo, LoadError> {
        let invalid = |reason: &str| LoadError::InvalidDescriptor {
            module: label.to_string(),
            reason: reason.to_string(),
        };
        if descriptor.is_null() {
            return Err(invalid("entry point returned a null descriptor"));
        }

        // Only the version is read before the check; the rest of the layout
        // depends on it.
        let found = std::ptr::addr_of!((*descriptor).abi_version).read();
        let expected = self.abi_version();
        if !abi_compatible(expected, found) {
            return Err(LoadError::VersionMismatch {
                module: label.to_string(),
                expected,
                found,
            });
        }
        load.advance(ModuleState::VersionChecked);

        let descriptor = &*descriptor;
        let name = descriptor
            .name()
            .ok_or_else(|| invalid("null module name"))?
            .to_str()
            .map_err(|_| invalid("module name is not valid UTF-8"))?;
        if name.is_empty() {
            return Err(invalid("empty module name"));
        }
        load.set_module(name);
        let register_fn = descriptor
            .register_fn
            .ok_or_else(|| invalid("null register_fn"))?;
        if self.modules.iter().any(|m| m.name == name) {
            return Err(LoadError::DuplicateModule(name.to_string()));
        }

        let registration_failed = |reason: RegistrationFailure| LoadError::RegistrationFailed {
            module: name.to_string(),
            reason,
        };

        let mut registration = Registration::new(name);
        let mut host = HostContext::for_registration(&mut registration);
        context::begin_native();
        register_fn(host.as_abi());
        let failure = context::take_failure();
        drop(host);
        registration.close();

        if let Some(failure) = failure {
            return Err(registration_failed(RegistrationFailure::Thrown {
                code: failure.code,
                message: failure.message,
            }));
        }
        if !registration.problems().is_empty() {
            return Err(registration_failed(RegistrationFailure::Invalid(
                registration.problems().to_vec(),
            )));
        }

        let staged = registration.into_staged();
        let mut registry = self.registry.write();
        registry.check(name, &staged).map_err(registration_failed)?;
        load.advance(ModuleState::Registered);
        registry.publish(name, staged);
        let functions = registry.functions_of(name);
        drop(registry);
        load.advance(ModuleState::Active);

        info!(module = name, version = %found, functions = functions.len(), "native module active");
        let path = library.as_ref().map(|l| l.path().to_string());
        self.modules.push(LoadedModule {
            name: name.to_string(),
            abi_version: found,
            path: path.clone(),
            _library: library,
        });
        Ok(ModuleInfo {
            name: name.to_string(),
            abi_version: found,
            path,
            state: ModuleState::Active,
            functions,
        })
    }

    /// Call the native function registered as `name`.
    ///
    /// A function that calls `throw_error` fails with that code; whatever it
    /// returned is ignored. Strings and arrays the function allocated during
    /// this call and returned are owned by the VM afterwards and released.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, CallError> {
        let func = self
            .registry
            .read()
            .get(name)
            .map(|f| f.func)
            .ok_or_else(|| CallError::UnknownFunction(name.to_string()))?;

        let frame = ArgFrame::lower(args).map_err(|source| CallError::Arguments {
            function: name.to_string(),
            source,
        })?;

        let mut host = HostContext::for_call();
        context::begin_native();
        heap::open_call();
        let raw = func(host.as_abi(), frame.as_ptr(), frame.len());
        let blocks = heap::close_call();
        if let Some(failure) = context::take_failure() {
            let released = reclaim(&raw, &blocks);
            debug!(function = name, code = %failure.code, message = %failure.message, released, "native call failed");
            return Err(CallError::Native {
                function: name.to_string(),
                code: failure.code,
                message: failure.message,
            });
        }

        // The frame is still alive: a module may return one of its arguments.
        let result = unsafe { lift(raw) };
        reclaim(&raw, &blocks);
        result.map_err(|source| CallError::InvalidReturn {
            function: name.to_string(),
            source,
        })
    }

    /// Check if a function is callable
    pub fn has_function(&self, name: &str) -> bool {
        self.registry.read().contains(name)
    }

    /// Names of all callable functions, sorted
    pub fn functions(&self) -> Vec<String> {
        self.registry.read().names()
    }

    /// Active modules in load order
    pub fn modules(&self) -> Vec<ModuleInfo> {
        let registry = self.registry.read();
        self.modules
            .iter()
            .map(|m| ModuleInfo {
                name: m.name.clone(),
                abi_version: m.abi_version,
                path: m.path.clone(),
                state: ModuleState::Active,
                functions: registry.functions_of(&m.name),
            })
            .collect()
    }

    /// Active module named `name`
    pub fn module(&self, name: &str) -> Option<ModuleInfo> {
        self.modules().into_iter().find(|m| m.name == name)
    }

    /// State of the module named `name`.
    ///
    /// Active modules report `Active`; otherwise the final state of the most
    /// recent attempt whose module name or target matches.
    pub fn module_state(&self, name: &str) -> Option<ModuleState> {
        if self.modules.iter().any(|m| m.name == name) {
            return Some(ModuleState::Active);
        }
        self.attempts
            .iter()
            .rev()
            .find(|a| a.module.as_deref() == Some(name) || a.target == name)
            .map(LoadAttempt::state)
    }

    /// Every load attempt, in order
    pub fn attempts(&self) -> &[LoadAttempt] {
        &self.attempts
    }
}
