//! Startup service registry.
//!
//! # Responsibility
//! - Hold a fixed set of named model instances declared up front.
//! - Construct every entry once, dependencies first, on the first lookup.
//! - Expose a monotonic readiness flag for consumers gated on startup.
//!
//! # Invariants
//! - An instance is constructed at most once per registry.
//! - Dependency cycles and dangling dependency names are rejected before any
//!   constructor runs.
//! - Constructors may only read the dependencies they declared.
//! - `is_ready` never reverts to `false`.

use crate::store::KeyedStore;
use log::{error, info};
use once_cell::unsync::OnceCell;
use std::any::{type_name, Any};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;
use std::time::Instant;

pub mod app;

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Registration, wiring and lookup errors.
///
/// Every variant except `UnknownService` and `TypeMismatch` indicates a
/// wiring defect and is fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    InvalidServiceName(String),
    DuplicateServiceName(String),
    /// Registration attempted after the first build started.
    RegistrationClosed(String),
    UnknownService(String),
    MissingDependency {
        service: String,
        dependency: String,
    },
    /// Dependency path that loops back to its first element.
    CircularDependency(Vec<String>),
    /// Constructor read a service it did not declare.
    UndeclaredDependency {
        service: String,
        dependency: String,
    },
    TypeMismatch {
        service: String,
        expected: &'static str,
    },
    /// A constructor re-entered the registry while it was building.
    BuildInProgress(String),
    Construction {
        service: String,
        message: String,
    },
    AlreadyInstalled,
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidServiceName(name) => write!(f, "service name is invalid: `{name}`"),
            Self::DuplicateServiceName(name) => {
                write!(f, "service name already registered: {name}")
            }
            Self::RegistrationClosed(name) => {
                write!(f, "registry already built; cannot register {name}")
            }
            Self::UnknownService(name) => write!(f, "service not registered: {name}"),
            Self::MissingDependency {
                service,
                dependency,
            } => write!(f, "service {service} depends on unregistered {dependency}"),
            Self::CircularDependency(path) => {
                write!(f, "circular service dependency: {}", path.join(" -> "))
            }
            Self::UndeclaredDependency {
                service,
                dependency,
            } => write!(
                f,
                "service {service} read {dependency} without declaring it as a dependency"
            ),
            Self::TypeMismatch { service, expected } => {
                write!(f, "service {service} is not a {expected}")
            }
            Self::BuildInProgress(name) => {
                write!(f, "registry lookup of {name} re-entered an ongoing build")
            }
            Self::Construction { service, message } => {
                write!(f, "failed to construct service {service}: {message}")
            }
            Self::AlreadyInstalled => write!(f, "global service registry already installed"),
        }
    }
}

impl Error for RegistryError {}

type Constructor = Box<dyn Fn(&ServiceContext<'_>) -> RegistryResult<Rc<dyn Any>>>;

struct ServiceEntry {
    name: String,
    dependencies: Vec<String>,
    constructor: Constructor,
}

/// View handed to a constructor: its declared dependencies plus the store.
pub struct ServiceContext<'a> {
    service: &'a str,
    dependencies: &'a [String],
    instances: &'a BTreeMap<String, Rc<dyn Any>>,
    store: &'a Rc<dyn KeyedStore>,
}

impl ServiceContext<'_> {
    /// Shared keyed store every model persists through.
    pub fn store(&self) -> Rc<dyn KeyedStore> {
        Rc::clone(self.store)
    }

    /// Returns one fully constructed, declared dependency.
    pub fn dependency<T: 'static>(&self, name: &str) -> RegistryResult<Rc<RefCell<T>>> {
        if !self.dependencies.iter().any(|declared| declared == name) {
            return Err(RegistryError::UndeclaredDependency {
                service: self.service.to_string(),
                dependency: name.to_string(),
            });
        }
        let instance = self
            .instances
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownService(name.to_string()))?;
        downcast(name, instance)
    }
}

/// Named, lazily built, dependency-ordered model instances.
pub struct ServiceRegistry {
    store: Rc<dyn KeyedStore>,
    entries: Vec<ServiceEntry>,
    instances: RefCell<BTreeMap<String, Rc<dyn Any>>>,
    sealed: Cell<bool>,
    building: Cell<bool>,
    ready: Cell<bool>,
}

impl ServiceRegistry {
    pub fn new(store: Rc<dyn KeyedStore>) -> Self {
        Self {
            store,
            entries: Vec::new(),
            instances: RefCell::new(BTreeMap::new()),
            sealed: Cell::new(false),
            building: Cell::new(false),
            ready: Cell::new(false),
        }
    }

    /// Declares one model with its static dependency list.
    ///
    /// The constructor runs at most once, after every dependency is built.
    pub fn register_model<T: 'static>(
        &mut self,
        name: &str,
        dependencies: &[&str],
        constructor: impl Fn(&ServiceContext<'_>) -> RegistryResult<T> + 'static,
    ) -> RegistryResult<()> {
        let name = name.trim();
        if !is_valid_service_name(name) {
            return Err(RegistryError::InvalidServiceName(name.to_string()));
        }
        if self.sealed.get() {
            return Err(RegistryError::RegistrationClosed(name.to_string()));
        }
        if self.entry(name).is_some() {
            return Err(RegistryError::DuplicateServiceName(name.to_string()));
        }

        let constructor: Constructor = Box::new(move |ctx: &ServiceContext<'_>| {
            constructor(ctx).map(|model| Rc::new(RefCell::new(model)) as Rc<dyn Any>)
        });
        self.entries.push(ServiceEntry {
            name: name.to_string(),
            dependencies: dependencies.iter().map(|dep| dep.trim().to_string()).collect(),
            constructor,
        });
        Ok(())
    }

    /// Declared names in registration order.
    pub fn service_names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    /// Deterministic construction order: registration order, dependencies
    /// first.
    ///
    /// # Errors
    /// - `MissingDependency` for a dependency name that was never registered.
    /// - `CircularDependency` with the offending path.
    pub fn construction_order(&self) -> RegistryResult<Vec<String>> {
        let mut order = Vec::with_capacity(self.entries.len());
        let mut done = BTreeSet::new();
        let mut path = Vec::new();
        for entry in &self.entries {
            self.visit(entry, &mut path, &mut done, &mut order)?;
        }
        Ok(order)
    }

    /// Builds every declared entry that is not built yet.
    ///
    /// Called implicitly by the first lookup; safe to call repeatedly.
    pub fn initialize(&self) -> RegistryResult<()> {
        if self.ready.get() {
            return Ok(());
        }
        if self.building.get() {
            return Err(RegistryError::BuildInProgress(String::new()));
        }
        self.sealed.set(true);

        let order = match self.construction_order() {
            Ok(order) => order,
            Err(err) => {
                error!("event=registry_build module=registry status=error error={err}");
                return Err(err);
            }
        };

        let started_at = Instant::now();
        info!(
            "event=registry_build module=registry status=start services={}",
            order.len()
        );
        self.building.set(true);
        let result = self.build_in_order(&order);
        self.building.set(false);

        match result {
            Ok(()) => {
                self.ready.set(true);
                info!(
                    "event=registry_build module=registry status=ok services={} duration_ms={}",
                    order.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=registry_build module=registry status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Returns the shared instance for `name`, building the registry first
    /// if needed.
    pub fn get_service(&self, name: &str) -> RegistryResult<Rc<dyn Any>> {
        let name = name.trim();
        if self.entry(name).is_none() {
            return Err(RegistryError::UnknownService(name.to_string()));
        }
        if self.building.get() {
            return Err(RegistryError::BuildInProgress(name.to_string()));
        }
        self.initialize()?;
        self.instances
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownService(name.to_string()))
    }

    /// Typed variant of [`Self::get_service`].
    pub fn get_model<T: 'static>(&self, name: &str) -> RegistryResult<Rc<RefCell<T>>> {
        let instance = self.get_service(name)?;
        downcast(name.trim(), instance)
    }

    /// Returns an already-built instance without triggering construction.
    pub fn peek<T: 'static>(&self, name: &str) -> Option<Rc<RefCell<T>>> {
        let instance = self.instances.borrow().get(name.trim()).cloned()?;
        downcast(name, instance).ok()
    }

    /// True once every declared entry has been constructed.
    pub fn is_ready(&self) -> bool {
        self.ready.get()
    }

    /// Runs `read` when ready, otherwise returns `fallback` without building.
    pub fn when_ready<R>(&self, read: impl FnOnce(&Self) -> R, fallback: R) -> R {
        if self.is_ready() {
            read(self)
        } else {
            fallback
        }
    }

    fn entry(&self, name: &str) -> Option<&ServiceEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    fn visit(
        &self,
        entry: &ServiceEntry,
        path: &mut Vec<String>,
        done: &mut BTreeSet<String>,
        order: &mut Vec<String>,
    ) -> RegistryResult<()> {
        if done.contains(&entry.name) {
            return Ok(());
        }
        if let Some(start) = path.iter().position(|name| *name == entry.name) {
            let mut cycle = path[start..].to_vec();
            cycle.push(entry.name.clone());
            return Err(RegistryError::CircularDependency(cycle));
        }

        path.push(entry.name.clone());
        for dependency in &entry.dependencies {
            let Some(dependency_entry) = self.entry(dependency) else {
                return Err(RegistryError::MissingDependency {
                    service: entry.name.clone(),
                    dependency: dependency.clone(),
                });
            };
            self.visit(dependency_entry, path, done, order)?;
        }
        path.pop();

        done.insert(entry.name.clone());
        order.push(entry.name.clone());
        Ok(())
    }

    fn build_in_order(&self, order: &[String]) -> RegistryResult<()> {
        for name in order {
            if self.instances.borrow().contains_key(name) {
                continue;
            }
            let entry = self
                .entry(name)
                .ok_or_else(|| RegistryError::UnknownService(name.clone()))?;

            let started_at = Instant::now();
            let instance = {
                let instances = self.instances.borrow();
                let ctx = ServiceContext {
                    service: &entry.name,
                    dependencies: &entry.dependencies,
                    instances: &instances,
                    store: &self.store,
                };
                (entry.constructor)(&ctx)?
            };
            self.instances.borrow_mut().insert(name.clone(), instance);
            info!(
                "event=service_construct module=registry status=ok service={} duration_ms={}",
                name,
                started_at.elapsed().as_millis()
            );
        }
        Ok(())
    }
}

impl Debug for ServiceRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.service_names())
            .field("ready", &self.ready.get())
            .finish()
    }
}

fn downcast<T: 'static>(name: &str, instance: Rc<dyn Any>) -> RegistryResult<Rc<RefCell<T>>> {
    instance
        .downcast::<RefCell<T>>()
        .map_err(|_| RegistryError::TypeMismatch {
            service: name.to_string(),
            expected: type_name::<T>(),
        })
}

fn is_valid_service_name(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

thread_local! {
    static GLOBAL_REGISTRY: OnceCell<Rc<ServiceRegistry>> = OnceCell::new();
}

/// Installs the registry for the current (UI) thread.
///
/// # Errors
/// - `AlreadyInstalled` when a registry was installed before.
pub fn install_global(registry: ServiceRegistry) -> RegistryResult<Rc<ServiceRegistry>> {
    GLOBAL_REGISTRY.with(|cell| {
        let registry = Rc::new(registry);
        cell.set(Rc::clone(&registry))
            .map_err(|_| RegistryError::AlreadyInstalled)?;
        Ok(registry)
    })
}

/// Returns the registry installed on the current thread, if any.
pub fn global() -> Option<Rc<ServiceRegistry>> {
    GLOBAL_REGISTRY.with(|cell| cell.get().cloned())
}

#[cfg(test)]
mod tests {
    use super::{global, install_global, RegistryError, ServiceRegistry};
    use crate::store::MemoryKeyedStore;
    use std::cell::Cell;
    use std::rc::Rc;

    fn registry() -> ServiceRegistry {
        ServiceRegistry::new(Rc::new(MemoryKeyedStore::new()))
    }

    #[test]
    fn rejects_invalid_and_duplicate_names() {
        let mut registry = registry();
        let invalid = registry.register_model("Bad Name", &[], |_| Ok(1_u32));
        assert!(matches!(
            invalid,
            Err(RegistryError::InvalidServiceName(_))
        ));
        let blank = registry.register_model("   ", &[], |_| Ok(1_u32));
        assert!(matches!(blank, Err(RegistryError::InvalidServiceName(_))));

        registry
            .register_model("counter", &[], |_| Ok(1_u32))
            .expect("first registration");
        let duplicate = registry.register_model(" counter ", &[], |_| Ok(2_u32));
        assert!(matches!(
            duplicate,
            Err(RegistryError::DuplicateServiceName(_))
        ));
    }

    #[test]
    fn construction_order_puts_dependencies_first() {
        let mut registry = registry();
        registry
            .register_model("c", &["b"], |_| Ok(()))
            .expect("register c");
        registry
            .register_model("a", &[], |_| Ok(()))
            .expect("register a");
        registry
            .register_model("b", &["a"], |_| Ok(()))
            .expect("register b");

        let order = registry.construction_order().expect("acyclic");
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn cycle_is_reported_with_path_before_any_constructor_runs() {
        let calls = Rc::new(Cell::new(0));
        let mut registry = registry();
        for (name, dep) in [("x", "y"), ("y", "z"), ("z", "x")] {
            let calls = calls.clone();
            registry
                .register_model(name, &[dep], move |_| {
                    calls.set(calls.get() + 1);
                    Ok(())
                })
                .expect("register");
        }

        let err = registry.initialize().expect_err("cycle must fail");
        assert_eq!(
            err,
            RegistryError::CircularDependency(vec![
                "x".to_string(),
                "y".to_string(),
                "z".to_string(),
                "x".to_string()
            ])
        );
        assert_eq!(calls.get(), 0);
        assert!(!registry.is_ready());
    }

    #[test]
    fn missing_dependency_is_fatal() {
        let mut registry = registry();
        registry
            .register_model("workspace", &["settings"], |_| Ok(()))
            .expect("register");
        let err = registry
            .get_model::<()>("workspace")
            .err()
            .expect("missing dependency must fail");
        assert!(matches!(err, RegistryError::MissingDependency { .. }));
    }

    #[test]
    fn undeclared_dependency_read_is_rejected() {
        let mut registry = registry();
        registry
            .register_model("settings", &[], |_| Ok(true))
            .expect("register settings");
        registry
            .register_model("sneaky", &[], |ctx| {
                let flag = ctx.dependency::<bool>("settings")?;
                let value = *flag.borrow();
                Ok(value)
            })
            .expect("register sneaky");

        let err = registry.initialize().expect_err("undeclared read must fail");
        assert!(matches!(err, RegistryError::UndeclaredDependency { .. }));
    }

    #[test]
    fn registration_closes_after_first_build() {
        let mut registry = registry();
        registry
            .register_model("a", &[], |_| Ok(()))
            .expect("register a");
        registry.initialize().expect("build");
        let late = registry.register_model("b", &[], |_| Ok(()));
        assert!(matches!(late, Err(RegistryError::RegistrationClosed(_))));
    }

    #[test]
    fn wrong_type_lookup_is_type_mismatch() {
        let mut registry = registry();
        registry
            .register_model("counter", &[], |_| Ok(5_u32))
            .expect("register");
        let err = registry
            .get_model::<String>("counter")
            .err()
            .expect("type mismatch");
        assert!(matches!(err, RegistryError::TypeMismatch { .. }));
        let counter = registry.get_model::<u32>("counter").expect("typed lookup");
        assert_eq!(*counter.borrow(), 5);
    }

    #[test]
    fn unknown_service_does_not_build() {
        let registry = registry();
        let err = registry.get_service("nope").err().expect("unknown");
        assert_eq!(err, RegistryError::UnknownService("nope".to_string()));
        assert!(!registry.is_ready());
    }

    #[test]
    fn when_ready_returns_fallback_before_build() {
        let mut registry = registry();
        registry
            .register_model("a", &[], |_| Ok(7_u32))
            .expect("register");
        assert_eq!(registry.when_ready(|_| 1, 0), 0);
        assert!(registry.peek::<u32>("a").is_none());

        registry.initialize().expect("build");
        assert_eq!(registry.when_ready(|_| 1, 0), 1);
        assert!(registry.peek::<u32>("a").is_some());
    }

    #[test]
    fn global_registry_installs_once_per_thread() {
        std::thread::spawn(|| {
            assert!(global().is_none());
            let installed = install_global(registry()).expect("first install");
            let again = install_global(registry()).err().expect("second install");
            assert_eq!(again, RegistryError::AlreadyInstalled);
            let current = global().expect("installed registry");
            assert!(Rc::ptr_eq(&installed, &current));
        })
        .join()
        .expect("install thread");
    }
}
