//! Shared fixtures: registries, loaders and a recording health reporter.

use std::ffi::OsString;
use std::fs;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use mockall::mock;
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use mxbridge_config::{AccessDirective, AccessOverride, AccessPolicy, Config};

use crate::backend::{
    AttributeInfo, BackendError, BackendRegistry, InMemoryRegistry, MemoryObject,
    ObjectDescriptor, OperationInfo, ParameterInfo,
};
use crate::bootstrap::{BootstrapError, ConfigLoader};
use crate::dispatch::{Dispatcher, Request};
use crate::health::HealthReporter;
use crate::history::Clock;
use crate::object_name::ObjectName;
use crate::restrictor::PolicyRestrictor;
use crate::value::RawValue;

mock! {
    pub Probe {}
    impl RegistryProbe for Probe {
        fn list_objects(&self, pattern: &ObjectName) -> Result<Vec<ObjectDescriptor>, BackendError>;
        fn get_attribute(&self, name: &ObjectName, attribute: &str) -> Result<RawValue, BackendError>;
        fn set_attribute(
            &self,
            name: &ObjectName,
            attribute: &str,
            value: RawValue,
        ) -> Result<RawValue, BackendError>;
        fn invoke(
            &self,
            name: &ObjectName,
            operation: &OperationInfo,
            arguments: Vec<RawValue>,
        ) -> Result<RawValue, BackendError>;
    }
}

/// Registry calls observed by [`SpyRegistry`].
pub trait RegistryProbe: Send + Sync {
    fn list_objects(&self, pattern: &ObjectName) -> Result<Vec<ObjectDescriptor>, BackendError>;
    fn get_attribute(&self, name: &ObjectName, attribute: &str) -> Result<RawValue, BackendError>;
    fn set_attribute(
        &self,
        name: &ObjectName,
        attribute: &str,
        value: RawValue,
    ) -> Result<RawValue, BackendError>;
    fn invoke(
        &self,
        name: &ObjectName,
        operation: &OperationInfo,
        arguments: Vec<RawValue>,
    ) -> Result<RawValue, BackendError>;
}

/// Backend forwarding every call to a mock so tests can count them.
pub struct SpyRegistry {
    label: String,
    accepts: bool,
    probe: MockProbe,
}

impl SpyRegistry {
    pub fn new(label: &str, probe: MockProbe) -> Self {
        Self {
            label: label.to_owned(),
            accepts: true,
            probe,
        }
    }

    /// Spy declining every request through `can_handle`.
    pub fn declining(label: &str, probe: MockProbe) -> Self {
        Self {
            accepts: false,
            ..Self::new(label, probe)
        }
    }

    /// Spy whose every call fails the test.
    pub fn untouchable(label: &str) -> Self {
        Self::new(label, untouched_probe())
    }

    /// Spy whose listing always fails.
    pub fn broken(label: &str) -> Self {
        let mut probe = MockProbe::new();
        probe
            .expect_list_objects()
            .returning(|_| Err(BackendError::failure("connection reset")));
        Self::new(label, probe)
    }
}

impl BackendRegistry for SpyRegistry {
    fn label(&self) -> &str {
        &self.label
    }

    fn can_handle(&self, _request: &Request) -> bool {
        self.accepts
    }

    fn list_objects(&self, pattern: &ObjectName) -> Result<Vec<ObjectDescriptor>, BackendError> {
        self.probe.list_objects(pattern)
    }

    fn get_attribute(&self, name: &ObjectName, attribute: &str) -> Result<RawValue, BackendError> {
        self.probe.get_attribute(name, attribute)
    }

    fn set_attribute(
        &self,
        name: &ObjectName,
        attribute: &str,
        value: RawValue,
    ) -> Result<RawValue, BackendError> {
        self.probe.set_attribute(name, attribute, value)
    }

    fn invoke(
        &self,
        name: &ObjectName,
        operation: &OperationInfo,
        arguments: Vec<RawValue>,
    ) -> Result<RawValue, BackendError> {
        self.probe.invoke(name, operation, arguments)
    }
}

/// Probe expecting no calls at all.
pub fn untouched_probe() -> MockProbe {
    let mut probe = MockProbe::new();
    probe.expect_list_objects().never();
    probe.expect_get_attribute().never();
    probe.expect_set_attribute().never();
    probe.expect_invoke().never();
    probe
}

/// Clock advancing one millisecond per reading.
#[derive(Debug)]
pub struct SteppingClock(AtomicI64);

impl SteppingClock {
    pub fn starting_at(millis: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(millis)))
    }
}

impl Clock for SteppingClock {
    fn now_millis(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

pub fn name(text: &str) -> ObjectName {
    ObjectName::parse(text).expect("valid object name")
}

/// `domain:type=Foo` with a map attribute `bar` and a writable counter.
pub fn foo_object() -> MemoryObject {
    MemoryObject::new(name("domain:type=Foo"))
        .with_attribute(
            AttributeInfo::read_only("bar", "java.util.Map"),
            RawValue::map([("baz", RawValue::Int(42)), ("qux", RawValue::Int(7))]),
        )
        .with_attribute(AttributeInfo::read_write("count", "int"), RawValue::Int(1))
        .with_attribute(AttributeInfo::read_write("secret", "java.lang.String"), "hunter2")
}

/// `app:type=Calc` exposing two `add` overloads.
pub fn calculator_object() -> MemoryObject {
    MemoryObject::new(name("app:type=Calc"))
        .with_operation(
            OperationInfo::new("add", "int")
                .with_parameter(ParameterInfo::new("a", "int"))
                .with_parameter(ParameterInfo::new("b", "int")),
            |arguments| match arguments.as_slice() {
                [RawValue::Int(a), RawValue::Int(b)] => Ok(RawValue::Int(a + b)),
                _ => Err(BackendError::rejected("add expects two ints")),
            },
        )
        .with_operation(
            OperationInfo::new("add", "java.lang.String")
                .with_parameter(ParameterInfo::new("a", "java.lang.String"))
                .with_parameter(ParameterInfo::new("b", "java.lang.String")),
            |arguments| match arguments.as_slice() {
                [RawValue::String(a), RawValue::String(b)] => Ok(RawValue::String(format!("{a}{b}"))),
                _ => Err(BackendError::rejected("add expects two strings")),
            },
        )
}

pub fn registry(label: &str, objects: Vec<MemoryObject>) -> Arc<dyn BackendRegistry> {
    let registry = InMemoryRegistry::new(label);
    for object in objects {
        registry.register(object).expect("register object");
    }
    Arc::new(registry)
}

pub fn dispatcher(backends: Vec<Arc<dyn BackendRegistry>>) -> Dispatcher {
    Dispatcher::builder().backends(backends).build()
}

pub fn policy(rules: &[(&str, &str, Option<&str>, AccessOverride)]) -> Arc<PolicyRestrictor> {
    let directives: Vec<AccessDirective> = rules
        .iter()
        .map(|(kind, object, member, directive)| {
            AccessDirective::new(*kind, *object, member.map(str::to_owned), *directive)
        })
        .collect();
    let restrictor = PolicyRestrictor::from_policy(&AccessPolicy::from_directives(&directives))
        .expect("policy compiles");
    Arc::new(restrictor)
}

/// Loader that fails by pointing at a malformed configuration file.
pub struct FailingConfigLoader {
    dir: TempDir,
}

impl FailingConfigLoader {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        fs::write(dir.path().join("mxbridge.toml"), "max_depth = \"deep\"\n")
            .expect("write configuration file");
        Self { dir }
    }
}

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter(vec![
            OsString::from("mxbridge"),
            OsString::from("--config-path"),
            self.dir.path().join("mxbridge.toml").into_os_string(),
        ])
    }
}

/// Records health events for assertions.
#[derive(Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config, backends: usize) {
        self.record(HealthEvent::BootstrapSucceeded { backends });
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }
}

/// Lifecycle events captured by [`RecordingHealthReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded { backends: usize },
    BootstrapFailed(String),
}
