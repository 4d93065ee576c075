//! Behavioural tests for request dispatch.

use std::cell::RefCell;
use std::str::FromStr;
use std::sync::Arc;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;

use mxbridge_config::{AccessDirective, AccessPolicy};

use crate::backend::{AttributeInfo, BackendRegistry, InMemoryRegistry, MemoryObject};
use crate::dispatch::{AgentError, Dispatcher, Request};
use crate::history::{HistoryEntry, HistoryKey, HistoryStore};
use crate::object_name::ObjectName;
use crate::restrictor::PolicyRestrictor;
use crate::value::RawValue;

use super::support::SteppingClock;

type StepResult = Result<(), String>;

/// Scenario state shared across steps.
struct DispatchWorld {
    backends: Vec<Arc<InMemoryRegistry>>,
    rules: Vec<AccessDirective>,
    history: Arc<HistoryStore>,
    outcome: Option<Result<Value, AgentError>>,
    inspected: Vec<HistoryEntry>,
}

impl DispatchWorld {
    fn new() -> Self {
        Self {
            backends: Vec::new(),
            rules: Vec::new(),
            history: Arc::new(HistoryStore::with_clock(
                10,
                SteppingClock::starting_at(1_700_000_000_000),
            )),
            outcome: None,
            inspected: Vec::new(),
        }
    }

    fn backend(&mut self, label: &str) -> Arc<InMemoryRegistry> {
        if let Some(existing) = self.backends.iter().find(|backend| backend.label() == label) {
            return Arc::clone(existing);
        }
        let created = Arc::new(InMemoryRegistry::new(label));
        self.backends.push(Arc::clone(&created));
        created
    }

    fn dispatch(&mut self, request: &Request) -> StepResult {
        let restrictor = PolicyRestrictor::from_policy(&AccessPolicy::from_directives(&self.rules))
            .map_err(|error| error.to_string())?;
        let dispatcher = Dispatcher::builder()
            .backends(
                self.backends
                    .iter()
                    .map(|backend| Arc::clone(backend) as Arc<dyn BackendRegistry>),
            )
            .restrictor(Arc::new(restrictor))
            .history(Arc::clone(&self.history))
            .build();
        self.outcome = Some(dispatcher.handle(request));
        Ok(())
    }

    fn outcome(&self) -> Result<&Result<Value, AgentError>, String> {
        self.outcome
            .as_ref()
            .ok_or_else(|| "no request was dispatched".to_owned())
    }
}

fn parse_name(text: &str) -> Result<ObjectName, String> {
    ObjectName::parse(text).map_err(|error| error.to_string())
}

fn parse_json(text: &str) -> Result<Value, String> {
    serde_json::from_str(text).map_err(|error| format!("invalid JSON '{text}': {error}"))
}

#[fixture]
fn world() -> RefCell<DispatchWorld> {
    RefCell::new(DispatchWorld::new())
}

#[given("backend {label} exposes {object} with attribute {attribute} holding {value}")]
fn given_attribute_value(
    world: &RefCell<DispatchWorld>,
    label: String,
    object: String,
    attribute: String,
    value: String,
) -> StepResult {
    let raw = RawValue::from_json(&parse_json(&value)?);
    let registered = MemoryObject::new(parse_name(&object)?)
        .with_attribute(AttributeInfo::read_only(attribute, "java.util.Map"), raw);
    world
        .borrow_mut()
        .backend(&label)
        .register(registered)
        .map_err(|error| error.to_string())
}

#[given("backend {label} exposes {object} with readable attribute {attribute}")]
fn given_readable_attribute(
    world: &RefCell<DispatchWorld>,
    label: String,
    object: String,
    attribute: String,
) -> StepResult {
    let registered = MemoryObject::new(parse_name(&object)?)
        .with_attribute(AttributeInfo::read_only(attribute, "int"), RawValue::Int(0));
    world
        .borrow_mut()
        .backend(&label)
        .register(registered)
        .map_err(|error| error.to_string())
}

#[given("backend {label} exposes {object} without members")]
fn given_empty_object(world: &RefCell<DispatchWorld>, label: String, object: String) -> StepResult {
    let registered = MemoryObject::new(parse_name(&object)?);
    world
        .borrow_mut()
        .backend(&label)
        .register(registered)
        .map_err(|error| error.to_string())
}

#[given("the access rule {rule}")]
fn given_access_rule(world: &RefCell<DispatchWorld>, rule: String) -> StepResult {
    let directive = AccessDirective::from_str(&rule).map_err(|error| error.to_string())?;
    world.borrow_mut().rules.push(directive);
    Ok(())
}

#[when("attribute {attribute} of {object} is read with path {path}")]
fn when_attribute_read(
    world: &RefCell<DispatchWorld>,
    attribute: String,
    object: String,
    path: String,
) -> StepResult {
    let request = Request::read(parse_name(&object)?, attribute).with_path([path]);
    world.borrow_mut().dispatch(&request)
}

#[when("objects matching {pattern} are listed")]
fn when_objects_listed(world: &RefCell<DispatchWorld>, pattern: String) -> StepResult {
    let request = Request::list(parse_name(&pattern)?);
    world.borrow_mut().dispatch(&request)
}

#[then("the result is {expected}")]
fn then_result_is(world: &RefCell<DispatchWorld>, expected: String) -> StepResult {
    let expected = parse_json(&expected)?;
    let world = world.borrow();
    match world.outcome()? {
        Ok(value) if *value == expected => Ok(()),
        Ok(value) => Err(format!("expected {expected}, got {value}")),
        Err(error) => Err(format!("request failed: {error}")),
    }
}

#[then("the request fails with {error_type}")]
fn then_request_fails(world: &RefCell<DispatchWorld>, error_type: String) -> StepResult {
    let world = world.borrow();
    match world.outcome()? {
        Err(error) if error.error_type() == error_type => Ok(()),
        Err(error) => Err(format!("expected {error_type}, got {error:?}")),
        Ok(value) => Err(format!("request succeeded with {value}")),
    }
}

#[then("history for {object} attribute {attribute} path {path} holds {count} entries")]
fn then_history_holds(
    world: &RefCell<DispatchWorld>,
    object: String,
    attribute: String,
    path: String,
    count: String,
) -> StepResult {
    let expected: usize = count
        .parse()
        .map_err(|_| format!("'{count}' is not a count"))?;
    let key = HistoryKey::new(parse_name(&object)?.canonical(), Some(&attribute), &[path]);
    let mut world = world.borrow_mut();
    let entries = world
        .history
        .entries(&key)
        .map_err(|error| error.to_string())?;
    if entries.len() != expected {
        return Err(format!("expected {expected} entries for {key}, got {entries:?}"));
    }
    world.inspected = entries;
    Ok(())
}

#[then("the recorded timestamps increase")]
fn then_timestamps_increase(world: &RefCell<DispatchWorld>) -> StepResult {
    let world = world.borrow();
    let increasing = world.inspected.windows(2).all(|pair| {
        matches!(pair, [earlier, later] if earlier.timestamp_millis < later.timestamp_millis)
    });
    if increasing {
        Ok(())
    } else {
        Err(format!("timestamps do not increase: {:?}", world.inspected))
    }
}

#[scenario(
    path = "tests/features/agent_requests.feature",
    name = "Reading into a map attribute records history"
)]
fn read_records_history(world: RefCell<DispatchWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/agent_requests.feature",
    name = "Listing across backends prunes objects without members"
)]
fn list_prunes_empty_objects(world: RefCell<DispatchWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/agent_requests.feature",
    name = "Restricted reads fail before reaching a backend"
)]
fn restricted_read_is_denied(world: RefCell<DispatchWorld>) {
    drop(world);
}
