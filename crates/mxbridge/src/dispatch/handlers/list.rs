//! LIST: describe matching objects as `domain -> key properties -> info`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value, json};

use super::{HandlerContext, RequestHandler, gather};
use crate::backend::{AttributeInfo, BackendRegistry, ObjectDescriptor, OperationInfo};
use crate::convert::ConvertError;
use crate::dispatch::errors::AgentError;
use crate::dispatch::request::RequestKind;

type Tree = BTreeMap<String, BTreeMap<String, Map<String, Value>>>;

/// Handler for LIST requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct ListHandler;

impl RequestHandler for ListHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::List
    }

    fn supports_aggregate_dispatch(&self) -> bool {
        true
    }

    fn handle_aggregate(
        &self,
        context: &HandlerContext<'_>,
        backends: &[Arc<dyn BackendRegistry>],
    ) -> Result<Value, AgentError> {
        let pattern = &context.request.target;
        let per_backend = gather(backends, |backend| backend.list_objects(pattern))?;

        let mut tree = Tree::new();
        for descriptor in per_backend.iter().flatten() {
            if context
                .restrictor
                .is_allowed(RequestKind::List, &descriptor.name, None)
            {
                populate(&mut tree, descriptor);
            }
        }
        prune(&mut tree);
        navigate(tree_to_json(tree), &context.request.path)
    }
}

fn populate(tree: &mut Tree, descriptor: &ObjectDescriptor) {
    let entry = tree
        .entry(descriptor.name.domain().to_owned())
        .or_default()
        .entry(descriptor.name.canonical_key_properties())
        .or_default();

    if !descriptor.attributes.is_empty() {
        let mut attributes = take_object(entry, "attr");
        for attribute in &descriptor.attributes {
            attributes.insert(attribute.name.clone(), attribute_json(attribute));
        }
        entry.insert("attr".to_owned(), Value::Object(attributes));
    }

    if !descriptor.operations.is_empty() {
        let mut operations = take_object(entry, "op");
        for operation in &descriptor.operations {
            let info = operation_json(operation);
            match operations.get_mut(&operation.name) {
                // Overloads share a name and are listed together.
                Some(Value::Array(overloads)) => overloads.push(info),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, info]);
                }
                None => {
                    operations.insert(operation.name.clone(), info);
                }
            }
        }
        entry.insert("op".to_owned(), Value::Object(operations));
    }
}

fn take_object(entry: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match entry.remove(key) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn attribute_json(attribute: &AttributeInfo) -> Value {
    json!({
        "type": attribute.type_name,
        "desc": attribute.description,
        "rw": attribute.is_read_write(),
    })
}

fn operation_json(operation: &OperationInfo) -> Value {
    let args: Vec<Value> = operation
        .parameters
        .iter()
        .map(|parameter| {
            json!({
                "name": parameter.name,
                "type": parameter.type_name,
                "desc": parameter.description,
            })
        })
        .collect();
    json!({
        "args": args,
        "ret": operation.return_type,
        "desc": operation.description,
    })
}

/// Removes empty info maps, then domains left without objects.
fn prune(tree: &mut Tree) {
    for objects in tree.values_mut() {
        objects.retain(|_, info| !info.is_empty());
    }
    tree.retain(|_, objects| !objects.is_empty());
}

fn tree_to_json(tree: Tree) -> Value {
    Value::Object(
        tree.into_iter()
            .map(|(domain, objects)| {
                let objects = objects
                    .into_iter()
                    .map(|(key, info)| (key, Value::Object(info)))
                    .collect();
                (domain, Value::Object(objects))
            })
            .collect(),
    )
}

fn navigate(mut value: Value, path: &[String]) -> Result<Value, AgentError> {
    for (position, segment) in path.iter().enumerate() {
        value = match value {
            Value::Object(mut map) => map.remove(segment),
            Value::Array(mut items) => segment
                .parse::<usize>()
                .ok()
                .filter(|index| *index < items.len())
                .map(|index| items.swap_remove(index)),
            _ => None,
        }
        .ok_or_else(|| AgentError::from(ConvertError::attribute_path(path, position, "list entry")))?;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ParameterInfo;
    use crate::object_name::ObjectName;

    fn descriptor(name: &str) -> ObjectDescriptor {
        ObjectDescriptor {
            name: ObjectName::parse(name).expect("object name"),
            attributes: Vec::new(),
            operations: Vec::new(),
        }
    }

    #[test]
    fn empty_objects_and_domains_are_pruned() {
        let mut tree = Tree::new();
        let mut full = descriptor("domain1:type=A");
        full.attributes.push(AttributeInfo::read_only("x", "int"));
        populate(&mut tree, &full);
        populate(&mut tree, &descriptor("domain1:type=Empty"));
        populate(&mut tree, &descriptor("domain2:type=Empty"));
        prune(&mut tree);

        let json = tree_to_json(tree);
        assert_eq!(
            json,
            json!({"domain1": {"type=A": {"attr": {"x": {"type": "int", "desc": "", "rw": false}}}}})
        );
    }

    #[test]
    fn overloaded_operations_are_grouped() {
        let mut object = descriptor("app:type=Calc");
        object.operations.push(
            OperationInfo::new("add", "int")
                .with_parameter(ParameterInfo::new("a", "int"))
                .with_parameter(ParameterInfo::new("b", "int")),
        );
        object.operations.push(
            OperationInfo::new("add", "int").with_parameter(ParameterInfo::new("a", "int[]")),
        );
        let mut tree = Tree::new();
        populate(&mut tree, &object);
        let json = tree_to_json(tree);
        let overloads = json["app"]["type=Calc"]["op"]["add"]
            .as_array()
            .expect("overloads");
        assert_eq!(overloads.len(), 2);
        assert_eq!(overloads[0]["args"][1]["name"], json!("b"));
    }

    #[test]
    fn navigation_follows_path_and_rejects_unknown_segments() {
        let tree = json!({"app": {"type=A": {"attr": {}}}});
        let found = navigate(tree.clone(), &["app".to_owned(), "type=A".to_owned()]).expect("navigate");
        assert_eq!(found, json!({"attr": {}}));
        let error = navigate(tree, &["nope".to_owned()]).expect_err("unknown segment");
        assert_eq!(error.status(), 400);
    }
}
