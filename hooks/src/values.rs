//! Access to the module's shared values.
//!
//! The hook runtime owns the values document. Hooks read the current document and hand back their
//! changes as a list of JSON patch operations, which the runtime applies and makes visible to the
//! module's templates.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::{ensure, Snafu};

/// A key-value view of the module values, addressed by dotted paths such as `csiNfs.internal.flag`.
pub trait ValuesStore {
    /// Returns the value at `path`, or `default` if nothing is stored there.
    fn get(&self, path: &str, default: Value) -> Value;
    /// Stores `value` at `path`, creating intermediate objects as needed.
    fn set(&mut self, path: &str, value: Value) -> Result<(), ValuesError>;
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ValuesError {
    #[snafu(display("Invalid values path '{}': path segments must not be empty", path))]
    InvalidPath { path: String },
}

/// A single RFC 6902 operation as understood by the hook runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValuesPatchOperation {
    pub op: String,
    pub path: String,
    pub value: Value,
}

/// Values read from the runtime, plus every change made since.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchableValues {
    values: Value,
    patches: Vec<ValuesPatchOperation>,
}

impl Default for PatchableValues {
    fn default() -> Self {
        PatchableValues::new(Value::Object(Map::new()))
    }
}

impl PatchableValues {
    pub fn new(values: Value) -> Self {
        PatchableValues {
            values,
            patches: Vec::new(),
        }
    }

    /// The operations recorded so far, in the order they were made.
    pub fn patches(&self) -> &[ValuesPatchOperation] {
        &self.patches
    }

    /// The values document with every change applied.
    pub fn values(&self) -> &Value {
        &self.values
    }
}

impl ValuesStore for PatchableValues {
    fn get(&self, path: &str, default: Value) -> Value {
        let mut current = &self.values;
        for segment in path.split('.') {
            match current.get(segment) {
                Some(next) => current = next,
                None => return default,
            }
        }
        if current.is_null() {
            default
        } else {
            current.clone()
        }
    }

    fn set(&mut self, path: &str, value: Value) -> Result<(), ValuesError> {
        let segments = path_segments(path)?;
        let patch = add_operation(&self.values, &segments, value.clone());
        insert_at(&mut self.values, &segments, value);

        self.patches.push(patch);
        Ok(())
    }
}

/// Builds the `add` operation that stores `value` at `segments` in `values`.
///
/// An `add` requires its parent to exist, so when a parent is missing or is not an object the
/// operation targets the first such segment and carries the whole missing subtree.
fn add_operation(values: &Value, segments: &[&str], value: Value) -> ValuesPatchOperation {
    let mut current = values;
    let mut depth = segments.len();
    for (index, segment) in segments[..segments.len() - 1].iter().enumerate() {
        match current.get(segment) {
            Some(next) if next.is_object() => current = next,
            _ => {
                depth = index + 1;
                break;
            }
        }
    }

    let (target, missing) = segments.split_at(depth);
    ValuesPatchOperation {
        op: "add".to_string(),
        path: json_pointer(target),
        value: nest(missing, value),
    }
}

/// Wraps `value` in one object per segment, outermost first.
fn nest(segments: &[&str], value: Value) -> Value {
    segments.iter().rev().fold(value, |inner, segment| {
        let mut object = Map::new();
        object.insert(segment.to_string(), inner);
        Value::Object(object)
    })
}

fn path_segments(path: &str) -> Result<Vec<&str>, ValuesError> {
    let segments: Vec<&str> = path.split('.').collect();
    ensure!(
        segments.iter().all(|segment| !segment.is_empty()),
        InvalidPathSnafu { path }
    );
    Ok(segments)
}

/// Non-object values along the path are replaced by objects, as the matching `add` operation does.
fn insert_at(target: &mut Value, segments: &[&str], value: Value) {
    match segments.split_first() {
        None => *target = value,
        Some((first, rest)) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            if let Some(map) = target.as_object_mut() {
                let child = map.entry(first.to_string()).or_insert(Value::Null);
                insert_at(child, rest, value);
            }
        }
    }
}

/// Builds an RFC 6901 pointer, escaping `~` and `/` within segments.
fn json_pointer(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|segment| format!("/{}", segment.replace('~', "~0").replace('/', "~1")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Applies the recorded operations to `original` the way the runtime does.
    fn apply_patches(original: Value, values: &PatchableValues) -> Value {
        let operations = serde_json::to_value(values.patches()).unwrap();
        let patch: json_patch::Patch = serde_json::from_value(operations).unwrap();
        let mut document = original;
        json_patch::patch(&mut document, &patch.0).unwrap();
        document
    }

    #[test]
    fn test_set_records_patch() {
        let mut values = PatchableValues::new(json!({"csiNfs": {"internal": {}}}));
        values
            .set("csiNfs.internal.shedulerExtenderEnabled", json!(true))
            .unwrap();

        assert_eq!(
            values.patches(),
            &[ValuesPatchOperation {
                op: "add".to_string(),
                path: "/csiNfs/internal/shedulerExtenderEnabled".to_string(),
                value: json!(true),
            }]
        );
    }

    #[test]
    fn test_set_adds_missing_parents() {
        let mut values = PatchableValues::new(json!({"global": {}}));
        values
            .set("csiNfs.internal.shedulerExtenderEnabled", json!(false))
            .unwrap();

        assert_eq!(
            values.patches(),
            &[ValuesPatchOperation {
                op: "add".to_string(),
                path: "/csiNfs".to_string(),
                value: json!({"internal": {"shedulerExtenderEnabled": false}}),
            }]
        );
    }

    #[test]
    fn test_patches_apply_to_original_values() {
        let test_cases = vec![
            json!({}),
            json!({"global": {"discovery": {}}}),
            json!({"csiNfs": {}}),
            json!({"csiNfs": {"internal": {}}}),
            json!({"csiNfs": {"internal": {"shedulerExtenderEnabled": true}}}),
            json!({"csiNfs": "scalar"}),
            json!({"csiNfs": {"internal": 1}}),
        ];

        for original in test_cases {
            let mut values = PatchableValues::new(original.clone());
            values
                .set("csiNfs.internal.shedulerExtenderEnabled", json!(false))
                .unwrap();
            values.set("csiNfs.internal.other", json!({"a": 1})).unwrap();
            values
                .set("csiNfs.internal.shedulerExtenderEnabled", json!(true))
                .unwrap();

            let applied = apply_patches(original.clone(), &values);
            assert_eq!(&applied, values.values(), "original: {}", original);
            assert_eq!(
                applied["csiNfs"]["internal"]["shedulerExtenderEnabled"],
                json!(true),
                "original: {}",
                original
            );
            assert_eq!(applied["csiNfs"]["internal"]["other"], json!({"a": 1}));
        }
    }

    #[test]
    fn test_get_sees_set() {
        let mut values = PatchableValues::default();
        assert_eq!(values.get("csiNfs.internal.flag", json!(false)), json!(false));

        values.set("csiNfs.internal.flag", json!(true)).unwrap();
        assert_eq!(values.get("csiNfs.internal.flag", json!(false)), json!(true));
        assert_eq!(
            values.get("csiNfs.internal", Value::Null),
            json!({"flag": true})
        );
    }

    #[test]
    fn test_get_reads_initial_values() {
        let values = PatchableValues::new(json!({
            "global": {"modules": {"https": {"mode": "CertManager"}}},
            "csiNfs": {"internal": {"unset": null}}
        }));

        assert_eq!(
            values.get("global.modules.https.mode", Value::Null),
            json!("CertManager")
        );
        assert_eq!(values.get("csiNfs.internal.unset", json!(1)), json!(1));
        assert_eq!(values.get("csiNfs.missing.path", json!("d")), json!("d"));
    }

    #[test]
    fn test_set_overwrites_scalars_on_the_way() {
        let mut values = PatchableValues::new(json!({"csiNfs": "scalar"}));
        values.set("csiNfs.internal.flag", json!(false)).unwrap();
        assert_eq!(values.get("csiNfs.internal.flag", Value::Null), json!(false));
        assert_eq!(values.patches()[0].path, "/csiNfs");
    }

    #[test]
    fn test_repeated_set_is_last_write_wins() {
        let mut values = PatchableValues::default();
        values.set("a.b", json!(true)).unwrap();
        values.set("a.b", json!(false)).unwrap();

        assert_eq!(values.get("a.b", Value::Null), json!(false));
        assert_eq!(values.patches().len(), 2);
        assert_eq!(values.patches()[1].path, "/a/b");
        assert_eq!(values.patches()[1].value, json!(false));
    }

    #[test]
    fn test_pointer_escaping() {
        let mut values = PatchableValues::new(json!({"annotations": {"example": {}}}));
        values.set("annotations.example.com/tier~x", json!("a")).unwrap();
        assert_eq!(
            values.patches()[0].path,
            "/annotations/example/com~1tier~0x"
        );
    }

    #[test]
    fn test_invalid_paths() {
        let mut values = PatchableValues::default();
        for path in ["", "a..b", ".a", "a."] {
            assert!(values.set(path, json!(1)).is_err(), "path '{}'", path);
        }
        assert!(values.patches().is_empty());
    }
}
