//! Computes JSON Patches (RFC 6902) between two versions of a resource.
//!
//! The output is deterministic: object keys are visited in lexicographic order and array
//! insertions are emitted in ascending, removals in descending index order. Applying the patch to
//! the original document in order yields the mutated one.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::{ResultExt as _, Snafu};
use std::collections::BTreeSet;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize resource to JSON"))]
    SerializeResource { source: serde_json::Error },

    #[snafu(display("failed to convert patch into a JSON Patch document"))]
    ConvertPatch { source: serde_json::Error },

    #[snafu(display("failed to serialize patch"))]
    SerializePatch { source: serde_json::Error },
}

/// A single JSON Patch operation.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Test { path: String, value: Value },
}

impl Operation {
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Replace { path, .. }
            | Self::Test { path, .. } => path,
        }
    }
}

/// An ordered list of operations. An empty patch means there is nothing to send.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Patch(Vec<Operation>);

impl Patch {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.0
    }

    /// Prepends a `test` operation, so that the whole patch is rejected if the value at `path` no
    /// longer equals `value` when the patch is applied.
    pub fn with_precondition(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(
            0,
            Operation::Test {
                path: path.into(),
                value: value.into(),
            },
        );
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(&self.0).context(SerializePatchSnafu)
    }

    /// Converts into the representation `kube` sends with [`kube::api::Patch::Json`].
    pub fn to_json_patch(&self) -> Result<json_patch::Patch, Error> {
        let value = serde_json::to_value(&self.0).context(ConvertPatchSnafu)?;
        serde_json::from_value(value).context(ConvertPatchSnafu)
    }
}

/// Diffs the JSON representations of two resources.
pub fn diff_resources<T: Serialize>(original: &T, mutated: &T) -> Result<Patch, Error> {
    let original = serde_json::to_value(original).context(SerializeResourceSnafu)?;
    let mutated = serde_json::to_value(mutated).context(SerializeResourceSnafu)?;

    Ok(diff(&original, &mutated))
}

pub fn diff(original: &Value, mutated: &Value) -> Patch {
    let mut operations = Vec::new();
    diff_values("", original, mutated, &mut operations);
    Patch(operations)
}

fn diff_values(path: &str, original: &Value, mutated: &Value, operations: &mut Vec<Operation>) {
    match (original, mutated) {
        _ if original == mutated => {}
        (Value::Object(original), Value::Object(mutated)) => {
            let keys: BTreeSet<&String> = original.keys().chain(mutated.keys()).collect();

            for key in keys {
                let child = format!("{path}/{}", escape(key));

                match (original.get(key), mutated.get(key)) {
                    (Some(original), Some(mutated)) => {
                        diff_values(&child, original, mutated, operations);
                    }
                    (Some(_), None) => operations.push(Operation::Remove { path: child }),
                    (None, Some(mutated)) => operations.push(Operation::Add {
                        path: child,
                        value: mutated.clone(),
                    }),
                    (None, None) => {}
                }
            }
        }
        (Value::Array(original), Value::Array(mutated)) => {
            diff_arrays(path, original, mutated, operations);
        }
        _ => operations.push(Operation::Replace {
            path: path.to_owned(),
            value: mutated.clone(),
        }),
    }
}

fn diff_arrays(path: &str, original: &[Value], mutated: &[Value], operations: &mut Vec<Operation>) {
    if original.len() < mutated.len()
        && let Some(inserted) = unmatched_indices(original, mutated)
    {
        operations.extend(inserted.into_iter().map(|index| Operation::Add {
            path: format!("{path}/{index}"),
            value: mutated[index].clone(),
        }));
        return;
    }

    if mutated.len() < original.len()
        && let Some(removed) = unmatched_indices(mutated, original)
    {
        operations.extend(removed.into_iter().rev().map(|index| Operation::Remove {
            path: format!("{path}/{index}"),
        }));
        return;
    }

    let common = original.len().min(mutated.len());
    for index in 0..common {
        diff_values(
            &format!("{path}/{index}"),
            &original[index],
            &mutated[index],
            operations,
        );
    }

    for (index, value) in mutated.iter().enumerate().skip(common) {
        operations.push(Operation::Add {
            path: format!("{path}/{index}"),
            value: value.clone(),
        });
    }

    for index in (common..original.len()).rev() {
        operations.push(Operation::Remove {
            path: format!("{path}/{index}"),
        });
    }
}

/// If `subsequence` can be obtained from `sequence` by dropping elements, returns the indices in
/// `sequence` of the dropped elements in ascending order.
fn unmatched_indices(subsequence: &[Value], sequence: &[Value]) -> Option<Vec<usize>> {
    let mut remaining = subsequence.iter().peekable();
    let mut unmatched = Vec::new();

    for (index, value) in sequence.iter().enumerate() {
        if remaining.peek() == Some(&value) {
            remaining.next();
        } else {
            unmatched.push(index);
        }
    }

    remaining.peek().is_none().then_some(unmatched)
}

/// Escapes a reference token as required by RFC 6901.
fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn apply(original: &Value, patch: &Patch) -> Value {
        let mut document = original.clone();
        let patch = patch.to_json_patch().expect("patch converts");
        json_patch::patch(&mut document, &patch.0).expect("patch applies");
        document
    }

    #[rstest]
    #[case::unchanged(json!({"a": 1}), json!({"a": 1}))]
    #[case::nested_replace(json!({"spec": {"tag": "a"}}), json!({"spec": {"tag": "b"}}))]
    #[case::type_change(json!({"a": [1]}), json!({"a": {"b": 1}}))]
    #[case::append(json!([1, 2]), json!([1, 2, 3, 4]))]
    #[case::insert(json!(["a", "c"]), json!(["x", "a", "b", "c", "d"]))]
    #[case::remove_middle(json!(["a", "b", "c", "d"]), json!(["a", "d"]))]
    #[case::mixed(json!([{"n": 1}, {"n": 2}, {"n": 3}]), json!([{"n": 1}, {"n": 5}]))]
    #[case::reorder(json!(["a", "b"]), json!(["b", "a"]))]
    #[case::escaped_keys(
        json!({"metadata": {"labels": {"image.kpack.io/image": "a"}}}),
        json!({"metadata": {"labels": {"image.kpack.io/image": "b", "x~y": "c"}}})
    )]
    fn patch_reproduces_mutated(#[case] original: Value, #[case] mutated: Value) {
        let patch = diff(&original, &mutated);

        assert_eq!(apply(&original, &patch), mutated);
    }

    #[test]
    fn identical_documents_produce_empty_patch() {
        let document = json!({"spec": {"additionalTags": ["t1"]}});

        assert!(diff(&document, &document.clone()).is_empty());
    }

    #[test]
    fn source_switch_removes_blob_and_adds_git() {
        let original = json!({"spec": {"source": {"blob": {"url": "https://example.com/app.tgz"}}}});
        let mutated = json!({"spec": {"source": {"git": {"url": "g", "revision": "main"}}}});

        let patch = diff(&original, &mutated);

        assert_eq!(
            patch.operations(),
            [
                Operation::Remove {
                    path: "/spec/source/blob".to_owned()
                },
                Operation::Add {
                    path: "/spec/source/git".to_owned(),
                    value: json!({"url": "g", "revision": "main"}),
                },
            ]
        );
    }

    #[test]
    fn appended_env_var_is_single_add() {
        let original = json!({"spec": {"build": {"env": [{"name": "foo", "value": ""}]}}});
        let mutated = json!({"spec": {"build": {"env": [
            {"name": "foo", "value": ""},
            {"name": "bar", "value": "baz"},
        ]}}});

        let patch = diff(&original, &mutated);

        assert_eq!(
            patch.operations(),
            [Operation::Add {
                path: "/spec/build/env/1".to_owned(),
                value: json!({"name": "bar", "value": "baz"}),
            }]
        );
    }

    #[test]
    fn removals_are_descending() {
        let patch = diff(&json!(["a", "b", "c", "d"]), &json!(["b", "d"]));

        let paths: Vec<_> = patch.operations().iter().map(Operation::path).collect();
        assert_eq!(paths, ["/2", "/0"]);
    }

    #[test]
    fn keys_are_escaped() {
        let patch = diff(&json!({}), &json!({"a/b~c": 1}));

        assert_eq!(patch.operations()[0].path(), "/a~1b~0c");
    }

    #[test]
    fn serialization_is_deterministic() {
        let original = json!({"z": 1, "a": {"c": [1, 2], "b": true}});
        let mutated = json!({"a": {"b": false, "c": [1, 2, 3]}, "y": null});

        let first = diff(&original, &mutated).to_bytes().expect("patch serializes");
        let second = diff(&original, &mutated).to_bytes().expect("patch serializes");

        assert_eq!(first, second);
        assert_eq!(
            String::from_utf8(first).expect("patch is UTF-8"),
            r#"[{"op":"replace","path":"/a/b","value":false},{"op":"add","path":"/a/c/2","value":3},{"op":"add","path":"/y","value":null},{"op":"remove","path":"/z"}]"#
        );
    }

    #[test]
    fn precondition_goes_first() {
        let patch = diff(&json!({"a": 1}), &json!({"a": 2}))
            .with_precondition("/metadata/resourceVersion", "42");

        assert_eq!(patch.len(), 2);
        assert_eq!(
            patch.operations()[0],
            Operation::Test {
                path: "/metadata/resourceVersion".to_owned(),
                value: json!("42"),
            }
        );
    }
}
