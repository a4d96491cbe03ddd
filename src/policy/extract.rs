//! Policy extraction
//!
//! Converts the untyped body of a `ResourceTTL` object into a [`TtlPolicy`].
//! This is the only place that deals with the object's dynamic shape; every
//! later stage works on the typed value.

use super::TtlPolicy;
use crate::core::{Annotations, ResourceKind, Result, TtlError};
use serde_json::{Map, Value};
use std::time::Duration;

pub const FIELD_SPEC: &str = "spec";
pub const FIELD_RESOURCE_KIND: &str = "resourceKind";
pub const FIELD_RESOURCE_NAME: &str = "resourceName";
pub const FIELD_NAMESPACE: &str = "namespace";
pub const FIELD_TTL_SECONDS: &str = "ttlSeconds";
pub const FIELD_MATCH_ANNOTATIONS: &str = "matchAnnotations";

/// Validates a policy object body (`{"spec": {...}}`) into a [`TtlPolicy`].
///
/// # Errors
///
/// Returns [`TtlError::InvalidPolicy`] naming the offending field when a
/// required field is missing, any field has the wrong type, `ttlSeconds` is
/// negative or fractional, or a required string is empty.
pub fn extract_policy(body: &Value) -> Result<TtlPolicy> {
    let spec = body
        .get(FIELD_SPEC)
        .and_then(Value::as_object)
        .ok_or_else(|| invalid(format!("'{}' must be an object", FIELD_SPEC)))?;

    let kind = required_string(spec, FIELD_RESOURCE_KIND)?;
    let namespace = required_string(spec, FIELD_NAMESPACE)?;
    let ttl = ttl_seconds(spec)?;
    let target_name = optional_string(spec, FIELD_RESOURCE_NAME)?.unwrap_or_default();
    let required_annotations = match_annotations(spec)?;

    let mut policy = TtlPolicy::new(ResourceKind::new(kind), namespace, ttl).target_name(target_name);
    policy.required_annotations = required_annotations;
    Ok(policy)
}

fn invalid(message: String) -> TtlError {
    TtlError::InvalidPolicy(message)
}

/// Looks up `field`, treating an explicit `null` as absent.
fn field<'a>(spec: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    spec.get(field).filter(|value| !value.is_null())
}

fn required_string<'a>(spec: &'a Map<String, Value>, name: &str) -> Result<&'a str> {
    let value = field(spec, name)
        .ok_or_else(|| invalid(format!("missing required field 'spec.{}'", name)))?;
    let text = value
        .as_str()
        .ok_or_else(|| invalid(format!("'spec.{}' must be a string", name)))?;
    if text.is_empty() {
        return Err(invalid(format!("'spec.{}' must not be empty", name)));
    }
    Ok(text)
}

fn optional_string<'a>(spec: &'a Map<String, Value>, name: &str) -> Result<Option<&'a str>> {
    match field(spec, name) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| invalid(format!("'spec.{}' must be a string", name))),
    }
}

fn ttl_seconds(spec: &Map<String, Value>) -> Result<Duration> {
    let value = field(spec, FIELD_TTL_SECONDS)
        .ok_or_else(|| invalid(format!("missing required field 'spec.{}'", FIELD_TTL_SECONDS)))?;

    if let Some(seconds) = value.as_u64() {
        return Ok(Duration::from_secs(seconds));
    }

    match value.as_i64() {
        Some(seconds) => Err(invalid(format!(
            "'spec.{}' must be >= 0, got {}",
            FIELD_TTL_SECONDS, seconds
        ))),
        None => Err(invalid(format!(
            "'spec.{}' must be an integer, got {}",
            FIELD_TTL_SECONDS, value
        ))),
    }
}

fn match_annotations(spec: &Map<String, Value>) -> Result<Annotations> {
    let Some(value) = field(spec, FIELD_MATCH_ANNOTATIONS) else {
        return Ok(Annotations::new());
    };

    let entries = value
        .as_object()
        .ok_or_else(|| invalid(format!("'spec.{}' must be an object", FIELD_MATCH_ANNOTATIONS)))?;

    entries
        .iter()
        .map(|(key, value)| {
            value
                .as_str()
                .map(|text| (key.clone(), text.to_string()))
                .ok_or_else(|| {
                    invalid(format!(
                        "'spec.{}.{}' must be a string",
                        FIELD_MATCH_ANNOTATIONS, key
                    ))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invalid_message(body: Value) -> String {
        match extract_policy(&body) {
            Err(TtlError::InvalidPolicy(message)) => message,
            other => panic!("expected InvalidPolicy, got {:?}", other),
        }
    }

    #[test]
    fn test_extracts_full_policy() {
        let policy = extract_policy(&json!({
            "spec": {
                "resourceKind": "Deployment",
                "resourceName": "nightly-report",
                "namespace": "analytics",
                "ttlSeconds": 3600,
                "matchAnnotations": {"cleanup": "true", "team": "data"}
            }
        }))
        .unwrap();

        assert_eq!(policy.kind, ResourceKind::deployment());
        assert_eq!(policy.target_name.as_deref(), Some("nightly-report"));
        assert_eq!(policy.namespace, "analytics");
        assert_eq!(policy.ttl, Duration::from_secs(3600));
        assert_eq!(policy.required_annotations.len(), 2);
        assert_eq!(policy.required_annotations["team"], "data");
    }

    #[test]
    fn test_optional_fields_default() {
        let policy = extract_policy(&json!({
            "spec": {"resourceKind": "Pod", "namespace": "default", "ttlSeconds": 0}
        }))
        .unwrap();

        assert_eq!(policy.target_name, None);
        assert!(policy.required_annotations.is_empty());
        assert_eq!(policy.ttl, Duration::ZERO);
    }

    #[test]
    fn test_null_and_empty_optionals_are_absent() {
        let policy = extract_policy(&json!({
            "spec": {
                "resourceKind": "Pod",
                "namespace": "default",
                "ttlSeconds": 10,
                "resourceName": "",
                "matchAnnotations": null
            }
        }))
        .unwrap();

        assert_eq!(policy.target_name, None);
        assert!(policy.required_annotations.is_empty());
    }

    #[test]
    fn test_missing_spec_is_invalid() {
        assert!(invalid_message(json!({"status": {}})).contains("'spec'"));
        assert!(invalid_message(json!({"spec": "Pod"})).contains("'spec'"));
    }

    #[test]
    fn test_missing_required_fields_are_invalid() {
        let message = invalid_message(json!({"spec": {"namespace": "default", "ttlSeconds": 5}}));
        assert!(message.contains("resourceKind"));

        let message = invalid_message(json!({"spec": {"resourceKind": "Pod", "ttlSeconds": 5}}));
        assert!(message.contains("namespace"));

        let message = invalid_message(json!({"spec": {"resourceKind": "Pod", "namespace": "default"}}));
        assert!(message.contains("ttlSeconds"));
    }

    #[test]
    fn test_empty_namespace_is_invalid() {
        let message = invalid_message(json!({
            "spec": {"resourceKind": "Pod", "namespace": "", "ttlSeconds": 5}
        }));
        assert!(message.contains("must not be empty"));
    }

    #[test]
    fn test_negative_ttl_is_invalid() {
        let message = invalid_message(json!({
            "spec": {"resourceKind": "Pod", "namespace": "default", "ttlSeconds": -1}
        }));
        assert!(message.contains(">= 0"));
    }

    #[test]
    fn test_non_integer_ttl_is_invalid() {
        for ttl in [json!(1.5), json!("60"), json!(true)] {
            let message = invalid_message(json!({
                "spec": {"resourceKind": "Pod", "namespace": "default", "ttlSeconds": ttl}
            }));
            assert!(message.contains("must be an integer"), "{}", message);
        }
    }

    #[test]
    fn test_wrong_typed_fields_are_invalid() {
        let message = invalid_message(json!({
            "spec": {"resourceKind": 7, "namespace": "default", "ttlSeconds": 5}
        }));
        assert!(message.contains("resourceKind"));

        let message = invalid_message(json!({
            "spec": {"resourceKind": "Pod", "namespace": "default", "ttlSeconds": 5, "resourceName": 3}
        }));
        assert!(message.contains("resourceName"));

        let message = invalid_message(json!({
            "spec": {"resourceKind": "Pod", "namespace": "default", "ttlSeconds": 5, "matchAnnotations": ["a"]}
        }));
        assert!(message.contains("matchAnnotations"));
    }

    #[test]
    fn test_non_string_annotation_value_is_invalid() {
        let message = invalid_message(json!({
            "spec": {
                "resourceKind": "Pod",
                "namespace": "default",
                "ttlSeconds": 5,
                "matchAnnotations": {"replicas": 3}
            }
        }));
        assert!(message.contains("matchAnnotations.replicas"));
    }

    #[test]
    fn test_unknown_kind_still_extracts() {
        let policy = extract_policy(&json!({
            "spec": {"resourceKind": "ConfigMap", "namespace": "default", "ttlSeconds": 5}
        }))
        .unwrap();
        assert_eq!(policy.kind.as_str(), "ConfigMap");
    }
}
