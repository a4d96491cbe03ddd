use crate::core::Annotations;

/// Returns `true` when `candidate` carries every required key with the exact
/// required value. An empty requirement set matches everything; a missing key
/// never matches.
pub fn matches(candidate: &Annotations, required: &Annotations) -> bool {
    required
        .iter()
        .all(|(key, value)| candidate.get(key) == Some(value))
}
