use crate::core::{PolicyRef, ResourceKind, TtlError};
use chrono::{DateTime, Utc};

/// What the reconciler decided for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The policy names a different instance.
    NameMismatch,
    /// Required annotations are missing or differ.
    AnnotationMismatch,
    /// Selected but still within its TTL.
    NotExpired { expires_at: Option<DateTime<Utc>> },
    Deleted,
    /// Expired, but someone else deleted it first.
    AlreadyGone,
    /// Expired; dry-run mode suppressed the delete call.
    WouldDelete,
    DeleteFailed(TtlError),
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NameMismatch => "name_mismatch",
            Self::AnnotationMismatch => "annotation_mismatch",
            Self::NotExpired { .. } => "not_expired",
            Self::Deleted => "deleted",
            Self::AlreadyGone => "already_gone",
            Self::WouldDelete => "would_delete",
            Self::DeleteFailed(_) => "delete_failed",
        }
    }

    /// The candidate passed the name and annotation filters.
    pub fn is_selected(&self) -> bool {
        !matches!(self, Self::NameMismatch | Self::AnnotationMismatch)
    }

    /// The candidate was found expired.
    pub fn is_expired(&self) -> bool {
        matches!(
            self,
            Self::Deleted | Self::AlreadyGone | Self::WouldDelete | Self::DeleteFailed(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateReport {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Every listed candidate was evaluated.
    Completed,
    /// The pass stopped before evaluating any candidate.
    Skipped(TtlError),
    /// The pass stopped part-way; `candidates` holds what was decided so far.
    Aborted(TtlError),
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub policy: PolicyRef,
    pub kind: Option<ResourceKind>,
    pub namespace: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: PassOutcome,
    pub candidates: Vec<CandidateReport>,
}

impl PassReport {
    pub(crate) fn start(policy: &PolicyRef) -> Self {
        let now = Utc::now();
        Self {
            policy: policy.clone(),
            kind: None,
            namespace: None,
            started_at: now,
            finished_at: now,
            outcome: PassOutcome::Completed,
            candidates: Vec::new(),
        }
    }

    pub(crate) fn finish(mut self, outcome: PassOutcome) -> Self {
        self.outcome = outcome;
        self.finished_at = Utc::now();
        self
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == PassOutcome::Completed
    }

    /// Error that skipped or aborted the pass.
    pub fn error(&self) -> Option<&TtlError> {
        match &self.outcome {
            PassOutcome::Completed => None,
            PassOutcome::Skipped(err) | PassOutcome::Aborted(err) => Some(err),
        }
    }

    /// Candidates whose delete call succeeded.
    pub fn deleted(&self) -> Vec<&str> {
        self.names_where(|decision| *decision == Decision::Deleted)
    }

    /// Candidates whose delete call failed.
    pub fn failed(&self) -> Vec<&str> {
        self.names_where(|decision| matches!(decision, Decision::DeleteFailed(_)))
    }

    /// Candidates that passed the name and annotation filters.
    pub fn selected(&self) -> Vec<&str> {
        self.names_where(Decision::is_selected)
    }

    /// Candidates found expired, whatever happened to the delete call.
    pub fn expired(&self) -> Vec<&str> {
        self.names_where(Decision::is_expired)
    }

    pub fn decision_for(&self, name: &str) -> Option<&Decision> {
        self.candidates
            .iter()
            .find(|candidate| candidate.name == name)
            .map(|candidate| &candidate.decision)
    }

    fn names_where(&self, predicate: impl Fn(&Decision) -> bool) -> Vec<&str> {
        self.candidates
            .iter()
            .filter(|candidate| predicate(&candidate.decision))
            .map(|candidate| candidate.name.as_str())
            .collect()
    }
}
