pub mod error;
pub mod types;

pub use error::{Result, TtlError};
pub use types::{
    Annotations, CandidateResource, DeleteOutcome, PolicyEvent, PolicyObject, PolicyRef,
    ResourceKind,
};
