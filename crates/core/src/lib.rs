pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{EvaluationError, SegmentError, SegmentResult, ValidationError, ValidationErrorKind};
pub use types::{Contact, ContactAttribute, ContactId, OrganizationId, Page, SegmentId};
