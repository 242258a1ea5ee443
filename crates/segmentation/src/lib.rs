//! Dynamic segmentation: registry-typed conditions compiled into
//! tenant-scoped predicates and evaluated as counts or member lists.

pub mod builder;
pub mod compiler;
pub mod contacts;
pub mod criteria;
pub mod engine;
pub mod evaluator;
pub mod preview;
pub mod registry;
pub mod repository;
pub mod sql;
pub mod store;
pub mod validator;

pub use builder::CriteriaBuilder;
pub use compiler::{Predicate, PredicateCompiler};
pub use contacts::{ContactStore, InMemoryContactStore, QueryResult, QueryWindow, StoreError};
pub use criteria::{ConditionGroup, LogicalOperator, RawCondition, SegmentCriteria};
pub use engine::SegmentationEngine;
pub use evaluator::{MemberPage, MembershipEvaluator};
pub use preview::PreviewService;
pub use registry::{FieldDescriptor, FieldRegistry, Operator, ValueType};
pub use repository::{InMemorySegmentRepository, SegmentRepository};
pub use store::{Evaluation, NewSegment, Segment, SegmentEvaluation, SegmentStore, SegmentType, SegmentUpdate};
pub use validator::ConditionValidator;
