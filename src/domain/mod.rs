pub mod schedule;
pub mod types;
pub mod validation;

pub use schedule::*;
pub use types::*;
pub use validation::{validate, FieldIssue, ScheduleDraft, Validated, ValidationResult};
