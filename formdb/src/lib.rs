pub mod schema;
pub mod document;
pub mod store;
pub mod validation;
pub mod error;

pub use error::{FormDbError, Result};
pub use schema::{FieldDescriptor, FieldType, FormSchema};
pub use store::{SubmissionQuery, SubmissionStore};
pub use document::Submission;
pub use validation::{validate_field, validate_submission, ValidationErrors};
