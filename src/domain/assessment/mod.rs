//! Assessment module - strict-shape parsing of reasoning backend output.
//!
//! Every stage that talks to the backend gets its answer through
//! [`ResponseSanitizer::parse_object`] and a typed contract here. A shape
//! mismatch is an [`ExtractionError`], never a panic further down the
//! pipeline.

#[allow(clippy::module_inception)]
mod assessment;
mod draft;
mod extract;
mod needs;
mod progress;

pub use assessment::{AssessedConstraints, Assessment};
pub use draft::{CategoryDraft, SuggestedTarget};
pub use extract::{
    extract_json_object, ExtractionError, ResponseSanitizer, SanitizationError,
    MAX_FIELD_LENGTH, MAX_RESPONSE_LENGTH,
};
pub use needs::NeedsEvaluation;
pub use progress::{FeedbackUpdates, ProgressFeedback};
