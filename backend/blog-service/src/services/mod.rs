/// Business logic layer
///
/// Services sit between handlers and repositories: they validate forms,
/// store uploads and apply the follow policy.
pub mod follows;
pub mod posts;

pub use follows::{FollowOutcome, FollowService};
pub use posts::PostService;

use crate::forms::FormErrors;

/// Outcome of a form submission
#[derive(Debug)]
pub enum Submission<T> {
    Accepted(T),
    /// Nothing was written; re-render with these errors
    Rejected(FormErrors),
}
