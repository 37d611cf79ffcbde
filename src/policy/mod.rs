//! Hierarchical access policy.
//! Directory-local `.ghs.json` fragments are overlaid field by field from the served root down
//! to the requested path; the result answers upload/delete/mkdir and visibility questions.

mod decisions;
mod model;
mod resolver;

pub use model::{AccessPolicy, AccessTable, PolicyFragment, UserRule};
pub use resolver::{load_fragment, write_fragment, PolicyResolver, POLICY_FILE_NAME};

#[cfg(test)]
#[path = "policy_tests.rs"]
mod policy_tests;
