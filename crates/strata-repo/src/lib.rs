//! Live repository signals for Strata.
//!
//! [`GitProbe`] is the production [`strata_core::RepoProbe`]: it shells out
//! to `git` for head, dirty state, history and the tracked-file list, and
//! reads the working tree directly for content fingerprints, modification
//! times and module descriptor files.

mod descriptor;
mod fingerprint;
mod git;

pub use descriptor::describe;
pub use fingerprint::fingerprint_files;
pub use git::{GitProbe, parse_touch_counts};
