//! # once-core
//!
//! Execute-at-most-once guards. A guard runs its block to completion no
//! more than one time per process, whether it is called repeatedly,
//! concurrently from many threads or tasks, or re-entrantly from inside
//! its own block.
//!
//! Two variants share one contract:
//! - [`BlockingGuard`] for preemptible threads (short-held mutex).
//! - [`CooperativeGuard`] for async tasks (single-owner actor, no locks).
//!
//! The [`once!`] and [`try_once!`] macros embed one private guard per call
//! site and pick the variant from the shape of the block.

pub mod blocking;
pub mod cooperative;
pub mod error;
mod macros;
pub mod registry;
pub mod select;
#[cfg(feature = "classify")]
#[path = "select_syn.rs"]
pub mod select_syn;
pub mod state;

pub use blocking::BlockingGuard;
pub use cooperative::CooperativeGuard;
pub use error::OnceError;
pub use registry::{GuardRegistry, SiteId, SiteSnapshot};
pub use select::{BlockFlags, Variant, VariantSelector};
#[cfg(feature = "classify")]
pub use select_syn::SourceClassifier;
pub use state::{Admission, Guard, GuardState, Transition};

#[cfg(test)]
mod state_test;
