use crate::select::Variant;
use thiserror::Error;

/// Errors raised around guards: site identity, registry lookups and
/// variant selection. Running a guard never produces one of these; the
/// guarded block's own error type is propagated instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OnceError {
    #[error("invalid site id '{site}': {reason}")]
    InvalidSiteId { site: String, reason: &'static str },

    #[error("site '{site}' already holds a {registered} guard, not a {requested} guard")]
    VariantMismatch {
        site: String,
        registered: Variant,
        requested: Variant,
    },

    #[error("unknown guard variant '{0}'. Must be one of: blocking, cooperative")]
    UnknownVariant(String),

    #[cfg(feature = "classify")]
    #[error("failed to parse guarded block: {0}")]
    Parse(String),
}
