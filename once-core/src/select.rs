use crate::error::OnceError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What the front-end analysis reports about a guarded block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockFlags {
    /// The block contains a suspension point
    pub is_asynchronous: bool,
    /// The block may fail, so the error path (`try_run`) is exercised
    pub is_failable: bool,
}

/// Which guard implementation backs a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// [`BlockingGuard`](crate::BlockingGuard): threads, short-held mutex
    Blocking,
    /// [`CooperativeGuard`](crate::CooperativeGuard): tasks, actor-owned state
    Cooperative,
}

impl Variant {
    /// Blocks that can suspend need the cooperative guard; everything else
    /// runs on the blocking one. Failability does not affect the choice.
    pub fn select(flags: BlockFlags) -> Self {
        if flags.is_asynchronous {
            Variant::Cooperative
        } else {
            Variant::Blocking
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Blocking => "blocking",
            Variant::Cooperative => "cooperative",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = OnceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blocking" | "sync" => Ok(Variant::Blocking),
            "cooperative" | "async" => Ok(Variant::Cooperative),
            _ => Err(OnceError::UnknownVariant(s.to_string())),
        }
    }
}

/// Classifies a guarded block's source text.
pub trait VariantSelector {
    fn classify(&self, source: &str) -> Result<BlockFlags, OnceError>;

    fn select(&self, source: &str) -> Result<Variant, OnceError> {
        self.classify(source).map(Variant::select)
    }
}
