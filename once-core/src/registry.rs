//! Arena of guards keyed by call-site identity.
//!
//! The macros give each call site a private `static`; the registry is the
//! explicit form of the same thing, for call sites that are only known at
//! runtime or for tests that want an isolated set of guards.

use crate::blocking::BlockingGuard;
use crate::cooperative::CooperativeGuard;
use crate::error::OnceError;
use crate::select::Variant;
use crate::state::{Guard, GuardState};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::Location;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

const MAX_SITE_LEN: usize = 256;

/// Identity of a guarded call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteId(String);

impl SiteId {
    pub fn new(site: impl Into<String>) -> Result<Self, OnceError> {
        let site = site.into();
        if site.is_empty() {
            return Err(OnceError::InvalidSiteId {
                site,
                reason: "must not be empty",
            });
        }
        if site.len() > MAX_SITE_LEN {
            return Err(OnceError::InvalidSiteId {
                site,
                reason: "must be at most 256 bytes",
            });
        }
        if site.chars().any(char::is_whitespace) {
            return Err(OnceError::InvalidSiteId {
                site,
                reason: "must not contain whitespace",
            });
        }
        Ok(Self(site))
    }

    /// The source location of whoever called this function, as
    /// `file:line:column`.
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self(format!(
            "{}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        ))
    }

    /// A fresh random site, never equal to any other.
    pub fn generate() -> Self {
        Self(format!("site_{}", nanoid::nanoid!()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SiteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SiteId {
    type Err = OnceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Point-in-time view of one registered guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSnapshot {
    pub site: SiteId,
    pub variant: Variant,
    pub state: GuardState,
}

enum Slot {
    Blocking(Arc<BlockingGuard>),
    Cooperative(Arc<CooperativeGuard>),
}

impl Slot {
    fn variant(&self) -> Variant {
        match self {
            Slot::Blocking(_) => Variant::Blocking,
            Slot::Cooperative(_) => Variant::Cooperative,
        }
    }

    fn state(&self) -> GuardState {
        match self {
            Slot::Blocking(guard) => guard.state(),
            Slot::Cooperative(guard) => guard.state(),
        }
    }
}

/// One guard per site, created on first reference and never removed.
pub struct GuardRegistry {
    // Map of Site -> Guard
    slots: Mutex<HashMap<SiteId, Slot>>,
}

impl GuardRegistry {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static GuardRegistry {
        static GLOBAL: OnceLock<GuardRegistry> = OnceLock::new();
        GLOBAL.get_or_init(GuardRegistry::new)
    }

    /// The blocking guard for `site`, created if this is its first reference.
    pub fn blocking(&self, site: &SiteId) -> Result<Arc<BlockingGuard>, OnceError> {
        let mut slots = self.slots.lock();
        let slot = slots.entry(site.clone()).or_insert_with(|| {
            tracing::debug!(%site, "registered blocking guard");
            Slot::Blocking(Arc::new(BlockingGuard::with_label(site.to_string())))
        });
        match slot {
            Slot::Blocking(guard) => Ok(Arc::clone(guard)),
            other => Err(mismatch(site, other.variant(), Variant::Blocking)),
        }
    }

    /// The cooperative guard for `site`, created if this is its first reference.
    pub fn cooperative(&self, site: &SiteId) -> Result<Arc<CooperativeGuard>, OnceError> {
        let mut slots = self.slots.lock();
        let slot = slots.entry(site.clone()).or_insert_with(|| {
            tracing::debug!(%site, "registered cooperative guard");
            Slot::Cooperative(Arc::new(CooperativeGuard::with_label(site.to_string())))
        });
        match slot {
            Slot::Cooperative(guard) => Ok(Arc::clone(guard)),
            other => Err(mismatch(site, other.variant(), Variant::Cooperative)),
        }
    }

    /// Every registered guard, sorted by site.
    pub fn snapshot(&self) -> Vec<SiteSnapshot> {
        let slots = self.slots.lock();
        let mut sites: Vec<SiteSnapshot> = slots
            .iter()
            .map(|(site, slot)| SiteSnapshot {
                site: site.clone(),
                variant: slot.variant(),
                state: slot.state(),
            })
            .collect();
        sites.sort_by(|a, b| a.site.cmp(&b.site));
        sites
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

impl Default for GuardRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn mismatch(site: &SiteId, registered: Variant, requested: Variant) -> OnceError {
    tracing::warn!(%site, %registered, %requested, "guard variant mismatch");
    OnceError::VariantMismatch {
        site: site.to_string(),
        registered,
        requested,
    }
}
