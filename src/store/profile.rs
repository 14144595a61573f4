use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Owner service level. Free-tier results are auto-archived after a
/// grace period; an upgrade to Premium triggers restoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceTier {
    Free,
    Premium,
}

impl std::fmt::Display for ServiceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceTier::Free => write!(f, "free"),
            ServiceTier::Premium => write!(f, "premium"),
        }
    }
}

/// Lookup into the (out-of-scope) user profile service. The tier is
/// re-checked at processing time, never trusted from an old message.
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn tier_for(&self, user_id: &str) -> Result<ServiceTier>;
}

/// In-process profile backend. Unknown users answer as Free so their
/// results are archived rather than retained on a missing profile.
#[derive(Default)]
pub struct MemoryProfileStore {
    tiers: RwLock<HashMap<String, ServiceTier>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tier(&self, user_id: impl Into<String>, tier: ServiceTier) {
        self.tiers.write().insert(user_id.into(), tier);
    }
}

#[async_trait::async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn tier_for(&self, user_id: &str) -> Result<ServiceTier> {
        Ok(self
            .tiers
            .read()
            .get(user_id)
            .copied()
            .unwrap_or(ServiceTier::Free))
    }
}
