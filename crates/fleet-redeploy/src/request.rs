//! Redeploy requests and their coalescing key

use chrono::{DateTime, Utc};
use fleet_types::{EventId, ServiceName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// An ordered set of services, compared by content
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceSet(BTreeSet<ServiceName>);

impl ServiceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, service: &str) -> bool {
        self.0.contains(service)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceName> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if the sets share at least one service
    pub fn overlaps(&self, other: &ServiceSet) -> bool {
        !self.0.is_disjoint(&other.0)
    }
}

impl From<BTreeSet<ServiceName>> for ServiceSet {
    fn from(services: BTreeSet<ServiceName>) -> Self {
        Self(services)
    }
}

impl<S: Into<ServiceName>> FromIterator<S> for ServiceSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl std::fmt::Display for ServiceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, service) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{service}")?;
        }
        write!(f, "}}")
    }
}

/// Instruction to the provisioning engine to redeploy a set of services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeployRequest {
    /// Stable across resends; the engine deduplicates on it
    pub request_id: Uuid,

    pub services: ServiceSet,

    /// Causing events, in arrival order (ties broken by id)
    pub cause_event_ids: Vec<EventId>,

    /// Names of the rules that fired
    pub rules: BTreeSet<String>,

    pub created_at: DateTime<Utc>,
}

impl RedeployRequest {
    pub fn new(services: ServiceSet, cause_event_ids: Vec<EventId>, rules: BTreeSet<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            services,
            cause_event_ids,
            rules,
            created_at: Utc::now(),
        }
    }
}
