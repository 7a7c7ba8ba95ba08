//! # Dispatch Leases
//!
//! In-process, per-cluster claim on the right to dispatch. The engine runs
//! one job at a time, and two passes for different records of the same
//! cluster may otherwise both see an idle engine and both dispatch. A pass
//! must hold the cluster's lease from its dispatch decision until the result
//! is persisted.
//!
//! Leases expire after a TTL so a pass that never finishes cannot block the
//! cluster forever. The returned guard releases the lease when dropped.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::ObjectKey;

#[derive(Debug, Clone)]
struct LeaseRecord {
    holder: Uuid,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct DispatchLeases {
    leases: DashMap<ObjectKey, LeaseRecord>,
    ttl: Duration,
}

impl DispatchLeases {
    pub fn new(ttl: Duration) -> Self {
        Self {
            leases: DashMap::new(),
            ttl,
        }
    }

    /// Claim the cluster's lease. `None` while another live lease exists.
    pub fn try_acquire(&self, cluster: &ObjectKey) -> Option<DispatchLeaseGuard<'_>> {
        let now = Instant::now();
        let holder = Uuid::new_v4();
        let record = LeaseRecord {
            holder,
            expires_at: now + self.ttl,
        };

        match self.leases.entry(cluster.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > now {
                    debug!(cluster = %cluster, holder = %occupied.get().holder, "Dispatch lease held elsewhere");
                    return None;
                }
                warn!(cluster = %cluster, previous = %occupied.get().holder, "Taking over expired dispatch lease");
                occupied.insert(record);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(record);
            }
        }

        debug!(cluster = %cluster, holder = %holder, "Dispatch lease acquired");
        Some(DispatchLeaseGuard {
            leases: self,
            cluster: cluster.clone(),
            holder,
        })
    }

    /// Whether a live lease exists for the cluster
    #[cfg(test)]
    fn is_held(&self, cluster: &ObjectKey) -> bool {
        self.leases
            .get(cluster)
            .is_some_and(|record| record.expires_at > Instant::now())
    }

    fn extend(&self, cluster: &ObjectKey, holder: Uuid) -> bool {
        match self.leases.get_mut(cluster) {
            Some(mut record) if record.holder == holder => {
                record.expires_at = Instant::now() + self.ttl;
                true
            }
            _ => false,
        }
    }

    fn release(&self, cluster: &ObjectKey, holder: Uuid) -> bool {
        self.leases
            .remove_if(cluster, |_, record| record.holder == holder)
            .is_some()
    }
}

/// A held dispatch lease; released on drop
#[derive(Debug)]
pub struct DispatchLeaseGuard<'a> {
    leases: &'a DispatchLeases,
    cluster: ObjectKey,
    holder: Uuid,
}

impl DispatchLeaseGuard<'_> {
    pub fn holder(&self) -> Uuid {
        self.holder
    }

    /// Push the expiry out by another TTL. False if the lease was taken over.
    pub fn extend(&self) -> bool {
        self.leases.extend(&self.cluster, self.holder)
    }
}

impl Drop for DispatchLeaseGuard<'_> {
    fn drop(&mut self) {
        if self.leases.release(&self.cluster, self.holder) {
            debug!(cluster = %self.cluster, holder = %self.holder, "Dispatch lease released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_holder_per_cluster() {
        let leases = DispatchLeases::new(Duration::from_secs(60));
        let cluster = ObjectKey::new("kafka", "kafka");
        let other = ObjectKey::new("kafka", "other");

        let guard = leases.try_acquire(&cluster).unwrap();
        assert!(leases.try_acquire(&cluster).is_none());
        assert!(leases.try_acquire(&other).is_some());
        assert!(leases.is_held(&cluster));

        drop(guard);
        assert!(!leases.is_held(&cluster));
        assert!(leases.try_acquire(&cluster).is_some());
    }

    #[test]
    fn test_expired_lease_is_taken_over() {
        let leases = DispatchLeases::new(Duration::from_millis(10));
        let cluster = ObjectKey::new("kafka", "kafka");

        let stale = leases.try_acquire(&cluster).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let fresh = leases.try_acquire(&cluster).unwrap();
        assert_ne!(stale.holder(), fresh.holder());
        assert!(!stale.extend());

        // The stale guard must not release the new holder's lease
        drop(stale);
        assert!(fresh.extend());
        assert!(leases.is_held(&cluster));
    }
}
