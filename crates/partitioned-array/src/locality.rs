//! Localities: the placement units owning partitions.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Identifier of a locality within a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalityId(pub usize);

impl fmt::Display for LocalityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "locality-{}", self.0)
    }
}

struct LocalityInner {
    id: LocalityId,
    shutdown: watch::Sender<bool>,
    live_partitions: AtomicUsize,
    spawned_partitions: AtomicU64,
}

/// A placement unit owning a set of partition actors.
///
/// Shutting a locality down stops every actor it owns. Clients holding
/// handles to those partitions get a remote access error from then on.
#[derive(Clone)]
pub struct Locality {
    inner: Arc<LocalityInner>,
}

impl Locality {
    fn new(id: LocalityId) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(LocalityInner {
                id,
                shutdown,
                live_partitions: AtomicUsize::new(0),
                spawned_partitions: AtomicU64::new(0),
            }),
        }
    }

    pub fn id(&self) -> LocalityId {
        self.inner.id
    }

    /// Signal every actor on this locality to stop.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.send_replace(true) {
            info!(
                locality = %self.inner.id,
                partitions = self.nr_partitions(),
                "Shutting down locality"
            );
        }
    }

    pub fn is_shut_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    /// Number of partition actors currently alive on this locality.
    pub fn nr_partitions(&self) -> usize {
        self.inner.live_partitions.load(Ordering::Relaxed)
    }

    /// Number of partition actors ever started on this locality.
    pub fn nr_spawned_partitions(&self) -> u64 {
        self.inner.spawned_partitions.load(Ordering::Relaxed)
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    pub(crate) fn partition_started(&self) {
        self.inner.live_partitions.fetch_add(1, Ordering::Relaxed);
        self.inner.spawned_partitions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn partition_stopped(&self) {
        self.inner.live_partitions.fetch_sub(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for Locality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locality")
            .field("id", &self.inner.id)
            .field("shut_down", &self.is_shut_down())
            .field("partitions", &self.nr_partitions())
            .finish()
    }
}

/// The set of localities an engine context distributes partitions over.
#[derive(Clone, Debug)]
pub struct Cluster {
    localities: Arc<Vec<Locality>>,
}

impl Cluster {
    /// Create a cluster of `nr_localities` localities (at least one).
    pub fn new(nr_localities: usize) -> Self {
        let localities = (0..nr_localities.max(1))
            .map(|i| Locality::new(LocalityId(i)))
            .collect();
        Self {
            localities: Arc::new(localities),
        }
    }

    pub fn nr_localities(&self) -> usize {
        self.localities.len()
    }

    pub fn localities(&self) -> &[Locality] {
        &self.localities
    }

    pub fn locality(&self, id: LocalityId) -> Option<&Locality> {
        self.localities.get(id.0)
    }

    /// Locality owning partition `partition_idx` out of `nr_partitions`.
    ///
    /// Partitions are assigned in contiguous blocks of their linear index,
    /// so neighbouring partitions tend to share a locality.
    pub fn placement(&self, partition_idx: usize, nr_partitions: usize) -> &Locality {
        let nr_localities = self.localities.len();
        let idx = if nr_partitions == 0 {
            0
        } else {
            (partition_idx * nr_localities / nr_partitions).min(nr_localities - 1)
        };
        &self.localities[idx]
    }

    /// Shut down every locality.
    pub fn shutdown(&self) {
        for locality in self.localities.iter() {
            locality.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_contiguous_blocks() {
        let cluster = Cluster::new(2);
        let owners: Vec<usize> = (0..4).map(|p| cluster.placement(p, 4).id().0).collect();
        assert_eq!(owners, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_placement_more_localities_than_partitions() {
        let cluster = Cluster::new(8);
        assert_eq!(cluster.placement(0, 2).id(), LocalityId(0));
        assert_eq!(cluster.placement(1, 2).id(), LocalityId(4));
    }

    #[test]
    fn test_shutdown_flag() {
        let cluster = Cluster::new(2);
        let locality = cluster.locality(LocalityId(1)).unwrap();
        assert!(!locality.is_shut_down());
        locality.shutdown();
        assert!(locality.is_shut_down());
        assert!(!cluster.localities()[0].is_shut_down());
    }

    #[test]
    fn test_zero_localities_becomes_one() {
        assert_eq!(Cluster::new(0).nr_localities(), 1);
    }
}
