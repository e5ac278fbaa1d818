//! Endpoint registry + load balancer, grounded on
//! `internal/set/random.go` and `internal/loadbalancer/lb.go`'s channel-actor
//! `Offer`. Unlike the Go original's stack-rotation pick, `RandomSet::pick`
//! is genuinely uniform random via `rand`.

use std::collections::HashMap;

use rand::Rng;
use tokio::sync::{mpsc, Mutex};

use crate::error::OfferError;

/// The payload handed to a worker by `offer`: the accepted consumer IO plus
/// the origin/destination address pairs carried by the `direct-tcpip`
/// extra-data, mirroring the Go original's `connData`. Generic over the protocol
/// crate's concrete channel IO type so this crate never depends on `russh`.
pub struct ConnData<IO> {
    pub io: IO,
    pub to_host: String,
    pub to_port: u32,
    pub from_host: String,
    pub from_port: u32,
}

/// A set of live workers for one endpoint, picked from uniformly at random.
/// Internals are only ever touched while the registry's single mutex is
/// held.
struct RandomSet<T> {
    next_id: u64,
    items: Vec<(u64, T)>,
}

impl<T> RandomSet<T> {
    fn new() -> Self {
        Self { next_id: 0, items: Vec::new() }
    }

    fn add(&mut self, item: T) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push((id, item));
        id
    }

    fn remove(&mut self, id: u64) {
        self.items.retain(|(i, _)| *i != id);
    }

    fn pick(&self) -> Option<&T> {
        if self.items.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..self.items.len());
        Some(&self.items[idx].1)
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A worker's receiving half: owned by the exposer session that created it
/// via [`EndpointRegistry::new_worker`]. The sending half lives inside the
/// registry until the worker is removed.
pub struct Worker<T> {
    pub id: u64,
    endpoint: String,
    rx: mpsc::Receiver<T>,
}

impl<T> Worker<T> {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Wait for the next value dispatched to this worker by `offer`.
    /// Returns `None` once the registry entry is torn down (all senders to
    /// this channel dropped).
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

struct Inner<T> {
    sets: HashMap<String, RandomSet<mpsc::Sender<T>>>,
}

/// Maps `"host:port"` endpoint strings to the set of workers currently
/// offering service for them. One mutex guards the whole map; sharding or
/// lock-free structures are unnecessary at the expected connection rate.
pub struct EndpointRegistry<T> {
    inner: Mutex<Inner<T>>,
}

impl<T: Send + 'static> Default for EndpointRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> EndpointRegistry<T> {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { sets: HashMap::new() }) }
    }

    /// `LB.New()`: registers a fresh unbuffered (capacity-1, the closest
    /// tokio equivalent to Go's unbuffered channel) worker for `endpoint`
    /// and returns its receiving half.
    pub async fn new_worker(&self, endpoint: &str) -> Worker<T> {
        let (tx, rx) = mpsc::channel(1);
        let mut guard = self.inner.lock().await;
        let set = guard.sets.entry(endpoint.to_string()).or_insert_with(RandomSet::new);
        let id = set.add(tx);
        Worker { id, endpoint: endpoint.to_string(), rx }
    }

    /// `LB.Remove(w)`: removes the worker; if the set becomes empty, the
    /// registry entry is deleted atomically with the removal.
    pub async fn remove_worker(&self, worker: &Worker<T>) {
        let mut guard = self.inner.lock().await;
        if let Some(set) = guard.sets.get_mut(&worker.endpoint) {
            set.remove(worker.id);
            if set.is_empty() {
                guard.sets.remove(&worker.endpoint);
            }
        }
    }

    /// `LB.Offer(ctx, conn)`: picks one worker uniformly at random and blocks
    /// until it receives the value (or its channel is gone). If no workers
    /// are registered, fails fast with [`OfferError::NoWorkers`] rather than
    /// queuing. The caller is
    /// responsible for racing this against its own cancellation context.
    pub async fn offer(&self, endpoint: &str, value: T) -> Result<(), OfferError> {
        let tx = {
            let guard = self.inner.lock().await;
            let set = guard.sets.get(endpoint).ok_or(OfferError::NoWorkers)?;
            set.pick().cloned().ok_or(OfferError::NoWorkers)?
        };
        tx.send(value).await.map_err(|_| OfferError::NoWorkers)
    }

    /// Number of live workers currently registered for `endpoint`.
    pub async fn len(&self, endpoint: &str) -> usize {
        self.inner
            .lock()
            .await
            .sets
            .get(endpoint)
            .map(RandomSet::len)
            .unwrap_or(0)
    }

    pub async fn has_endpoint(&self, endpoint: &str) -> bool {
        self.inner.lock().await.sets.contains_key(endpoint)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn offer_without_workers_fails_fast() {
        let registry: EndpointRegistry<u32> = EndpointRegistry::new();
        let err = registry.offer("nowhere:22", 1).await.unwrap_err();
        assert!(matches!(err, OfferError::NoWorkers));
    }

    #[tokio::test]
    async fn offer_is_received_by_exactly_one_worker() {
        let registry: EndpointRegistry<u32> = EndpointRegistry::new();
        let mut w1 = registry.new_worker("svc:9000").await;
        let mut w2 = registry.new_worker("svc:9000").await;
        assert_eq!(registry.len("svc:9000").await, 2);

        registry.offer("svc:9000", 42).await.expect("offer");

        let r1 = w1.rx.try_recv();
        let r2 = w2.rx.try_recv();
        let received: Vec<_> = [r1, r2].into_iter().filter_map(Result::ok).collect();
        assert_eq!(received, vec![42]);
    }

    #[tokio::test]
    async fn removing_last_worker_deletes_entry() {
        let registry: EndpointRegistry<u32> = EndpointRegistry::new();
        let worker = registry.new_worker("svc:9000").await;
        assert!(registry.has_endpoint("svc:9000").await);
        registry.remove_worker(&worker).await;
        assert!(!registry.has_endpoint("svc:9000").await);
        assert!(registry.offer("svc:9000", 1).await.is_err());
    }

    #[tokio::test]
    async fn random_dispatch_reaches_both_workers_eventually() {
        let registry: EndpointRegistry<u32> = EndpointRegistry::new();
        let mut w1 = registry.new_worker("web:80").await;
        let mut w2 = registry.new_worker("web:80").await;

        let mut count1 = 0usize;
        let mut count2 = 0usize;
        for i in 0..200u32 {
            registry.offer("web:80", i).await.expect("offer");
            tokio::select! {
                biased;
                v = w1.rx.recv() => { if v.is_some() { count1 += 1; } }
                v = w2.rx.recv() => { if v.is_some() { count2 += 1; } }
            }
        }
        assert!(count1 > 0 && count2 > 0);
        assert_eq!(count1 + count2, 200);
    }
}
