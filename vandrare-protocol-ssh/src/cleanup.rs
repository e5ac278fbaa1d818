//! Once-only guarded teardown, grounded on
//! `examples/original_source/internal/stack/stack.go`'s LIFO of cleanup
//! closures per connection. A single SSH connection may register more than
//! one `tcpip-forward` binding; this implementation keys one cleanup hook
//! per `(conn, endpoint)` pair
//! rather than the Go original's single hook per connection, so tearing down
//! one binding never disturbs the connection's other bindings.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

/// A single cleanup hook. `fire` is idempotent: only the first caller (be it
/// `cancel-tcpip-forward` or transport teardown) gets `true` back, matching
/// Testable Property #3.
#[derive(Clone)]
pub struct CleanupToken {
    fired: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CleanupToken {
    fn new() -> Self {
        Self {
            fired: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            false
        } else {
            self.notify.notify_waiters();
            true
        }
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Resolves once `fire` has been called (or immediately, if it already
    /// was) — the forward worker task selects on this to know when to remove
    /// itself from the registry.
    pub async fn cancelled(&self) {
        if self.is_fired() {
            return;
        }
        self.notify.notified().await;
    }
}

/// Per-connection map of endpoint -> cleanup hook.
#[derive(Default)]
pub struct CleanupStack {
    entries: Mutex<HashMap<String, CleanupToken>>,
}

impl CleanupStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh hook for `endpoint`. If a hook is already
    /// registered under the same endpoint (an exposer rebinding without
    /// cancelling first), the old one is fired before being replaced so its
    /// forward worker doesn't leak past this connection's teardown.
    pub fn register(&self, endpoint: &str) -> CleanupToken {
        let token = CleanupToken::new();
        let previous = self
            .entries
            .lock()
            .expect("cleanup stack mutex poisoned")
            .insert(endpoint.to_string(), token.clone());
        if let Some(previous) = previous {
            previous.fire();
        }
        token
    }

    /// Fires the hook registered for `endpoint`, if any. Used by
    /// `cancel-tcpip-forward`. Returns `false` if there was no hook or it had
    /// already fired.
    pub fn fire(&self, endpoint: &str) -> bool {
        let token = self
            .entries
            .lock()
            .expect("cleanup stack mutex poisoned")
            .remove(endpoint);
        match token {
            Some(token) => token.fire(),
            None => false,
        }
    }

    /// Fires every outstanding hook for this connection. Used on transport
    /// teardown.
    pub fn fire_all(&self) {
        let entries = std::mem::take(&mut *self.entries.lock().expect("cleanup stack mutex poisoned"));
        for token in entries.into_values() {
            token.fire();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn fire_is_idempotent() {
        let stack = CleanupStack::new();
        let token = stack.register("svc:9000");
        assert!(stack.fire("svc:9000"));
        assert!(!stack.fire("svc:9000"));
        token.cancelled().await;
    }

    #[tokio::test]
    async fn fire_all_fires_every_entry_once() {
        let stack = CleanupStack::new();
        let a = stack.register("a:1");
        let b = stack.register("b:2");
        stack.fire_all();
        a.cancelled().await;
        b.cancelled().await;
        assert!(!stack.fire("a:1"));
    }

    #[tokio::test]
    async fn concurrent_fire_and_fire_all_only_one_wins() {
        let stack = CleanupStack::new();
        let token = stack.register("svc:9000");
        tokio::join!(
            async { stack.fire("svc:9000") },
            async { stack.fire_all() }
        );
        // Whichever of the two racing teardown paths actually triggered it,
        // the token itself only ever fires once.
        assert!(token.is_fired());
        assert!(!stack.fire("svc:9000"));
    }
}
