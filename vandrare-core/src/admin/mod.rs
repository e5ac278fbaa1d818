//! Admin scripting bridge, grounded on
//! `gateway/ssh/admin.go`'s three-module `echo`/`keyset`/`tokenset` surface.
//! `rhai` stands in for the Go original's `internal/appshell` evaluator — the
//! design notes explicitly allow "any language that offers a sandboxable
//! scripting runtime". Module-qualified calls use rhai's native `mod::fn(..)`
//! path syntax rather than the original's `mod.fn(..)` dot syntax; the
//! operation names and semantics are unchanged.

mod echo;
mod keyset;
mod tokenset;

use std::sync::Arc;

use rhai::Engine;
use tokio::sync::Mutex;
use vandrare_db::Store;

/// Build a fresh evaluator with `echo`, `keyset` and `tokenset` installed,
/// one per admin session. `stdout` receives every `print`/`printJSON` line.
pub fn build_engine(store: Arc<Mutex<Store>>, stdout: impl Fn(String) + Send + Sync + 'static) -> Engine {
    let mut engine = Engine::new();
    engine.set_max_expr_depths(64, 64);
    let stdout = Arc::new(stdout);
    echo::register(&mut engine, stdout);
    keyset::register(&mut engine, store.clone());
    tokenset::register(&mut engine, store);
    engine
}

/// Runs `store.ops(true)` on the current tokio runtime from a blocking
/// context, matching `internal/store` autocommit semantics — every admin
/// operation is its own transaction. Admin session handlers must run the
/// evaluator loop inside `tokio::task::spawn_blocking` so this `block_on` is
/// safe (it never runs on a core async worker thread).
pub(crate) fn block_on<F, T>(fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::runtime::Handle::current().block_on(fut)
}
