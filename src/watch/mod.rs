//! Keeps computed usage state fresh while platform data changes.

pub mod listeners;
pub mod subscription;

use anyhow::Result;
use async_trait::async_trait;

pub use listeners::{ChangeEvent, ChangeKind, ChangeListenerRegistry, ListenerFilter, ListenerId};
pub use subscription::{system_clock, Clock, Subscription};

/// A use case whose result is republished whenever its inputs change.
#[async_trait]
pub trait Recompute: Send + Sync + 'static {
    type State: Clone + Send + Sync + 'static;

    /// Short description used in logs.
    fn name(&self) -> String;

    /// Value published before the first computation finishes.
    fn loading_state(&self) -> Self::State;

    /// Ops whose change events trigger a recompute.
    fn watched_ops(&self) -> Vec<String>;

    async fn recompute(&self, now_millis: i64) -> Result<Self::State>;
}
