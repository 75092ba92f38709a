use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::listeners::{ChangeListenerRegistry, ListenerFilter, ListenerId};
use super::Recompute;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// Source of "now" in epoch milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| Utc::now().timestamp_millis())
}

/// Publishes the state of a [`Recompute`] use case on a watch channel and
/// recomputes it whenever a matching change event arrives.
///
/// At most one computation runs at a time. Events that arrive while one is
/// in flight collapse into a single follow-up run that starts once it has
/// published, so a steady stream of events cannot starve the subscription.
pub struct Subscription<R: Recompute> {
    state_rx: watch::Receiver<R::State>,
    trigger_tx: mpsc::UnboundedSender<()>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
    listener_id: ListenerId,
    registry: Arc<ChangeListenerRegistry>,
}

impl<R: Recompute> Subscription<R> {
    pub fn start(source: Arc<R>, registry: Arc<ChangeListenerRegistry>) -> Self {
        Self::start_with_clock(source, registry, system_clock())
    }

    pub fn start_with_clock(source: Arc<R>, registry: Arc<ChangeListenerRegistry>, clock: Clock) -> Self {
        let (state_tx, state_rx) = watch::channel(source.loading_state());
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();

        let listener_tx = trigger_tx.clone();
        let listener_id = registry.register(ListenerFilter::watching_ops(source.watched_ops()), move |_| {
            // The worker may already be gone during shutdown.
            let _ = listener_tx.send(());
        });

        let cancel_token = CancellationToken::new();
        log_info!("starting subscription for {}", source.name());
        let handle = tokio::spawn(recompute_loop(
            source,
            Arc::new(state_tx),
            trigger_rx,
            cancel_token.clone(),
            clock,
        ));

        Self {
            state_rx,
            trigger_tx,
            cancel_token,
            handle: Some(handle),
            listener_id,
            registry,
        }
    }

    /// Latest published state.
    pub fn state(&self) -> R::State {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<R::State> {
        self.state_rx.clone()
    }

    /// Recompute without waiting for a change event.
    pub fn refresh(&self) {
        let _ = self.trigger_tx.send(());
    }

    pub async fn stop(mut self) -> Result<()> {
        self.cancel_token.cancel();
        self.registry.unregister(self.listener_id);

        if let Some(handle) = self.handle.take() {
            handle.await.context("subscription task failed to join")?;
        }
        Ok(())
    }
}

impl<R: Recompute> Drop for Subscription<R> {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        self.registry.unregister(self.listener_id);
    }
}

struct RunningComputation {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl RunningComputation {
    async fn finished(&mut self) {
        if let Err(err) = (&mut self.handle).await {
            log_error!("recompute task failed to join: {err:?}");
        }
    }

    async fn cancel_and_join(mut self) {
        self.cancel_token.cancel();
        self.finished().await;
    }
}

/// Resolves when the running computation ends, never when idle.
async fn computation_finished(running: &mut Option<RunningComputation>) {
    match running {
        Some(computation) => computation.finished().await,
        None => std::future::pending().await,
    }
}

async fn recompute_loop<R: Recompute>(
    source: Arc<R>,
    state_tx: Arc<watch::Sender<R::State>>,
    mut trigger_rx: mpsc::UnboundedReceiver<()>,
    cancel_token: CancellationToken,
    clock: Clock,
) {
    let mut running = Some(spawn_computation(&source, &state_tx, &cancel_token, &clock));
    let mut rerun_pending = false;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log_info!("subscription for {} shutting down", source.name());
                break;
            }
            trigger = trigger_rx.recv() => {
                if trigger.is_none() {
                    break;
                }
                // Collapse a burst of events into one recompute.
                while trigger_rx.try_recv().is_ok() {}

                if running.is_some() {
                    rerun_pending = true;
                } else {
                    running = Some(spawn_computation(&source, &state_tx, &cancel_token, &clock));
                }
            }
            _ = computation_finished(&mut running) => {
                running = None;
                if rerun_pending {
                    rerun_pending = false;
                    log_debug!("rerunning {} for events seen mid-computation", source.name());
                    running = Some(spawn_computation(&source, &state_tx, &cancel_token, &clock));
                }
            }
        }
    }

    if let Some(computation) = running {
        computation.cancel_and_join().await;
    }
}

fn spawn_computation<R: Recompute>(
    source: &Arc<R>,
    state_tx: &Arc<watch::Sender<R::State>>,
    parent_token: &CancellationToken,
    clock: &Clock,
) -> RunningComputation {
    let cancel_token = parent_token.child_token();
    let run_token = cancel_token.clone();
    let source = Arc::clone(source);
    let state_tx = Arc::clone(state_tx);
    let now_millis = clock();

    let handle = tokio::spawn(async move {
        tokio::select! {
            _ = run_token.cancelled() => {
                log_debug!("recompute of {} abandoned", source.name());
            }
            result = source.recompute(now_millis) => {
                if run_token.is_cancelled() {
                    return;
                }
                match result {
                    Ok(state) => {
                        state_tx.send_replace(state);
                    }
                    // Keep the last good state.
                    Err(err) => log_error!("recompute of {} failed: {err:?}", source.name()),
                }
            }
        }
    });

    RunningComputation {
        cancel_token,
        handle,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{DiscreteAccess, TimelineState, ONE_MINUTE_MS};
    use crate::permissions::{ops, permission_names, PermissionGroup};
    use crate::settings::FeatureFlags;
    use crate::sources::SourceError;
    use crate::testing::FakePlatform;
    use crate::timeline::PermissionGroupUsageDetails;
    use crate::watch::ChangeEvent;

    const NOW: i64 = 1_000 * ONE_MINUTE_MS;
    const PACKAGE: &str = "com.example.camera";

    fn fixed_clock() -> Clock {
        Arc::new(|| NOW)
    }

    fn setup() -> (Arc<FakePlatform>, Arc<PermissionGroupUsageDetails>, Arc<ChangeListenerRegistry>) {
        let platform = Arc::new(FakePlatform::new());
        platform.install(PACKAGE, 0, &[permission_names::CAMERA], false);
        let use_case = PermissionGroupUsageDetails::new(
            PermissionGroup::Camera,
            FeatureFlags::default(),
            platform.collaborators(),
        )
        .unwrap();
        (platform, Arc::new(use_case), Arc::new(ChangeListenerRegistry::new()))
    }

    fn camera_changed() -> ChangeEvent {
        ChangeEvent::OpChanged {
            op_name: ops::CAMERA.into(),
            package_name: PACKAGE.into(),
            user_id: 0,
        }
    }

    fn access_minutes_ago(minutes: i64) -> DiscreteAccess {
        DiscreteAccess::new(ops::CAMERA, NOW - minutes * ONE_MINUTE_MS, -1)
    }

    async fn next_state(rx: &mut watch::Receiver<TimelineState>) -> TimelineState {
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("no state published")
            .unwrap();
        let state = rx.borrow_and_update().clone();
        state
    }

    #[tokio::test]
    async fn starts_loading_then_publishes_success() {
        let (platform, use_case, registry) = setup();
        platform.add_accesses(PACKAGE, 0, vec![access_minutes_ago(5)]);
        platform.set_fetch_delay(Some(Duration::from_millis(50)));

        let subscription = Subscription::start_with_clock(use_case, registry.clone(), fixed_clock());
        let mut rx = subscription.subscribe();
        assert_eq!(subscription.state(), TimelineState::Loading);

        let state = next_state(&mut rx).await;
        assert_eq!(state.entries().map(<[_]>::len), Some(1));
        assert_eq!(registry.len(), 1);

        subscription.stop().await.unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn change_event_triggers_recompute() {
        let (platform, use_case, registry) = setup();
        let subscription = Subscription::start_with_clock(use_case, registry.clone(), fixed_clock());
        let mut rx = subscription.subscribe();

        assert_eq!(next_state(&mut rx).await, TimelineState::Success(Vec::new()));

        platform.add_accesses(PACKAGE, 0, vec![access_minutes_ago(3)]);
        registry.notify(&camera_changed());

        let state = next_state(&mut rx).await;
        assert_eq!(state.entries().map(<[_]>::len), Some(1));

        subscription.stop().await.unwrap();
    }

    #[tokio::test]
    async fn unrelated_op_event_is_ignored() {
        let (_platform, use_case, registry) = setup();
        let subscription = Subscription::start_with_clock(use_case, registry.clone(), fixed_clock());

        let delivered = registry.notify(&ChangeEvent::OpNoted {
            op_name: ops::FINE_LOCATION.into(),
            package_name: PACKAGE.into(),
            user_id: 0,
        });
        assert_eq!(delivered, 0);

        subscription.stop().await.unwrap();
    }

    #[tokio::test]
    async fn trigger_during_computation_runs_once_more() {
        let (platform, use_case, registry) = setup();
        platform.add_accesses(PACKAGE, 0, vec![access_minutes_ago(10)]);
        platform.set_fetch_delay(Some(Duration::from_millis(150)));

        let subscription = Subscription::start_with_clock(use_case, registry.clone(), fixed_clock());
        let mut rx = subscription.subscribe();

        tokio::time::sleep(Duration::from_millis(20)).await;
        platform.add_accesses(PACKAGE, 0, vec![access_minutes_ago(2)]);
        registry.notify(&camera_changed());
        registry.notify(&camera_changed());

        // The run in flight publishes, then both events collapse into one rerun.
        let first = next_state(&mut rx).await;
        assert_eq!(first.entries().map(<[_]>::len), Some(2));
        let second = next_state(&mut rx).await;
        assert_eq!(second, first);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!rx.has_changed().unwrap());

        subscription.stop().await.unwrap();
    }

    #[tokio::test]
    async fn steady_event_stream_still_publishes() {
        let (platform, use_case, registry) = setup();
        platform.add_accesses(PACKAGE, 0, vec![access_minutes_ago(5)]);
        platform.set_fetch_delay(Some(Duration::from_millis(40)));

        let subscription = Subscription::start_with_clock(use_case, registry.clone(), fixed_clock());

        // Events arrive faster than one recompute completes.
        for _ in 0..20 {
            registry.notify(&camera_changed());
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        assert_eq!(subscription.state().entries().map(<[_]>::len), Some(1));

        subscription.stop().await.unwrap();
    }

    #[tokio::test]
    async fn failed_recompute_keeps_previous_state() {
        let (platform, use_case, registry) = setup();
        platform.add_accesses(PACKAGE, 0, vec![access_minutes_ago(4)]);

        let subscription = Subscription::start_with_clock(use_case, registry.clone(), fixed_clock());
        let mut rx = subscription.subscribe();
        let first = next_state(&mut rx).await;

        platform.fail_with(SourceError::Unavailable("app ops service died".into()));
        subscription.refresh();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(!rx.has_changed().unwrap());
        assert_eq!(subscription.state(), first);

        subscription.stop().await.unwrap();
    }

    #[tokio::test]
    async fn dropping_subscription_unregisters_listener() {
        let (_platform, use_case, registry) = setup();
        let subscription = Subscription::start_with_clock(use_case, registry.clone(), fixed_clock());
        assert_eq!(registry.len(), 1);

        drop(subscription);
        assert!(registry.is_empty());
    }
}
