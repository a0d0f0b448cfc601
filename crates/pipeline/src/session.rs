//! Relay session
//!
//! A single task owns the `RelayCore`, the debounce timer and the set of
//! in-flight transport calls. Notifications, timer fires and transport
//! outcomes are all handled on that one task, one at a time, so no two
//! handlers ever interleave on the same stream.

use std::future::{pending, Future};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use parking_lot::RwLock;
use speech_relay_config::constants::limits;
use speech_relay_config::Settings;
use speech_relay_core::{
    DispatchPolicy, RegionId, RelayError, SpeechTransport, TextSource, Ticket, TransportOutcome,
};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::debounce::DebounceTimer;
use crate::events::RelayEvent;
use crate::gate::{Dispatch, GateDecision, SkipReason};
use crate::relay::{RelayCore, Settlement, StreamSnapshot, TimerAction};
use crate::tracker::{Observation, TrackerDecision};

/// Latest stream snapshot, shared with status readers
pub type StatusHandle = Arc<RwLock<Option<StreamSnapshot>>>;

type OutcomeFuture = BoxFuture<'static, (Ticket, TransportOutcome)>;

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub policy: DispatchPolicy,
    /// Quiet period after the last change
    pub debounce_delay: Duration,
    /// Pending notifications buffered before further ones coalesce
    pub notify_queue: usize,
    /// Events buffered per subscriber
    pub event_queue: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            policy: DispatchPolicy::default(),
            debounce_delay: Duration::from_millis(
                speech_relay_config::constants::timing::DEBOUNCE_DELAY_MS,
            ),
            notify_queue: limits::NOTIFY_QUEUE,
            event_queue: limits::EVENT_QUEUE,
        }
    }
}

impl SessionConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            policy: settings.relay.policy,
            debounce_delay: settings.relay.debounce_delay(),
            ..Self::default()
        }
    }
}

/// Change notification handle given to text source adapters.
///
/// Notifications carry no payload. When the queue is full the notification
/// is dropped: one already queued will make the session pull the same
/// latest state.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<()>,
}

impl Notifier {
    /// Signal that the source may have changed. Returns `false` once the
    /// session has stopped.
    pub fn notify(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Closed(())) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Event loop driving one relay
pub struct RelaySession {
    core: RelayCore,
    timer: DebounceTimer,
    source: Arc<dyn TextSource>,
    transport: Arc<dyn SpeechTransport>,
    notify_rx: mpsc::Receiver<()>,
    event_tx: broadcast::Sender<RelayEvent>,
    status: StatusHandle,
    outcomes: FuturesUnordered<OutcomeFuture>,
    /// Spawned transport calls, aborted on shutdown
    sends: Vec<AbortHandle>,
    visible: bool,
}

impl RelaySession {
    /// Create a session and the notifier that feeds it
    pub fn new(
        config: SessionConfig,
        source: Arc<dyn TextSource>,
        transport: Arc<dyn SpeechTransport>,
    ) -> (Self, Notifier) {
        let (notify_tx, notify_rx) = mpsc::channel(config.notify_queue.max(1));
        let (event_tx, _) = broadcast::channel(config.event_queue.max(1));
        let visible = source.is_visible();

        let session = Self {
            core: RelayCore::new(config.policy),
            timer: DebounceTimer::new(config.debounce_delay),
            source,
            transport,
            notify_rx,
            event_tx,
            status: Arc::new(RwLock::new(None)),
            outcomes: FuturesUnordered::new(),
            sends: Vec::new(),
            visible,
        };

        (session, Notifier { tx: notify_tx })
    }

    /// Subscribe to relay events
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.event_tx.subscribe()
    }

    pub fn status_handle(&self) -> StatusHandle {
        Arc::clone(&self.status)
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.core.policy()
    }

    /// Run until every notifier is dropped and pending work has drained
    pub async fn run(self) {
        self.run_until(pending::<()>()).await
    }

    /// Run until `shutdown` resolves, or until every notifier is dropped
    /// and pending work has drained.
    ///
    /// On shutdown the pending timer is dropped and in-flight transport
    /// calls are abandoned.
    pub async fn run_until<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut notifications_open = true;

        info!(
            policy = %self.core.policy(),
            delay_ms = self.timer.delay().as_millis() as u64,
            visible = self.visible,
            "Relay session started"
        );

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!(in_flight = self.outcomes.len(), "Relay session shutting down");
                    self.abort_sends();
                    break;
                }

                Some((ticket, outcome)) = self.outcomes.next(), if !self.outcomes.is_empty() => {
                    self.handle_outcome(ticket, outcome);
                }

                message = self.notify_rx.recv(), if notifications_open => {
                    match message {
                        Some(()) => self.handle_notification(),
                        None => {
                            debug!("All notifiers dropped, draining");
                            notifications_open = false;
                        }
                    }
                }

                () = self.timer.fired() => {
                    self.handle_fire();
                }
            }

            if !notifications_open && !self.timer.is_armed() && self.outcomes.is_empty() {
                info!("Relay session drained");
                break;
            }
        }

        self.timer.cancel();
    }

    fn handle_notification(&mut self) {
        self.refresh_visibility();

        let Some(region) = self.source.latest_region() else {
            debug!(error = %RelayError::NoRegionFound, "Notification ignored");
            return;
        };
        let Some(text) = self.source.region_text(&region) else {
            let stale = RelayError::StaleNotification {
                region: region.clone(),
            };
            debug!(error = %stale, "Notification ignored");
            self.emit(RelayEvent::Stale { region });
            return;
        };

        self.observe(&region, &text);
        self.publish_status();
    }

    fn handle_fire(&mut self) {
        self.emit(RelayEvent::Fired);
        self.refresh_visibility();

        // Re-pull before deciding; the timer may have been armed on text
        // that has since moved on.
        if let Some(region) = self.source.latest_region() {
            if let Some(text) = self.source.region_text(&region) {
                let observation = self.observe(&region, &text);
                if observation.reset || observation.decision == TrackerDecision::Changed {
                    debug!(region = %region, "Text moved on before fire, waiting again");
                    self.emit(RelayEvent::Skipped {
                        reason: SkipReason::Unsettled,
                    });
                    self.publish_status();
                    return;
                }
            }
        }

        match self.core.on_fire(self.visible) {
            GateDecision::Send(dispatch) => self.dispatch(dispatch),
            GateDecision::Skip(SkipReason::EmptyPayload) => {
                debug!(error = %RelayError::EmptyPayload, "Fire skipped");
                self.emit(RelayEvent::Skipped {
                    reason: SkipReason::EmptyPayload,
                });
            }
            GateDecision::Skip(reason) => {
                debug!(reason = ?reason, "Fire skipped");
                self.emit(RelayEvent::Skipped { reason });
            }
        }
        self.publish_status();
    }

    fn observe(&mut self, region: &RegionId, text: &str) -> Observation {
        let observation = self.core.observe(region, text);

        if observation.reset {
            let epoch = self
                .core
                .tracker()
                .stream()
                .map(|stream| stream.epoch())
                .unwrap_or_default();
            self.emit(RelayEvent::Reset {
                region: region.clone(),
                epoch,
            });
        }

        self.apply(observation.timer);
        observation
    }

    fn dispatch(&mut self, dispatch: Dispatch) {
        let payload = dispatch.payload().to_string();
        let ticket = dispatch.ticket;

        info!(
            ticket = %ticket,
            region = %dispatch.region,
            chars = payload.chars().count(),
            "Sending segment to speech service"
        );
        self.emit(RelayEvent::Sent {
            ticket,
            region: dispatch.region,
            payload: payload.clone(),
        });

        let transport = Arc::clone(&self.transport);
        let handle = tokio::spawn(async move { transport.send(&payload).await });
        self.sends.retain(|send| !send.is_finished());
        self.sends.push(handle.abort_handle());

        self.outcomes.push(
            async move {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => TransportOutcome::Unreachable(format!("transport task failed: {}", e)),
                };
                (ticket, outcome)
            }
            .boxed(),
        );
    }

    fn abort_sends(&mut self) {
        for send in self.sends.drain(..) {
            send.abort();
        }
    }

    fn handle_outcome(&mut self, ticket: Ticket, outcome: TransportOutcome) {
        let (settlement, timer) = self.core.on_outcome(ticket, &outcome);

        match (&outcome, settlement) {
            (_, Settlement::Stale) => {}
            (TransportOutcome::Delivered(_), _) => {
                debug!(ticket = %ticket, outcome = %outcome, "Segment delivered");
            }
            _ => {
                let failure = RelayError::TransportFailure(outcome.clone());
                warn!(
                    ticket = %ticket,
                    retry = failure.is_transient() && self.core.policy() == DispatchPolicy::Incremental,
                    "{}", failure
                );
            }
        }

        self.emit(RelayEvent::Outcome {
            ticket,
            outcome,
            settlement,
        });
        self.apply(timer);
        self.publish_status();
    }

    fn refresh_visibility(&mut self) {
        let visible = self.source.is_visible();
        if visible == self.visible {
            return;
        }
        self.visible = visible;
        info!(visible, "Visibility changed");

        let action = self.core.visibility_changed(visible);
        self.apply(action);
    }

    fn apply(&mut self, action: TimerAction) {
        match action {
            TimerAction::Arm => {
                let generation = self.timer.arm();
                self.emit(RelayEvent::Armed {
                    generation,
                    delay_ms: self.timer.delay().as_millis() as u64,
                });
            }
            TimerAction::Cancel => {
                self.timer.cancel();
            }
            TimerAction::Keep => {}
        }
    }

    fn publish_status(&self) {
        *self.status.write() = self.core.snapshot();
    }

    fn emit(&self, event: RelayEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}
