//! Shared fakes for relay session tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use speech_relay_core::{RegionId, SpeechTransport, StatusInfo, TextSource, TransportOutcome};
use speech_relay_pipeline::{Notifier, RelayEvent, RelaySession, SessionConfig, StatusHandle};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};

#[derive(Default)]
struct Document {
    region: Option<RegionId>,
    text: String,
    hidden: bool,
    detached: bool,
}

/// In-memory text source driven by the test
#[derive(Default)]
pub struct MemorySource {
    doc: Mutex<Document>,
}

impl MemorySource {
    pub fn set(&self, region: &str, text: &str) {
        let mut doc = self.doc.lock();
        doc.region = Some(RegionId::new(region));
        doc.text = text.to_string();
    }

    pub fn set_visible(&self, visible: bool) {
        self.doc.lock().hidden = !visible;
    }

    /// Make `region_text` report the latest region as gone
    pub fn set_detached(&self, detached: bool) {
        self.doc.lock().detached = detached;
    }
}

impl TextSource for MemorySource {
    fn latest_region(&self) -> Option<RegionId> {
        self.doc.lock().region.clone()
    }

    fn region_text(&self, region: &RegionId) -> Option<String> {
        let doc = self.doc.lock();
        match &doc.region {
            Some(current) if current == region && !doc.detached => Some(doc.text.clone()),
            _ => None,
        }
    }

    fn is_visible(&self) -> bool {
        !self.doc.lock().hidden
    }
}

/// Transport that records every payload and replays scripted outcomes
pub struct ScriptedTransport {
    script: Mutex<VecDeque<TransportOutcome>>,
    delay: Duration,
    sends: Mutex<Vec<(Instant, String)>>,
}

impl ScriptedTransport {
    pub fn accepting() -> Self {
        Self::scripted(Vec::new())
    }

    /// Outcomes are used in order; once exhausted every send is delivered
    pub fn scripted(outcomes: Vec<TransportOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            delay: Duration::ZERO,
            sends: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn payloads(&self) -> Vec<String> {
        self.sends.lock().iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn send_times(&self) -> Vec<Instant> {
        self.sends.lock().iter().map(|(at, _)| *at).collect()
    }
}

#[async_trait]
impl SpeechTransport for ScriptedTransport {
    async fn send(&self, text: &str) -> TransportOutcome {
        self.sends.lock().push((Instant::now(), text.to_string()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| TransportOutcome::Delivered(StatusInfo::new(200)))
    }
}

pub fn rejected(code: u16) -> TransportOutcome {
    TransportOutcome::Rejected(StatusInfo::new(code))
}

/// A running session plus the handles a test needs
pub struct Harness {
    pub source: Arc<MemorySource>,
    pub transport: Arc<ScriptedTransport>,
    pub notifier: Notifier,
    pub events: broadcast::Receiver<RelayEvent>,
    pub status: StatusHandle,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl Harness {
    pub fn start(config: SessionConfig, transport: ScriptedTransport) -> Self {
        let source = Arc::new(MemorySource::default());
        let transport = Arc::new(transport);
        let (session, notifier) = RelaySession::new(config, source.clone(), transport.clone());
        let events = session.subscribe();
        let status = session.status_handle();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(session.run_until(async move {
            let _ = shutdown_rx.await;
        }));

        Self {
            source,
            transport,
            notifier,
            events,
            status,
            shutdown: Some(shutdown_tx),
            handle,
        }
    }

    /// Update the document and notify, like a mutation observer would
    pub fn show(&self, region: &str, text: &str) {
        self.source.set(region, text);
        assert!(self.notifier.notify());
    }

    /// Wait for the next event matching `pred`
    pub async fn wait_for<F>(&mut self, pred: F) -> RelayEvent
    where
        F: Fn(&RelayEvent) -> bool,
    {
        let events = &mut self.events;
        timeout(Duration::from_secs(60), async move {
            loop {
                match events.recv().await {
                    Ok(event) if pred(&event) => return event,
                    Ok(_) => continue,
                    Err(e) => panic!("event stream ended: {}", e),
                }
            }
        })
        .await
        .expect("timed out waiting for relay event")
    }

    pub async fn wait_for_outcome(&mut self) -> RelayEvent {
        self.wait_for(|e| matches!(e, RelayEvent::Outcome { .. })).await
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("session did not stop")
            .expect("session task panicked");
    }
}
