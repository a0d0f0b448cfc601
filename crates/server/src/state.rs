//! Shared state
//!
//! `DocumentState` is the latest snapshot pushed by an adapter. The relay
//! session pulls from it through `TextSource`.

use std::sync::Arc;

use parking_lot::RwLock;
use speech_relay_core::{DispatchPolicy, RegionId, TextSource};
use speech_relay_pipeline::{Notifier, StatusHandle};

#[derive(Debug, Default)]
struct Document {
    region: Option<RegionId>,
    text: String,
    visible: bool,
}

/// Latest answer region as reported by the observing context
#[derive(Debug)]
pub struct DocumentState {
    inner: RwLock<Document>,
}

impl DocumentState {
    pub fn new(start_visible: bool) -> Self {
        Self {
            inner: RwLock::new(Document {
                visible: start_visible,
                ..Document::default()
            }),
        }
    }

    /// Record the full current text of `region`, making it the latest
    pub fn update(&self, region: RegionId, text: String) {
        let mut doc = self.inner.write();
        doc.region = Some(region);
        doc.text = text;
    }

    /// Returns whether visibility actually changed
    pub fn set_visible(&self, visible: bool) -> bool {
        let mut doc = self.inner.write();
        let changed = doc.visible != visible;
        doc.visible = visible;
        changed
    }
}

impl TextSource for DocumentState {
    fn latest_region(&self) -> Option<RegionId> {
        self.inner.read().region.clone()
    }

    fn region_text(&self, region: &RegionId) -> Option<String> {
        let doc = self.inner.read();
        match &doc.region {
            Some(current) if current == region => Some(doc.text.clone()),
            _ => None,
        }
    }

    fn is_visible(&self) -> bool {
        self.inner.read().visible
    }
}

/// Application state shared by HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub document: Arc<DocumentState>,
    pub notifier: Notifier,
    pub status: StatusHandle,
    pub policy: DispatchPolicy,
}

impl AppState {
    pub fn new(
        document: Arc<DocumentState>,
        notifier: Notifier,
        status: StatusHandle,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            document,
            notifier,
            status,
            policy,
        }
    }
}
