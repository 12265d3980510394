//! Checkpoint bookkeeping
//!
//! A checkpoint is the opaque `STATE` value sent by the source. The loader
//! only ever emits a checkpoint whose data has been merged into the warehouse.

use crate::types::{JsonObject, JsonValue};

/// Latest and flushed checkpoints of one session
#[derive(Debug, Clone, Default)]
pub struct CheckpointTracker {
    /// Most recent STATE received
    latest: Option<JsonValue>,
    /// Checkpoint covering only merged data
    flushed: Option<JsonValue>,
    /// Last checkpoint handed out for emission
    emitted: Option<JsonValue>,
}

impl CheckpointTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent STATE received
    pub fn latest(&self) -> Option<&JsonValue> {
        self.latest.as_ref()
    }

    /// Checkpoint covering only merged data
    pub fn flushed(&self) -> Option<&JsonValue> {
        self.flushed.as_ref()
    }

    /// Record a STATE message
    pub fn record_latest(&mut self, value: JsonValue) {
        self.latest = Some(value);
    }

    /// Everything received so far is merged
    pub fn promote_latest(&mut self) {
        if let Some(latest) = &self.latest {
            self.flushed = Some(latest.clone());
        }
    }

    /// Copy the bookmarks of `streams` from the latest checkpoint into the
    /// flushed one, leaving the other streams' bookmarks untouched
    pub fn promote_streams(&mut self, streams: &[String]) {
        let Some(bookmarks) = self
            .latest
            .as_ref()
            .and_then(|l| l.get("bookmarks"))
            .and_then(JsonValue::as_object)
        else {
            return;
        };

        let moved: Vec<(String, JsonValue)> = streams
            .iter()
            .filter_map(|s| bookmarks.get(s).map(|b| (s.clone(), b.clone())))
            .collect();
        if moved.is_empty() {
            return;
        }

        let flushed = self
            .flushed
            .get_or_insert_with(|| JsonValue::Object(JsonObject::new()));
        if !flushed.is_object() {
            *flushed = JsonValue::Object(JsonObject::new());
        }
        let Some(root) = flushed.as_object_mut() else {
            return;
        };
        let target = root
            .entry("bookmarks")
            .or_insert_with(|| JsonValue::Object(JsonObject::new()));
        if !target.is_object() {
            *target = JsonValue::Object(JsonObject::new());
        }
        if let Some(target) = target.as_object_mut() {
            for (stream, bookmark) in moved {
                target.insert(stream, bookmark);
            }
        }
    }

    /// The flushed checkpoint, if it changed since it was last taken
    pub fn take_emittable(&mut self) -> Option<JsonValue> {
        let flushed = self.flushed.as_ref()?;
        if self.emitted.as_ref() == Some(flushed) {
            return None;
        }
        self.emitted = Some(flushed.clone());
        Some(flushed.clone())
    }
}
