use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::models::MatchEvent;

/// Receiver of events for external observers
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &MatchEvent);
}

/// Emits every event as a structured log line
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &MatchEvent) {
        match event {
            MatchEvent::ProfilePublished { profile_id, owner } => {
                tracing::info!(event = event.kind(), profile_id = profile_id.0, owner = %owner, "Profile published");
            }
            MatchEvent::PreferenceSubmitted { preference_id, requester } => {
                tracing::info!(event = event.kind(), preference_id = preference_id.0, requester = %requester, "Preference submitted");
            }
            MatchEvent::MatchComputed { profile_id, preference_id, handle } => {
                tracing::info!(event = event.kind(), profile_id = profile_id.0, preference_id = preference_id.0, handle = %handle, "Match computed");
            }
            MatchEvent::MatchMadePublic { profile_id, preference_id, handle } => {
                tracing::info!(event = event.kind(), profile_id = profile_id.0, preference_id = preference_id.0, handle = %handle, "Match made public");
            }
        }
    }
}

/// Recorded event with delivery metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: uuid::Uuid,
    #[serde(rename = "emittedAt")]
    pub emitted_at: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    pub event: MatchEvent,
}

/// Bounded in-memory log of the most recent events
pub struct EventLog {
    capacity: usize,
    records: Mutex<VecDeque<EventRecord>>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Most recent events, oldest first
    pub fn recent(&self, limit: usize) -> Vec<EventRecord> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let skip = records.len().saturating_sub(limit);
        records.iter().skip(skip).cloned().collect()
    }

    pub fn events(&self) -> Vec<MatchEvent> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.iter().map(|r| r.event.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: &MatchEvent) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(EventRecord {
            id: uuid::Uuid::new_v4(),
            emitted_at: chrono::Utc::now(),
            event: event.clone(),
        });
    }
}

/// Forwards each event to every inner sink
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &MatchEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Identity, ProfileId};

    fn published(id: u64) -> MatchEvent {
        MatchEvent::ProfilePublished {
            profile_id: ProfileId(id),
            owner: Identity::new("alice"),
        }
    }

    #[test]
    fn test_event_log_is_bounded() {
        let log = EventLog::new(2);
        log.emit(&published(1));
        log.emit(&published(2));
        log.emit(&published(3));

        assert_eq!(log.len(), 2);
        assert_eq!(log.events(), vec![published(2), published(3)]);
    }

    #[test]
    fn test_recent_returns_tail() {
        let log = EventLog::new(10);
        for id in 1..=5 {
            log.emit(&published(id));
        }
        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].event, published(5));
    }

    #[test]
    fn test_fanout_reaches_all_sinks() {
        let a = Arc::new(EventLog::new(4));
        let b = Arc::new(EventLog::new(4));
        let fanout = FanoutSink::new()
            .with(a.clone())
            .with(b.clone())
            .with(Arc::new(TracingEventSink));

        fanout.emit(&published(1));

        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }
}
