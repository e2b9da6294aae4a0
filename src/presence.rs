//! Best-effort liveness of visitor tabs.
//!
//! Tabs beat every `interval`; a conversation with no beat for
//! `OFFLINE_AFTER` intervals is reported offline by the sweeper.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::bus::{Event, EventBus};

const OFFLINE_AFTER: u32 = 3;

/// Outcome of a beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beat {
    /// Already online.
    Steady,
    /// Not tracked (first beat, or swept and already announced offline).
    CameOnline,
    /// Expired before the sweeper got to it, so offline was never announced.
    Resumed,
}

pub struct PresenceTracker {
    interval: Duration,
    last_beat: Mutex<HashMap<String, Instant>>,
}

impl PresenceTracker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_beat: Mutex::new(HashMap::new()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.interval * OFFLINE_AFTER
    }

    /// Record a beat and report which presence events it owes.
    pub fn beat(&self, conversation_id: &str, now: Instant) -> Beat {
        let timeout = self.timeout();
        let mut beats = self.last_beat.lock().unwrap();
        let previous = beats.insert(conversation_id.to_string(), now);
        match previous {
            None => Beat::CameOnline,
            Some(last) if now.saturating_duration_since(last) > timeout => Beat::Resumed,
            Some(_) => Beat::Steady,
        }
    }

    pub fn is_online(&self, conversation_id: &str, now: Instant) -> bool {
        let beats = self.last_beat.lock().unwrap();
        beats
            .get(conversation_id)
            .is_some_and(|last| now.saturating_duration_since(*last) <= self.timeout())
    }

    /// Forget stale conversations and return their ids.
    pub fn sweep(&self, now: Instant) -> Vec<String> {
        let timeout = self.timeout();
        let mut beats = self.last_beat.lock().unwrap();
        let stale: Vec<String> = beats
            .iter()
            .filter(|(_, last)| now.saturating_duration_since(**last) > timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            beats.remove(id);
        }
        stale
    }

    /// Sweep once per interval forever, announcing conversations that went quiet.
    pub async fn run_sweeper(self: Arc<Self>, bus: Arc<EventBus>) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            for conversation_id in self.sweep(Instant::now()) {
                debug!(conversation_id = %conversation_id, "Visitor went offline");
                bus.publish(Event::Presence {
                    conversation_id,
                    online: false,
                });
            }
        }
    }
}
