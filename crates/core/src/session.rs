use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

/// Per-call state accumulated across webhook round-trips. Every field is
/// optional; events merge additively and never blank out what an earlier
/// event recorded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CallSession {
    pub tenant_id: Option<String>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub is_open: Option<bool>,
    pub menu_selection: Option<String>,
    pub digit: Option<String>,
    pub call_status: Option<String>,
    pub call_duration: Option<String>,
}

/// Partial update applied by `CallSessionStore::merge`. Only set fields
/// overwrite; `None` leaves the stored value untouched.
#[derive(Clone, Debug, Default)]
pub struct SessionPatch {
    pub tenant_id: Option<String>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub is_open: Option<bool>,
    pub menu_selection: Option<String>,
    pub digit: Option<String>,
    pub call_status: Option<String>,
    pub call_duration: Option<String>,
}

impl CallSession {
    fn apply(&mut self, patch: SessionPatch) {
        if let Some(v) = patch.tenant_id {
            self.tenant_id = Some(v);
        }
        if let Some(v) = patch.from_number {
            self.from_number = Some(v);
        }
        if let Some(v) = patch.to_number {
            self.to_number = Some(v);
        }
        if let Some(v) = patch.is_open {
            self.is_open = Some(v);
        }
        if let Some(v) = patch.menu_selection {
            self.menu_selection = Some(v);
        }
        if let Some(v) = patch.digit {
            self.digit = Some(v);
        }
        if let Some(v) = patch.call_status {
            self.call_status = Some(v);
        }
        if let Some(v) = patch.call_duration {
            self.call_duration = Some(v);
        }
    }
}

struct SessionEntry {
    session: CallSession,
    touched_at: Instant,
}

#[derive(Default)]
struct SessionMap {
    entries: HashMap<String, SessionEntry>,
    // Insertion order; drives capacity eviction independent of TTL.
    order: VecDeque<String>,
}

/// Concurrent short-lived store keyed by call SID.
///
/// Sessions expire after an idle TTL that must outlive the longest expected
/// call plus recording-processing delay. When full, the oldest session by
/// insertion is evicted first. An unknown call SID reads as an empty session,
/// and an empty SID is a no-op on write: webhooks missing the identifier must
/// not become errors.
pub struct CallSessionStore {
    inner: Mutex<SessionMap>,
    ttl: Duration,
    capacity: usize,
}

impl CallSessionStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self { inner: Mutex::new(SessionMap::default()), ttl, capacity: capacity.max(1) }
    }

    pub fn get(&self, call_sid: &str) -> CallSession {
        if call_sid.is_empty() {
            return CallSession::default();
        }
        let mut map = self.lock();
        Self::purge_expired(&mut map, self.ttl);
        map.entries.get(call_sid).map(|entry| entry.session.clone()).unwrap_or_default()
    }

    pub fn merge(&self, call_sid: &str, patch: SessionPatch) {
        if call_sid.is_empty() {
            return;
        }
        let mut map = self.lock();
        Self::purge_expired(&mut map, self.ttl);

        if !map.entries.contains_key(call_sid) {
            while map.entries.len() >= self.capacity {
                let Some(oldest) = map.order.pop_front() else { break };
                map.entries.remove(&oldest);
            }
            map.order.push_back(call_sid.to_owned());
            map.entries.insert(call_sid.to_owned(), SessionEntry {
                session: CallSession::default(),
                touched_at: Instant::now(),
            });
        }

        if let Some(entry) = map.entries.get_mut(call_sid) {
            entry.session.apply(patch);
            entry.touched_at = Instant::now();
            debug!(call_sid = %call_sid, session = ?entry.session, "call session updated");
        }
    }

    pub fn len(&self) -> usize {
        let mut map = self.lock();
        Self::purge_expired(&mut map, self.ttl);
        map.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionMap> {
        // A poisoned lock only means a panic mid-update; stale session data
        // degrades to "unknown" downstream, so keep serving.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn purge_expired(map: &mut SessionMap, ttl: Duration) {
        let now = Instant::now();
        let SessionMap { entries, order } = map;
        entries.retain(|_, entry| now.duration_since(entry.touched_at) < ttl);
        order.retain(|sid| entries.contains_key(sid));
    }
}
