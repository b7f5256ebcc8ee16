//! Collection caches for computed records.
//!
//! Each collection event kind owns a [`Collection`] with its own eviction
//! policy. User-switch events keep a bounded list of per-switch sessions,
//! each holding its own time-evicted collection.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, SystemTime};

use crate::record::Record;

/// Collection event kinds, also used as metric label values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    BootTime,
    WakeUp,
    UserSwitch,
    Periodic,
    Custom,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 5] = [
        CollectionKind::BootTime,
        CollectionKind::WakeUp,
        CollectionKind::UserSwitch,
        CollectionKind::Periodic,
        CollectionKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::BootTime => "boot_time",
            CollectionKind::WakeUp => "wake_up",
            CollectionKind::UserSwitch => "user_switch",
            CollectionKind::Periodic => "periodic",
            CollectionKind::Custom => "custom",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a collection bounds its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Keep at most `max_size` records, dropping the oldest first.
    Fifo { max_size: usize },
    /// Keep records no older than `retention` relative to the latest append.
    TimeWindow { retention: Duration },
    /// Never evict; cleared explicitly.
    Unbounded,
}

/// Ordered records of one collection, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    policy: EvictionPolicy,
    records: VecDeque<Record>,
}

impl Collection {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            policy,
            records: VecDeque::new(),
        }
    }

    pub fn fifo(max_size: usize) -> Self {
        Self::new(EvictionPolicy::Fifo { max_size })
    }

    pub fn time_window(retention: Duration) -> Self {
        Self::new(EvictionPolicy::TimeWindow { retention })
    }

    pub fn unbounded() -> Self {
        Self::new(EvictionPolicy::Unbounded)
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Appends `record` and returns how many records were evicted.
    pub fn append(&mut self, record: Record, now: SystemTime) -> usize {
        let evicted = match self.policy {
            EvictionPolicy::Fifo { max_size } => {
                let mut evicted = 0;
                while !self.records.is_empty() && self.records.len() >= max_size {
                    self.records.pop_front();
                    evicted += 1;
                }
                evicted
            }
            EvictionPolicy::TimeWindow { .. } => self.sweep(now),
            EvictionPolicy::Unbounded => 0,
        };
        self.records.push_back(record);
        evicted
    }

    /// Drops records older than the retention window. Only time-windowed
    /// collections are affected; a record exactly at the boundary is kept.
    pub fn sweep(&mut self, now: SystemTime) -> usize {
        let EvictionPolicy::TimeWindow { retention } = self.policy else {
            return 0;
        };
        let Some(cutoff) = now.checked_sub(retention) else {
            return 0;
        };
        let before = self.records.len();
        while self.records.front().is_some_and(|r| r.time < cutoff) {
            self.records.pop_front();
        }
        before - self.records.len()
    }

    /// Removes every record and returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let cleared = self.records.len();
        self.records.clear();
        cleared
    }

    pub fn records(&self) -> &VecDeque<Record> {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&Record> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Time spanned by the oldest and newest record.
    pub fn duration(&self) -> Duration {
        match (self.records.front(), self.records.back()) {
            (Some(first), Some(last)) => last.time.duration_since(first.time).unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }
}

/// Records collected during one user switch.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSwitchCollection {
    pub from_user: u32,
    pub to_user: u32,
    pub collection: Collection,
}

impl UserSwitchCollection {
    fn matches(&self, from_user: u32, to_user: u32) -> bool {
        self.from_user == from_user && self.to_user == to_user
    }
}

/// Outcome of appending to the user-switch sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserSwitchAppend {
    /// Records dropped from the target session by time eviction.
    pub evicted_records: usize,
    /// Records dropped along with an evicted session.
    pub evicted_session_records: usize,
    pub session_evicted: bool,
    pub new_session: bool,
}

/// Bounded list of user-switch sessions, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSwitchCollections {
    max_sessions: usize,
    retention: Duration,
    sessions: VecDeque<UserSwitchCollection>,
}

impl UserSwitchCollections {
    pub fn new(max_sessions: usize, retention: Duration) -> Self {
        Self {
            max_sessions,
            retention,
            sessions: VecDeque::new(),
        }
    }

    /// Newest record of the session an append for `from -> to` would land in.
    pub fn previous(&self, from_user: u32, to_user: u32) -> Option<&Record> {
        self.sessions
            .back()
            .filter(|s| s.matches(from_user, to_user))
            .and_then(|s| s.collection.last())
    }

    /// Appends `record` to the open session for `from -> to`, opening a new
    /// session (and evicting the oldest at capacity) when the most recent
    /// session is for a different switch.
    pub fn append(
        &mut self,
        from_user: u32,
        to_user: u32,
        record: Record,
        now: SystemTime,
    ) -> UserSwitchAppend {
        let mut outcome = UserSwitchAppend::default();

        let continues = self
            .sessions
            .back()
            .is_some_and(|s| s.matches(from_user, to_user));
        if !continues {
            while !self.sessions.is_empty() && self.sessions.len() >= self.max_sessions {
                if let Some(oldest) = self.sessions.pop_front() {
                    outcome.evicted_session_records += oldest.collection.len();
                    outcome.session_evicted = true;
                }
            }
            self.sessions.push_back(UserSwitchCollection {
                from_user,
                to_user,
                collection: Collection::time_window(self.retention),
            });
            outcome.new_session = true;
        }

        if let Some(session) = self.sessions.back_mut() {
            outcome.evicted_records = session.collection.append(record, now);
        }
        outcome
    }

    /// Time-evicts every session and drops sessions left without records.
    /// Returns the number of records removed.
    pub fn sweep(&mut self, now: SystemTime) -> usize {
        let mut evicted = 0;
        for session in self.sessions.iter_mut() {
            evicted += session.collection.sweep(now);
        }
        self.sessions.retain(|s| !s.collection.is_empty());
        evicted
    }

    pub fn clear(&mut self) -> usize {
        let cleared = self.record_count();
        self.sessions.clear();
        cleared
    }

    pub fn sessions(&self) -> &VecDeque<UserSwitchCollection> {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.sessions.iter().map(|s| s.collection.len()).sum()
    }
}
