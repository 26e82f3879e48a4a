use crate::codec::PackedRecord;
use crate::collection::Clock;
use crate::error::PrefsError;
use crate::prefs::PreferenceStore;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use time::Duration;
use time::OffsetDateTime;
use time::macros::datetime;

/// Advances one second on every reading.
#[derive(Debug, Default)]
pub(crate) struct StepClock {
    ticks: AtomicI64,
}

impl StepClock {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl Clock for StepClock {
    fn now(&self) -> OffsetDateTime {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        datetime!(2024-01-01 0:00 UTC) + Duration::seconds(tick)
    }
}

pub(crate) type ScriptedRead = Result<Option<PackedRecord>, PrefsError>;

/// Answers reads from a script and remembers every write.
#[derive(Debug, Default)]
pub(crate) struct ScriptedStore {
    reads: Mutex<VecDeque<ScriptedRead>>,
    read_count: AtomicUsize,
    writes: Mutex<Vec<PackedRecord>>,
}

impl ScriptedStore {
    pub(crate) fn new(reads: Vec<ScriptedRead>) -> Self {
        Self {
            reads: Mutex::new(reads.into()),
            ..Self::default()
        }
    }

    pub(crate) fn read_count(&self) -> usize {
        self.read_count.load(Ordering::SeqCst)
    }

    pub(crate) fn writes(&self) -> Vec<PackedRecord> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl PreferenceStore for ScriptedStore {
    async fn get(&self, _namespace: &str, _key: &str) -> Result<Option<PackedRecord>, PrefsError> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        let next = self.reads.lock().unwrap().pop_front();
        next.unwrap_or(Ok(None))
    }

    fn set(&self, _namespace: &str, _key: &str, record: &PackedRecord) -> Result<(), PrefsError> {
        self.writes.lock().unwrap().push(record.clone());
        Ok(())
    }
}
