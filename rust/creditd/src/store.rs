use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Mutex;

use crate::error::CoreError;
use crate::model::{CompletionRecord, Semester, Student, Subject};

/// Data access the credit core needs from its backing store.
///
/// Implementations must make `mark_semester_saved` all-or-nothing for one
/// (student, semester) pair, and must publish an invalidation on the change
/// feed after every committed write.
pub trait CreditStore {
    fn fetch_student(&self, roll_no: &str) -> Result<Student, CoreError>;

    fn fetch_subjects(&self) -> Result<Vec<Subject>, CoreError>;

    fn fetch_completion_records(&self, roll_no: &str) -> Result<Vec<CompletionRecord>, CoreError>;

    fn upsert_completion_record(
        &self,
        roll_no: &str,
        subject_id: i64,
        semester: Semester,
        completed: bool,
        saved: bool,
    ) -> Result<CompletionRecord, CoreError>;

    /// Sets `saved` on every existing record of the pair. Returns rows touched.
    fn mark_semester_saved(&self, roll_no: &str, semester: Semester) -> Result<usize, CoreError>;

    /// `None` watches every student.
    fn subscribe_to_changes(&self, roll_no: Option<&str>) -> Subscription;
}

/// Payload-free notice that a student's records changed. Receivers re-fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub roll_no: String,
}

struct Subscriber {
    id: u64,
    roll_no: Option<String>,
    tx: Sender<Invalidation>,
}

#[derive(Default)]
pub struct ChangeFeed {
    next_id: Mutex<u64>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, roll_no: Option<&str>) -> Subscription {
        let (tx, rx) = mpsc::channel();
        let id = {
            let mut next = self.next_id.lock().unwrap_or_else(|e| e.into_inner());
            *next += 1;
            *next
        };
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Subscriber {
                id,
                roll_no: roll_no.map(str::to_string),
                tx,
            });
        tracing::debug!(subscription = id, roll_no = ?roll_no, "change feed subscribed");
        Subscription { id, rx }
    }

    pub fn unsubscribe(&self, id: u64) {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|s| s.id != id);
    }

    /// Signals every subscriber watching `roll_no`. Closed receivers are pruned.
    pub fn publish(&self, roll_no: &str) {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.retain(|s| {
            if s.roll_no.as_deref().is_some_and(|r| r != roll_no) {
                return true;
            }
            s.tx
                .send(Invalidation {
                    roll_no: roll_no.to_string(),
                })
                .is_ok()
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

/// Receiving end of a change-feed subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    rx: Receiver<Invalidation>,
}

impl Subscription {
    /// Drains pending signals and returns the distinct roll numbers touched.
    pub fn drain(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(inv) => {
                    if !out.contains(&inv.roll_no) {
                        out.push(inv.roll_no);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        out
    }
}
