//! Debounced autosave for one editing session
//!
//! Edits apply to local state at once and mark the session dirty. A background
//! task waits for a quiet period, then writes the latest snapshot through a
//! [`Persist`] implementation.
//!
//! ```text
//! Clean --edit--> Dirty --quiet period--> Saving --ok--> Clean
//!                   ^                        |
//!                   +-------- failure -------+
//! ```
//!
//! Only one write is in flight per session. Edits made while saving are folded
//! into the next debounce cycle. A failed write keeps the local state, reports
//! [`SyncEvent::SaveFailed`] and waits for the next edit or [`Autosaver::retry`].
//! Dropping every handle abandons a pending timer without writing.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::types::LearnSpaceError;

/// Quiet period for full document saves
pub const DOCUMENT_DEBOUNCE: Duration = Duration::from_secs(1);

/// Quiet period for presentation and default selection saves
pub const SELECTION_DEBOUNCE: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Local state matches the last successful write
    Clean,
    /// Local changes not yet written
    Dirty,
    /// A write is in flight
    Saving,
}

/// Outcome of one write, for non-blocking notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Saved { revision: u64 },
    SaveFailed { revision: u64, error: String },
}

/// One remote write of a full snapshot
#[async_trait::async_trait]
pub trait Persist<T>: Send + Sync {
    async fn persist(&self, snapshot: &T) -> Result<(), LearnSpaceError>;
}

struct Session<T> {
    value: T,
    revision: u64,
    saved_revision: u64,
    state: SyncState,
}

/// Handle to an editing session. Clones share the session.
pub struct Autosaver<T> {
    session: Arc<Mutex<Session<T>>>,
    wake: mpsc::UnboundedSender<()>,
}

impl<T> Clone for Autosaver<T> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            wake: self.wake.clone(),
        }
    }
}

fn lock<T>(session: &Mutex<Session<T>>) -> Result<MutexGuard<'_, Session<T>>, LearnSpaceError> {
    session
        .lock()
        .map_err(|e| LearnSpaceError::Internal(format!("Lock poisoned: {}", e)))
}

impl<T> Autosaver<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start a session whose `initial` state is already persisted.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(
        initial: T,
        persister: Arc<dyn Persist<T>>,
        window: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let session = Arc::new(Mutex::new(Session {
            value: initial,
            revision: 0,
            saved_revision: 0,
            state: SyncState::Clean,
        }));
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(run(
            Arc::clone(&session),
            persister,
            window,
            wake_rx,
            event_tx,
        ));

        (
            Self {
                session,
                wake: wake_tx,
            },
            event_rx,
        )
    }

    /// Replace local state with `f(current)` and restart the quiet period.
    ///
    /// Returns the new local revision.
    pub fn edit<F>(&self, f: F) -> Result<u64, LearnSpaceError>
    where
        F: FnOnce(&T) -> T,
    {
        let revision = {
            let mut session = lock(&self.session)?;
            session.value = f(&session.value);
            session.revision += 1;
            if session.state == SyncState::Clean {
                session.state = SyncState::Dirty;
            }
            session.revision
        };

        self.arm()?;
        Ok(revision)
    }

    /// Restart the quiet period without changing anything, e.g. after a failure
    pub fn retry(&self) -> Result<(), LearnSpaceError> {
        self.arm()
    }

    pub fn state(&self) -> Result<SyncState, LearnSpaceError> {
        Ok(lock(&self.session)?.state)
    }

    /// Current local state
    pub fn snapshot(&self) -> Result<T, LearnSpaceError> {
        Ok(lock(&self.session)?.value.clone())
    }

    /// Revision of the last successful write
    pub fn saved_revision(&self) -> Result<u64, LearnSpaceError> {
        Ok(lock(&self.session)?.saved_revision)
    }

    fn arm(&self) -> Result<(), LearnSpaceError> {
        self.wake
            .send(())
            .map_err(|_| LearnSpaceError::Internal("autosave task has stopped".into()))
    }
}

async fn run<T>(
    session: Arc<Mutex<Session<T>>>,
    persister: Arc<dyn Persist<T>>,
    window: Duration,
    mut wake: mpsc::UnboundedReceiver<()>,
    events: mpsc::UnboundedSender<SyncEvent>,
) where
    T: Clone + Send + Sync + 'static,
{
    while wake.recv().await.is_some() {
        // Every wake during the window restarts it
        loop {
            tokio::select! {
                msg = wake.recv() => {
                    if msg.is_none() {
                        debug!("Autosave session dropped, pending write abandoned");
                        return;
                    }
                }
                _ = tokio::time::sleep(window) => break,
            }
        }

        let (snapshot, revision) = {
            let Ok(mut s) = lock(&session) else { return };
            if s.revision == s.saved_revision {
                s.state = SyncState::Clean;
                continue;
            }
            s.state = SyncState::Saving;
            (s.value.clone(), s.revision)
        };

        let result = persister.persist(&snapshot).await;

        let event = {
            let Ok(mut s) = lock(&session) else { return };
            match result {
                Ok(()) => {
                    s.saved_revision = revision;
                    s.state = if s.revision == revision {
                        SyncState::Clean
                    } else {
                        SyncState::Dirty
                    };
                    debug!(revision, "Autosave complete");
                    SyncEvent::Saved { revision }
                }
                Err(e) => {
                    s.state = SyncState::Dirty;
                    warn!(revision, error = %e, "Autosave failed, local changes kept");
                    SyncEvent::SaveFailed {
                        revision,
                        error: e.public_message(),
                    }
                }
            }
        };

        // Nobody listening is fine
        let _ = events.send(event);
    }

    debug!("Autosave session closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::time::sleep;

    #[derive(Default)]
    struct Recorder {
        writes: Mutex<Vec<Vec<String>>>,
        fail: AtomicBool,
        delay: Option<Duration>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl Recorder {
        fn writes(&self) -> Vec<Vec<String>> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Persist<Vec<String>> for Recorder {
        async fn persist(&self, snapshot: &Vec<String>) -> Result<(), LearnSpaceError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            self.writes.lock().unwrap().push(snapshot.clone());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail.load(Ordering::SeqCst) {
                Err(LearnSpaceError::Http("503 Service Unavailable".into()))
            } else {
                Ok(())
            }
        }
    }

    fn start(
        recorder: &Arc<Recorder>,
        window: Duration,
    ) -> (Autosaver<Vec<String>>, mpsc::UnboundedReceiver<SyncEvent>) {
        let persister: Arc<dyn Persist<Vec<String>>> = recorder.clone();
        Autosaver::spawn(Vec::new(), persister, window)
    }

    fn push(id: &str) -> impl FnOnce(&Vec<String>) -> Vec<String> + '_ {
        move |current| {
            let mut next = current.clone();
            next.push(id.to_string());
            next
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_coalesce_into_one_write() {
        let recorder = Arc::new(Recorder::default());
        let (saver, mut events) = start(&recorder, DOCUMENT_DEBOUNCE);

        assert_eq!(saver.state().unwrap(), SyncState::Clean);
        saver.edit(push("a")).unwrap();
        assert_eq!(saver.state().unwrap(), SyncState::Dirty);
        sleep(Duration::from_millis(300)).await;
        saver.edit(push("b")).unwrap();
        sleep(Duration::from_millis(300)).await;
        saver.edit(push("c")).unwrap();

        sleep(Duration::from_millis(900)).await;
        assert!(recorder.writes().is_empty());

        sleep(Duration::from_millis(200)).await;
        assert_eq!(recorder.writes(), vec![vec!["a", "b", "c"]]);
        assert_eq!(saver.state().unwrap(), SyncState::Clean);
        assert_eq!(events.try_recv().unwrap(), SyncEvent::Saved { revision: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_state_and_does_not_retry() {
        let recorder = Arc::new(Recorder::default());
        recorder.fail.store(true, Ordering::SeqCst);
        let (saver, mut events) = start(&recorder, SELECTION_DEBOUNCE);

        saver.edit(push("a")).unwrap();
        sleep(Duration::from_secs(10)).await;

        assert_eq!(recorder.writes().len(), 1);
        assert_eq!(saver.state().unwrap(), SyncState::Dirty);
        assert_eq!(saver.snapshot().unwrap(), vec!["a"]);
        assert!(matches!(
            events.try_recv().unwrap(),
            SyncEvent::SaveFailed { revision: 1, .. }
        ));

        recorder.fail.store(false, Ordering::SeqCst);
        saver.retry().unwrap();
        sleep(Duration::from_secs(2)).await;

        assert_eq!(recorder.writes().len(), 2);
        assert_eq!(saver.state().unwrap(), SyncState::Clean);
        assert_eq!(saver.saved_revision().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_during_save_wait_for_next_cycle() {
        let recorder = Arc::new(Recorder {
            delay: Some(Duration::from_secs(2)),
            ..Default::default()
        });
        let (saver, _events) = start(&recorder, DOCUMENT_DEBOUNCE);

        saver.edit(push("a")).unwrap();
        sleep(Duration::from_millis(1100)).await;
        assert_eq!(saver.state().unwrap(), SyncState::Saving);

        saver.edit(push("b")).unwrap();
        assert_eq!(saver.state().unwrap(), SyncState::Saving);

        // First write lands at ~3s, leaving the session dirty
        sleep(Duration::from_millis(2000)).await;
        assert_eq!(recorder.writes(), vec![vec!["a"]]);
        assert_eq!(saver.state().unwrap(), SyncState::Dirty);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(recorder.writes(), vec![vec!["a"], vec!["a", "b"]]);
        assert_eq!(recorder.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(saver.state().unwrap(), SyncState::Clean);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_abandons_pending_write() {
        let recorder = Arc::new(Recorder::default());
        let (saver, _events) = start(&recorder, DOCUMENT_DEBOUNCE);

        saver.edit(push("a")).unwrap();
        drop(saver);
        sleep(Duration::from_secs(5)).await;

        assert!(recorder.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_when_clean_writes_nothing() {
        let recorder = Arc::new(Recorder::default());
        let (saver, mut events) = start(&recorder, DOCUMENT_DEBOUNCE);

        saver.retry().unwrap();
        sleep(Duration::from_secs(2)).await;

        assert!(recorder.writes().is_empty());
        assert!(events.try_recv().is_err());
        assert_eq!(saver.state().unwrap(), SyncState::Clean);
    }
}
