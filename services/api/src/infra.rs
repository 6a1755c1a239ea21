use metrics_exporter_prometheus::PrometheusHandle;
use placement_intake::workflows::intake::{IntakeService, Submission, SubmissionStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-progress submissions keyed by session id. Sessions live until closed or until the process
/// exits. Each submission sits behind its own lock so one request at a time may drive it.
#[derive(Default)]
pub(crate) struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<AsyncMutex<Submission>>>>,
    sequence: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionError {
    Unknown,
    Busy,
}

impl SessionRegistry {
    pub(crate) fn open(&self, submission: Submission) -> String {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let session_id = format!("session-{id:06}");
        self.sessions
            .lock()
            .expect("session mutex poisoned")
            .insert(session_id.clone(), Arc::new(AsyncMutex::new(submission)));
        session_id
    }

    fn slot(&self, session_id: &str) -> Option<Arc<AsyncMutex<Submission>>> {
        self.sessions
            .lock()
            .expect("session mutex poisoned")
            .get(session_id)
            .cloned()
    }

    /// Copy of the submission, waiting for any request currently driving it.
    pub(crate) async fn snapshot(&self, session_id: &str) -> Option<Submission> {
        let slot = self.slot(session_id)?;
        let submission = slot.lock().await;
        Some(submission.clone())
    }

    /// Exclusive access for one request. Fails with [`SessionError::Busy`] while another request
    /// holds the session.
    pub(crate) fn claim(
        &self,
        session_id: &str,
    ) -> Result<OwnedMutexGuard<Submission>, SessionError> {
        let slot = self.slot(session_id).ok_or(SessionError::Unknown)?;
        slot.try_lock_owned().map_err(|_| SessionError::Busy)
    }

    /// Drop an abandoned session. A session mid-request is left alone.
    pub(crate) fn close(&self, session_id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().expect("session mutex poisoned");
        let busy = match sessions.get(session_id) {
            Some(slot) => slot.try_lock().is_err(),
            None => return Err(SessionError::Unknown),
        };
        if busy {
            return Err(SessionError::Busy);
        }
        sessions.remove(session_id);
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.lock().expect("session mutex poisoned").len()
    }
}

/// Router state: the intake service plus the live sessions it drives.
pub(crate) struct IntakeApi<S> {
    pub(crate) service: Arc<IntakeService<S>>,
    pub(crate) sessions: Arc<SessionRegistry>,
}

impl<S> Clone for IntakeApi<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

impl<S: SubmissionStore + 'static> IntakeApi<S> {
    pub(crate) fn new(service: Arc<IntakeService<S>>) -> Self {
        Self {
            service,
            sessions: Arc::new(SessionRegistry::default()),
        }
    }
}
