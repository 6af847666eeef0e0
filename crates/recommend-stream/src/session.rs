use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt as _;
use tokio::sync::watch;
use tracing::{Instrument as _, debug, info_span, warn};

use crate::dispatch::{self, SessionSnapshot, SessionState};
use crate::errors::{RecommendError, SessionFailure};
use crate::frame::FrameParser;
use crate::request::RecommendRequest;
use crate::transport::RecommendTransport;

/// Signals the background task of one run to stop consuming chunks.
struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    fn abort(&self) {
        self.tx.send_replace(true);
    }
}

/// Abort sender of the run in flight. Shared by a session and all of its
/// cancel handles; `start` and `reset` swap the contents.
type RunSlot = Arc<Mutex<Option<AbortHandle>>>;

fn lock_run(slot: &Mutex<Option<AbortHandle>>) -> MutexGuard<'_, Option<AbortHandle>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable handle that cancels whichever run its session has in flight
/// when [`cancel`](Self::cancel) is called, including runs started after the
/// handle was taken.
#[derive(Clone)]
pub struct CancelHandle {
    session_id: uuid::Uuid,
    state: Arc<watch::Sender<SessionSnapshot>>,
    run: RunSlot,
}

impl CancelHandle {
    /// Aborts the current run's transport and moves the session to
    /// `Cancelled`.
    ///
    /// No-op when the session is already terminal.
    pub fn cancel(&self) {
        // Held across the state change; `start` swaps runs under this lock.
        let mut run = lock_run(&self.run);
        if let Some(abort) = run.take() {
            abort.abort();
        }
        let cancelled = self.state.send_if_modified(|current| {
            if current.is_terminal() {
                return false;
            }
            *current = dispatch::cancel(std::mem::take(current));
            true
        });
        drop(run);
        if cancelled {
            debug!(session_id = %self.session_id, "recommendation session cancelled");
        }
    }
}

/// One recommendation request from submission to terminal state.
///
/// State is published through a `watch` channel: [`snapshot`](Self::snapshot)
/// reads it, [`subscribe`](Self::subscribe) observes changes. Dropping the
/// session cancels an in-flight run.
pub struct RecommendSession {
    session_id: uuid::Uuid,
    transport: Arc<dyn RecommendTransport>,
    state: Arc<watch::Sender<SessionSnapshot>>,
    run: RunSlot,
}

impl RecommendSession {
    pub(crate) fn new(transport: Arc<dyn RecommendTransport>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            session_id: uuid::Uuid::new_v4(),
            transport,
            state: Arc::new(state),
            run: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the id used in this session's log records.
    pub fn session_id(&self) -> uuid::Uuid {
        self.session_id
    }

    /// Validates the request and starts streaming in a background task.
    ///
    /// Invalid input moves the session to `Failed(InvalidRequest)` and
    /// returns the error without touching the transport. Calling `start` from
    /// `Idle` or any terminal state begins a fresh run; calling it while
    /// `Streaming` returns [`RecommendError::AlreadyStreaming`].
    ///
    /// Must be called within a Tokio runtime.
    pub fn start<I, S>(
        &mut self,
        product_ids: I,
        user_query: Option<String>,
    ) -> Result<(), RecommendError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.state.borrow().state.is_streaming() {
            return Err(RecommendError::AlreadyStreaming);
        }

        let mut run = lock_run(&self.run);
        if let Some(previous) = run.take() {
            previous.abort();
        }

        let request = match RecommendRequest::new(product_ids, user_query) {
            Ok(request) => request,
            Err(err) => {
                debug!(session_id = %self.session_id, error = %err, "rejecting recommendation request");
                self.state
                    .send_replace(SessionSnapshot::failed(SessionFailure::InvalidRequest {
                        message: invalid_request_message(&err),
                    }));
                return Err(err);
            }
        };

        let (abort_tx, abort_rx) = watch::channel(false);
        *run = Some(AbortHandle { tx: abort_tx });
        self.state.send_replace(SessionSnapshot::streaming());
        drop(run);
        debug!(
            session_id = %self.session_id,
            products = request.product_ids.len(),
            has_query = request.user_query.is_some(),
            "recommendation session started"
        );

        let span = info_span!("recommend_session", session_id = %self.session_id);
        tokio::spawn(
            session_task(self.transport.clone(), request, self.state.clone(), abort_rx)
                .instrument(span),
        );
        Ok(())
    }

    /// Cancels the in-flight run. No-op on a terminal session.
    pub fn cancel(&self) {
        self.cancel_handle().cancel();
    }

    /// Returns a handle that can cancel the session's current run from
    /// another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            session_id: self.session_id,
            state: self.state.clone(),
            run: self.run.clone(),
        }
    }

    /// Cancels any in-flight run and returns the session to `Idle`.
    pub fn reset(&mut self) {
        let mut run = lock_run(&self.run);
        if let Some(abort) = run.take() {
            abort.abort();
        }
        self.state.send_replace(SessionSnapshot::default());
    }

    /// Current state and accumulated text.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Waits until the session is no longer `Streaming`.
    pub async fn wait(&self) -> SessionSnapshot {
        let mut rx = self.state.subscribe();
        let settled = match rx.wait_for(|snapshot| !snapshot.state.is_streaming()).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        };
        settled
    }

    /// Waits for the run to end and returns the final text.
    pub async fn finish(&self) -> Result<String, RecommendError> {
        let snapshot = self.wait().await;
        match snapshot.state {
            SessionState::Completed => Ok(snapshot.text),
            SessionState::Failed(failure) => Err(failure.into()),
            SessionState::Cancelled => Err(RecommendError::Cancelled),
            SessionState::Idle => Err(RecommendError::NotStarted),
            SessionState::Streaming => Err(RecommendError::Failed(SessionFailure::IncompleteStream)),
        }
    }
}

impl Drop for RecommendSession {
    fn drop(&mut self) {
        let in_flight = lock_run(&self.run).is_some();
        if in_flight {
            self.cancel();
        }
    }
}

fn invalid_request_message(err: &RecommendError) -> String {
    match err {
        RecommendError::InvalidRequest(message) => message.clone(),
        other => other.to_string(),
    }
}

async fn session_task(
    transport: Arc<dyn RecommendTransport>,
    request: RecommendRequest,
    state: Arc<watch::Sender<SessionSnapshot>>,
    mut abort_rx: watch::Receiver<bool>,
) {
    let abort_flag = abort_rx.clone();

    let opened = tokio::select! {
        biased;
        _ = aborted(&mut abort_rx) => {
            debug!("aborted before stream opened");
            return;
        }
        opened = transport.open_stream(&request) => opened,
    };
    let mut chunks = match opened {
        Ok(chunks) => chunks,
        Err(err) => {
            warn!(error = %err, "failed to open recommendation stream");
            publish(&state, &abort_flag, |s| dispatch::fail(SessionFailure::from(&err), s));
            return;
        }
    };

    let mut parser = FrameParser::new();
    let mut frames_parsed = 0_u64;
    loop {
        tokio::select! {
            biased;
            _ = aborted(&mut abort_rx) => {
                debug!(frames_parsed, "stopped consuming chunks after cancellation");
                return;
            }
            next = chunks.next() => {
                match next {
                    Some(Ok(chunk)) => {
                        for frame in parser.feed(&chunk) {
                            frames_parsed = frames_parsed.saturating_add(1);
                            if !publish(&state, &abort_flag, |s| dispatch::apply(frame, s)) {
                                debug!(frames_parsed, "recommendation stream reached terminal state");
                                return;
                            }
                        }
                        if parser.line_limit_exceeded() {
                            let limit = parser.max_line_len();
                            warn!(limit, frames_parsed, "recommendation stream line exceeded limit");
                            publish(&state, &abort_flag, |s| dispatch::fail(SessionFailure::LineTooLong { limit }, s));
                            return;
                        }
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "recommendation stream failed");
                        publish(&state, &abort_flag, |s| dispatch::fail(SessionFailure::from(&err), s));
                        return;
                    }
                    None => {
                        let discarded_bytes = parser.finish();
                        warn!(frames_parsed, discarded_bytes, "recommendation stream ended without completion");
                        publish(&state, &abort_flag, |s| dispatch::fail(SessionFailure::IncompleteStream, s));
                        return;
                    }
                }
            }
        }
    }
}

/// Applies `step` to the published snapshot unless the run was aborted or is
/// no longer streaming. Returns whether the run is still streaming afterwards.
fn publish(
    state: &watch::Sender<SessionSnapshot>,
    abort_flag: &watch::Receiver<bool>,
    step: impl FnOnce(SessionSnapshot) -> SessionSnapshot,
) -> bool {
    let mut streaming = false;
    state.send_if_modified(|current| {
        if *abort_flag.borrow() || !current.state.is_streaming() {
            return false;
        }
        *current = step(std::mem::take(current));
        streaming = current.state.is_streaming();
        true
    });
    streaming
}

/// Resolves once the run is aborted or its session is gone.
async fn aborted(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
