//! Worker execution channel.
//!
//! One worker thread runs jobs strictly in submission order; a dispatcher
//! thread routes the worker's `{id, event}` messages to the handle that
//! submitted the job. Many callers can have jobs in flight at once, but
//! they queue behind each other rather than running in parallel.
//!
//! ```text
//! submit() --request--> [worker: FIFO] --WorkerMessage--> [dispatcher] --event--> JobHandle
//! ```
//!
//! Every submitted job resolves with exactly one terminal event, even when
//! the transcoder panics or the worker has shut down.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, trace, warn};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::error::TranscodeError;
use crate::pipeline::{panic_message, Transcoder};
use crate::request::{CorrelationId, ProcessRequest, ProcessResult};

/// Why a job produced no result.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    /// The job panicked inside the worker; the worker kept running.
    #[error("Worker panicked: {0}")]
    Panicked(String),

    /// The worker shut down before the job resolved.
    #[error("Worker is no longer running")]
    Disconnected,

    /// Another job with the same id is still in flight.
    #[error("Job id is already in flight")]
    DuplicateId,
}

impl JobError {
    /// Category name used on the wire.
    pub fn kind_str(&self) -> &'static str {
        match self {
            JobError::Transcode(e) => e.kind().as_str(),
            JobError::Panicked(_) => "panicked",
            JobError::Disconnected => "disconnected",
            JobError::DuplicateId => "duplicateId",
        }
    }
}

/// A terminal failure, tagged with the job it belongs to.
#[derive(Debug, Error)]
#[error("{id}: {error}")]
pub struct JobFailure {
    pub id: CorrelationId,
    #[source]
    pub error: JobError,
}

/// One message posted by the worker.
#[derive(Debug)]
pub enum WorkerEvent {
    Progress { progress: u8 },
    Complete { result: ProcessResult },
    Error { error: JobError },
}

impl WorkerEvent {
    /// The `type` tag on the wire.
    pub fn type_name(&self) -> &'static str {
        match self {
            WorkerEvent::Progress { .. } => "progress",
            WorkerEvent::Complete { .. } => "complete",
            WorkerEvent::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkerEvent::Progress { .. })
    }
}

/// A worker event addressed to a job.
///
/// Serializes flat, as `{"id", "type", ...payload}`:
/// `progress` carries `progress`, `complete` carries `result`, and `error`
/// carries `error` (the message) and `kind`.
#[derive(Debug)]
pub struct WorkerMessage {
    pub id: CorrelationId,
    pub event: WorkerEvent,
}

impl Serialize for WorkerMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("type", self.event.type_name())?;
        match &self.event {
            WorkerEvent::Progress { progress } => map.serialize_entry("progress", progress)?,
            WorkerEvent::Complete { result } => map.serialize_entry("result", result)?,
            WorkerEvent::Error { error } => {
                map.serialize_entry("error", &error.to_string())?;
                map.serialize_entry("kind", error.kind_str())?;
            }
        }
        map.end()
    }
}

type Subscribers = DashMap<CorrelationId, Sender<WorkerEvent>>;

/// A single-threaded transcode worker.
pub struct Worker {
    requests: Option<Sender<ProcessRequest>>,
    subscribers: Arc<Subscribers>,
    threads: Vec<JoinHandle<()>>,
}

impl Worker {
    /// Start the worker and dispatcher threads.
    ///
    /// # Errors
    ///
    /// Returns an error if a thread cannot be spawned.
    pub fn spawn(transcoder: Arc<Transcoder>) -> std::io::Result<Self> {
        let (request_tx, request_rx) = channel::unbounded::<ProcessRequest>();
        let (message_tx, message_rx) = channel::unbounded::<WorkerMessage>();
        let subscribers: Arc<Subscribers> = Arc::new(DashMap::new());

        let worker = thread::Builder::new()
            .name("pixelswift-worker".to_string())
            .spawn(move || {
                for request in request_rx {
                    run_job(&transcoder, request, &message_tx);
                }
                debug!("worker queue closed");
            })?;

        let routes = Arc::clone(&subscribers);
        let dispatcher = thread::Builder::new()
            .name("pixelswift-dispatch".to_string())
            .spawn(move || {
                for message in message_rx {
                    dispatch(&routes, message);
                }
            })?;

        Ok(Self {
            requests: Some(request_tx),
            subscribers,
            threads: vec![worker, dispatcher],
        })
    }

    /// Queue a job. The request, and its source buffer, move into the worker.
    ///
    /// Ids must be unique among in-flight jobs. A request whose id is still
    /// in flight is not queued; its handle resolves to
    /// [`JobError::DuplicateId`] and the earlier job is unaffected.
    pub fn submit(&self, request: ProcessRequest) -> JobHandle {
        let id = request.id();
        let (tx, rx) = channel::unbounded();

        // Subscribe first so no message can arrive before its route exists
        match self.subscribers.entry(id) {
            Entry::Occupied(_) => {
                warn!("{id} is already in flight, rejecting resubmission");
                return JobHandle::resolved(id, rx, Err(JobError::DuplicateId));
            }
            Entry::Vacant(slot) => {
                slot.insert(tx);
            }
        }

        let queued = match &self.requests {
            Some(queue) => queue.send(request).is_ok(),
            None => false,
        };

        if queued {
            JobHandle::new(id, rx)
        } else {
            self.subscribers.remove(&id);
            JobHandle::resolved(id, rx, Err(JobError::Disconnected))
        }
    }

    /// Jobs submitted but not yet resolved.
    pub fn in_flight(&self) -> usize {
        self.subscribers.len()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the queue lets the worker drain what is already queued
        self.requests.take();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked during shutdown");
            }
        }
    }
}

fn run_job(transcoder: &Transcoder, request: ProcessRequest, messages: &Sender<WorkerMessage>) {
    let id = request.id();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        transcoder.process_with_progress(request, &mut |progress| {
            post(messages, id, WorkerEvent::Progress { progress });
        })
    }));

    let event = match outcome {
        Ok(Ok(result)) => WorkerEvent::Complete { result },
        Ok(Err(e)) => WorkerEvent::Error { error: e.into() },
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!("{id} panicked in worker: {message}");
            WorkerEvent::Error {
                error: JobError::Panicked(message),
            }
        }
    };
    post(messages, id, event);
}

fn post(messages: &Sender<WorkerMessage>, id: CorrelationId, event: WorkerEvent) {
    if messages.send(WorkerMessage { id, event }).is_err() {
        trace!("dispatcher gone, dropping message for {id}");
    }
}

fn dispatch(subscribers: &Subscribers, message: WorkerMessage) {
    let WorkerMessage { id, event } = message;

    let delivered = if event.is_terminal() {
        subscribers
            .remove(&id)
            .map(|(_, tx)| tx.send(event).is_ok())
    } else {
        subscribers.get(&id).map(|tx| tx.send(event).is_ok())
    };

    match delivered {
        Some(true) => {}
        Some(false) => trace!("listener for {id} stopped listening"),
        None => trace!("no subscriber for {id}"),
    }
}

/// The caller's side of one submitted job.
pub struct JobHandle {
    id: CorrelationId,
    events: Receiver<WorkerEvent>,
    outcome: Option<Result<ProcessResult, JobError>>,
    handed_out: bool,
}

impl JobHandle {
    fn new(id: CorrelationId, events: Receiver<WorkerEvent>) -> Self {
        Self {
            id,
            events,
            outcome: None,
            handed_out: false,
        }
    }

    fn resolved(
        id: CorrelationId,
        events: Receiver<WorkerEvent>,
        outcome: Result<ProcessResult, JobError>,
    ) -> Self {
        Self {
            id,
            events,
            outcome: Some(outcome),
            handed_out: false,
        }
    }

    pub fn id(&self) -> CorrelationId {
        self.id
    }

    /// Progress percentages as they arrive. Blocks between updates and
    /// ends once the job resolves.
    pub fn progress(&mut self) -> Progress<'_> {
        Progress { handle: self }
    }

    /// The result if the job has resolved, without blocking.
    ///
    /// Returns `Some` at most once; progress updates seen while polling
    /// are discarded.
    pub fn try_result(&mut self) -> Option<Result<ProcessResult, JobFailure>> {
        while !self.is_settled() {
            match self.events.try_recv() {
                Ok(event) => {
                    self.absorb(event);
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => self.outcome = Some(Err(JobError::Disconnected)),
            }
        }
        self.take()
    }

    /// Block until the job resolves.
    ///
    /// If [`try_result`](Self::try_result) already handed the result out,
    /// this returns [`JobError::Disconnected`].
    pub fn wait(mut self) -> Result<ProcessResult, JobFailure> {
        while !self.is_settled() {
            match self.events.recv() {
                Ok(event) => {
                    self.absorb(event);
                }
                Err(_) => self.outcome = Some(Err(JobError::Disconnected)),
            }
        }
        self.take().unwrap_or(Err(JobFailure {
            id: self.id,
            error: JobError::Disconnected,
        }))
    }

    /// Record a terminal event; progress is returned for the caller.
    fn absorb(&mut self, event: WorkerEvent) -> Option<u8> {
        match event {
            WorkerEvent::Progress { progress } => return Some(progress),
            WorkerEvent::Complete { result } => self.outcome = Some(Ok(result)),
            WorkerEvent::Error { error } => self.outcome = Some(Err(error)),
        }
        None
    }

    /// Resolved, whether or not the result has been taken yet.
    fn is_settled(&self) -> bool {
        self.handed_out || self.outcome.is_some()
    }

    fn take(&mut self) -> Option<Result<ProcessResult, JobFailure>> {
        let id = self.id;
        let outcome = self.outcome.take()?;
        self.handed_out = true;
        Some(outcome.map_err(|error| JobFailure { id, error }))
    }
}

/// Iterator over a job's progress updates, see [`JobHandle::progress`].
pub struct Progress<'a> {
    handle: &'a mut JobHandle,
}

impl Iterator for Progress<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        while !self.handle.is_settled() {
            match self.handle.events.recv() {
                Ok(event) => {
                    if let Some(pct) = self.handle.absorb(event) {
                        return Some(pct);
                    }
                }
                Err(_) => self.handle.outcome = Some(Err(JobError::Disconnected)),
            }
        }
        None
    }
}
