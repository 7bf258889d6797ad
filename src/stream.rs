//! Sensor streams as explicit bounded queues.
//!
//! The host sensor subsystem calls back on whatever thread it likes. Instead
//! of running the classifier inside that callback, the callback offers the
//! sample to a bounded queue and returns immediately; one task per session
//! owns the `MotionPipeline` and drains the queue, so a sample is fully
//! processed before the next one is looked at.
//!
//! Control commands travel through the same queue, which serializes them
//! with samples without any locking around the session state. Events are
//! offered to their own bounded queue the same way samples are: if the
//! application stops reading, events are dropped and counted, and the task
//! keeps serving samples and control commands.
//!
//! Cancellation is synchronous: `MotionSubscription::cancel` closes every
//! sink handed out, waits for a sample that is mid-delivery, unregisters
//! from the source and drops the event queue before it returns, so nothing
//! is delivered afterwards.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Result, StrideError};
use crate::notify::Notifier;
use crate::pipeline::{ControlCommand, ControlState, MotionPipeline, MotionState, PipelineConfig};
use crate::types::{MotionEvent, MotionSample};

// ============================================================================
// SINKS
// ============================================================================

/// Non-blocking producer end of a bounded queue.
///
/// Handed to the host callback. `offer` never waits: when the queue is full
/// the item is dropped and counted; once the owning subscription is
/// cancelled every offer is rejected.
#[derive(Debug)]
pub struct BoundedSink<T> {
    tx: mpsc::Sender<T>,
    open: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    label: &'static str,
}

impl<T> Clone for BoundedSink<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            open: Arc::clone(&self.open),
            dropped: Arc::clone(&self.dropped),
            label: self.label,
        }
    }
}

impl<T> BoundedSink<T> {
    pub(crate) fn new(tx: mpsc::Sender<T>, label: &'static str) -> Self {
        Self {
            tx,
            open: Arc::new(AtomicBool::new(true)),
            dropped: Arc::new(AtomicU64::new(0)),
            label,
        }
    }

    /// Queue an item. Returns false if it was not accepted.
    pub fn offer(&self, item: T) -> bool {
        if !self.is_open() {
            return false;
        }
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(stream = self.label, dropped, "Queue full, dropping item");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.close();
                false
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Items rejected because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    pub(crate) fn dropped_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }
}

/// Inputs consumed by a motion session task.
#[derive(Debug)]
pub(crate) enum SessionInput {
    Sample(MotionSample),
    Control(ControlCommand, oneshot::Sender<ControlState>),
    Snapshot(oneshot::Sender<MotionState>),
}

/// Sink the accelerometer callback pushes samples into.
#[derive(Debug, Clone)]
pub struct SampleSink {
    inner: BoundedSink<SessionInput>,
}

impl SampleSink {
    /// Queue a sample without blocking. Returns false if it was dropped.
    pub fn offer(&self, sample: MotionSample) -> bool {
        self.inner.offer(SessionInput::Sample(sample))
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    pub fn dropped(&self) -> u64 {
        self.inner.dropped()
    }
}

/// Host accelerometer. Implemented by the platform layer.
pub trait SensorSource: Send + Sync {
    /// Start delivering samples into `sink`. Fails with `SensorUnavailable`
    /// if the device has no accelerometer.
    fn register(&self, sink: SampleSink) -> Result<()>;

    /// Stop delivering samples. Must not return while a callback is still
    /// able to fire.
    fn unregister(&self);
}

// ============================================================================
// CONTROLLER
// ============================================================================

/// Cloneable handle for sending control commands into a running session.
#[derive(Debug, Clone)]
pub struct MotionController {
    tx: mpsc::Sender<SessionInput>,
}

impl MotionController {
    /// Apply a command after every sample queued before it.
    pub async fn send(&self, command: ControlCommand) -> Result<ControlState> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionInput::Control(command, reply_tx))
            .await
            .map_err(|_| StrideError::StreamClosed)?;
        reply_rx.await.map_err(|_| StrideError::StreamClosed)
    }

    /// Parse a command name and apply it.
    pub async fn send_named(&self, name: &str) -> Result<ControlState> {
        let command: ControlCommand = name.parse()?;
        self.send(command).await
    }

    /// Current session state, taken after every queued sample.
    pub async fn snapshot(&self) -> Result<MotionState> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionInput::Snapshot(reply_tx))
            .await
            .map_err(|_| StrideError::StreamClosed)?;
        reply_rx.await.map_err(|_| StrideError::StreamClosed)
    }
}

// ============================================================================
// SUBSCRIPTION
// ============================================================================

/// One active listening session on the accelerometer event stream.
pub struct MotionSubscription {
    source: Arc<dyn SensorSource>,
    sink: SampleSink,
    controller: MotionController,
    events: mpsc::Receiver<MotionEvent>,
    dropped_events: Arc<AtomicU64>,
    live: Arc<RwLock<bool>>,
    task: JoinHandle<()>,
}

impl MotionSubscription {
    /// Build a fresh session, spawn its processing task and attach it to
    /// `source`. Must be called from within a tokio runtime.
    pub fn start(
        source: Arc<dyn SensorSource>,
        notifier: Arc<dyn Notifier>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let capacity = config.queue_capacity;
        let (input_tx, input_rx) = mpsc::channel(capacity);
        let (event_tx, event_rx) = mpsc::channel(capacity);

        let sink = SampleSink {
            inner: BoundedSink::new(input_tx.clone(), "accelerometer"),
        };
        let controller = MotionController { tx: input_tx };
        let event_sink = BoundedSink::new(event_tx, "motion events");
        let dropped_events = event_sink.dropped_counter();
        let live = Arc::new(RwLock::new(true));

        let session = Session {
            pipeline: MotionPipeline::new(config),
            events: event_sink,
            notifier,
            live: Arc::clone(&live),
        };
        let task = tokio::spawn(run_session(session, input_rx));

        if let Err(err) = source.register(sink.clone()) {
            tracing::error!(error = %err, "Accelerometer registration failed");
            sink.inner.close();
            *live.write() = false;
            task.abort();
            return Err(err);
        }

        tracing::info!(queue_capacity = capacity, "Motion subscription started");

        Ok(Self {
            source,
            sink,
            controller,
            events: event_rx,
            dropped_events,
            live,
            task,
        })
    }

    /// Next event, or `None` once the session task has stopped.
    pub async fn next_event(&mut self) -> Option<MotionEvent> {
        self.events.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_next_event(&mut self) -> Option<MotionEvent> {
        self.events.try_recv().ok()
    }

    /// The sink registered with the source.
    pub fn sink(&self) -> SampleSink {
        self.sink.clone()
    }

    pub fn controller(&self) -> MotionController {
        self.controller.clone()
    }

    pub async fn control(&self, command: ControlCommand) -> Result<ControlState> {
        self.controller.send(command).await
    }

    pub async fn snapshot(&self) -> Result<MotionState> {
        self.controller.snapshot().await
    }

    /// Samples dropped because the input queue was full.
    pub fn dropped_samples(&self) -> u64 {
        self.sink.dropped()
    }

    /// Events dropped because nobody was reading them.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// End the session. Waits for a sample that is mid-delivery to finish,
    /// then detaches from the source; nothing is delivered afterwards.
    ///
    /// Must not be called from inside `Notifier::notify`.
    pub fn cancel(self) {
        tracing::info!(dropped = self.sink.dropped(), "Motion subscription cancelled");
        drop(self);
    }
}

impl Drop for MotionSubscription {
    fn drop(&mut self) {
        self.sink.inner.close();
        *self.live.write() = false;
        self.source.unregister();
        self.task.abort();
        self.events.close();
    }
}

/// State owned by a session task.
struct Session {
    pipeline: MotionPipeline,
    events: BoundedSink<MotionEvent>,
    notifier: Arc<dyn Notifier>,
    /// Cleared by cancel. Held for reading while an input is handled.
    live: Arc<RwLock<bool>>,
}

impl Session {
    /// Returns false once the session should stop.
    fn handle(&mut self, input: SessionInput) -> bool {
        let live = self.live.read();
        if !*live {
            return false;
        }

        match input {
            SessionInput::Sample(sample) => {
                let output = self.pipeline.process_sample(&sample);
                for notification in &output.notifications {
                    self.notifier.notify(notification);
                }
                for event in output.events {
                    if !self.events.offer(event) && !self.events.is_open() {
                        tracing::debug!("Event receiver gone, stopping session task");
                        return false;
                    }
                }
            }
            SessionInput::Control(command, reply) => {
                let state = self.pipeline.apply(command);
                let _ = reply.send(state);
            }
            SessionInput::Snapshot(reply) => {
                let _ = reply.send(self.pipeline.state());
            }
        }
        true
    }
}

async fn run_session(mut session: Session, mut inputs: mpsc::Receiver<SessionInput>) {
    while let Some(input) = inputs.recv().await {
        if !session.handle(input) {
            break;
        }
    }
    tracing::debug!(total_samples = session.pipeline.total_samples(), "Session stopped");
}
