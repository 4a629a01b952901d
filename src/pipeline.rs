use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    thread::JoinHandle,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};
use parking_lot::Mutex;

use crate::{
    error::LabelError,
    font_system::FontBackend,
    label::LabelConfig,
    render_state::RenderState,
    text::{Size, StyledBuffer},
};

/// Called once on the presentation thread with the new content size.
pub type Completion = Box<dyn FnOnce(Size) + Send>;

/// An append that arrived while another computation was in flight.
pub(crate) struct PendingRequest {
    buffer: StyledBuffer,
    completion: Completion,
}

/// Work sent to the layout worker.
enum WorkerCommand {
    Layout {
        buffer: StyledBuffer,
        width: f32,
        completion: Completion,
    },
    Shutdown,
}

/// A finished computation waiting to be published.
pub(crate) struct Computed {
    pub state: RenderState,
    pub completion: Completion,
}

/// State shared by the presentation thread and every appender.
///
/// The in-flight flag and the pending queue each have their own lock. Both
/// are only held for flag or queue updates, and when both are needed the
/// flag is always locked first.
struct Shared {
    in_flight: Mutex<bool>,
    pending: Mutex<VecDeque<PendingRequest>>,
    commands: Sender<WorkerCommand>,
    /// Layout width as `f32` bits.
    width: AtomicU32,
    /// Set once the pipeline is dropped; later appends are discarded.
    closed: AtomicBool,
}

impl Shared {
    fn submit(&self, buffer: StyledBuffer, completion: Completion) {
        if buffer.is_empty() {
            log::trace!("Ignoring append of an empty buffer.");
            return;
        }

        let mut in_flight = self.in_flight.lock();
        if self.closed.load(Ordering::Acquire) {
            log::warn!("Label is gone; dropping append of {} units.", buffer.len());
            return;
        }
        if *in_flight {
            let mut pending = self.pending.lock();
            pending.push_back(PendingRequest { buffer, completion });
            log::trace!("Computation in flight; queued append ({} pending).", pending.len());
            return;
        }
        *in_flight = true;
        drop(in_flight);

        log::trace!("Idle; dispatching append of {} units.", buffer.len());
        self.dispatch(PendingRequest { buffer, completion });
    }

    fn dispatch(&self, request: PendingRequest) {
        let width = f32::from_bits(self.width.load(Ordering::Acquire));
        let command = WorkerCommand::Layout {
            buffer: request.buffer,
            width,
            completion: request.completion,
        };
        if self.commands.send(command).is_err() {
            log::error!("Layout worker is gone; dropping append.");
            *self.in_flight.lock() = false;
        }
    }
}

/// Clonable handle for appending content from any thread.
#[derive(Clone)]
pub struct ContentAppender {
    shared: Arc<Shared>,
}

impl ContentAppender {
    /// Queues `buffer` as the new content.
    ///
    /// `buffer` is a full snapshot of the content, not a delta. `on_complete`
    /// runs on the presentation thread once the snapshot has been published.
    /// Empty buffers are ignored and their callback never runs.
    pub fn append_content(
        &self,
        buffer: StyledBuffer,
        on_complete: impl FnOnce(Size) + Send + 'static,
    ) {
        self.shared.submit(buffer, Box::new(on_complete));
    }
}

impl std::fmt::Debug for ContentAppender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentAppender").finish_non_exhaustive()
    }
}

/// Single-flight layout pipeline.
///
/// At most one computation runs at a time on a dedicated worker thread.
/// Appends that arrive meanwhile wait in a FIFO queue and are dispatched one
/// by one, in arrival order, after each result has been published.
pub(crate) struct Pipeline {
    shared: Arc<Shared>,
    results: Receiver<Computed>,
    /// Requests taken from the shared queue, still to be dispatched.
    draining: VecDeque<PendingRequest>,
    worker: Option<JoinHandle<()>>,
}

impl Pipeline {
    pub fn spawn(
        config: Arc<LabelConfig>,
        backend: Arc<dyn FontBackend>,
        width: f32,
    ) -> Result<Self, LabelError> {
        let (command_tx, command_rx) = unbounded::<WorkerCommand>();
        let (result_tx, result_rx) = unbounded::<Computed>();

        let worker = std::thread::Builder::new()
            .name(config.worker_name.clone())
            .spawn(move || run_worker(command_rx, result_tx, config, backend))
            .map_err(LabelError::WorkerSpawn)?;

        Ok(Self {
            shared: Arc::new(Shared {
                in_flight: Mutex::new(false),
                pending: Mutex::new(VecDeque::new()),
                commands: command_tx,
                width: AtomicU32::new(width.to_bits()),
                closed: AtomicBool::new(false),
            }),
            results: result_rx,
            draining: VecDeque::new(),
            worker: Some(worker),
        })
    }

    pub fn appender(&self) -> ContentAppender {
        ContentAppender {
            shared: self.shared.clone(),
        }
    }

    pub fn submit(&self, buffer: StyledBuffer, completion: Completion) {
        self.shared.submit(buffer, completion);
    }

    /// Width used for computations dispatched from now on.
    pub fn set_width(&self, width: f32) {
        self.shared.width.store(width.to_bits(), Ordering::Release);
    }

    /// `Ok(None)` when no result is ready yet.
    pub fn try_recv(&self) -> Result<Option<Computed>, LabelError> {
        match self.results.try_recv() {
            Ok(computed) => Ok(Some(computed)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LabelError::WorkerDisconnected),
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Computed>, LabelError> {
        match self.results.recv_timeout(timeout) {
            Ok(computed) => Ok(Some(computed)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(LabelError::WorkerDisconnected),
        }
    }

    /// Moves on after a result has been published.
    ///
    /// Dispatches the next pending request, or returns to idle when nothing
    /// is waiting. The shared queue is emptied in one step and its requests
    /// are then dispatched one at a time.
    pub fn finish(&mut self) {
        if self.draining.is_empty() {
            let mut in_flight = self.shared.in_flight.lock();
            let mut pending = self.shared.pending.lock();
            if pending.is_empty() {
                *in_flight = false;
                log::trace!("Pending queue empty; pipeline idle.");
                return;
            }
            self.draining.extend(pending.drain(..));
            log::trace!("Draining {} pending appends.", self.draining.len());
        }

        if let Some(next) = self.draining.pop_front() {
            self.shared.dispatch(next);
        }
    }

    pub fn is_idle(&self) -> bool {
        let in_flight = self.shared.in_flight.lock();
        !*in_flight && self.draining.is_empty() && self.shared.pending.lock().is_empty()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        {
            let _in_flight = self.shared.in_flight.lock();
            self.shared.closed.store(true, Ordering::Release);
            self.shared.pending.lock().clear();
        }
        // Appenders may outlive the pipeline and keep the channel open.
        let _ = self.shared.commands.send(WorkerCommand::Shutdown);
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            log::error!("Layout worker panicked.");
        }
    }
}

fn run_worker(
    commands: Receiver<WorkerCommand>,
    results: Sender<Computed>,
    config: Arc<LabelConfig>,
    backend: Arc<dyn FontBackend>,
) {
    while let Ok(command) = commands.recv() {
        match command {
            WorkerCommand::Layout {
                buffer,
                width,
                completion,
            } => {
                let state = RenderState::compute(buffer, width, &config, backend.as_ref());
                if results.send(Computed { state, completion }).is_err() {
                    break;
                }
            }
            WorkerCommand::Shutdown => break,
        }
    }
    log::trace!("Layout worker exiting.");
}
