// Background worker: runs producers on their own thread.
//
// Architecture: one worker thread, two channels.
//
// - **Control channel** (`mpsc::channel`, host → worker): `Start { payload }`
//   begins a run, `Stop` asks the active run to end. While idle the worker
//   blocks on `recv()`; while running, the run's `ChannelHost` drains the
//   channel with `try_recv()` at every yield point.
// - **Event channel** (`mpsc::sync_channel(EVENT_CAPACITY)`, worker → host):
//   the run's `WorkerEvent`s in order. The bound gives backpressure: a host
//   that stops reading stalls the producer instead of growing a queue.
//
// Control semantics:
// - `Start` while a run is active restarts: the active run is stopped (it
//   still ends with its own `Done`) and the newest pending payload runs
//   next. A later `Stop` discards the pending payload.
// - `Stop` while idle is a no-op.
// - Dropping the control sender (the handle is dropped or shut down) counts
//   as `Stop` for the active run, after which the thread exits.
// - A dropped event receiver also ends the run: nobody is listening.
//
// A panic inside a producer is caught at the run boundary, logged, and
// followed by a `Done` so the host never waits on a run that cannot finish.
// Unwinding drops the run's `Streamer`, which flushes buffered records and a
// last `Progress` first, so the host sees `Batch`, `Progress`, `Done` as
// for any other ending.
// Host and worker share no mutable state; everything crosses the channels.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError};
use std::thread;
use std::time::Duration;

use tracing::{debug, error};

use rhythm_loom_protocol::{ControlMessage, StartPayload, WorkerEvent};

use crate::agglutinate::agglutinate;
use crate::catalog::Catalog;
use crate::enumerate::enumerate;
use crate::error::EngineError;
use crate::stream::Host;

/// Capacity of the worker → host event channel.
pub const EVENT_CAPACITY: usize = 64;

/// `Host` backed by the worker's channels.
struct ChannelHost<'a> {
    control: &'a Receiver<ControlMessage>,
    events: &'a SyncSender<WorkerEvent>,
    stop_requested: bool,
    disconnected: bool,
    listener_gone: bool,
    /// Newest `Start` received during the run.
    pending: Option<StartPayload>,
}

impl Host for ChannelHost<'_> {
    fn emit(&mut self, event: WorkerEvent) {
        if self.listener_gone {
            return;
        }
        if self.events.send(event).is_err() {
            self.listener_gone = true;
        }
    }

    fn should_stop(&mut self) -> bool {
        loop {
            match self.control.try_recv() {
                Ok(ControlMessage::Stop) => {
                    self.stop_requested = true;
                    if self.pending.take().is_some() {
                        debug!("stop discarded a pending restart");
                    }
                }
                Ok(ControlMessage::Start { payload }) => {
                    debug!("start during a run: restarting");
                    self.stop_requested = true;
                    self.pending = Some(payload);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
        self.stop_requested || self.disconnected || self.listener_gone
    }
}

/// Start the worker thread.
pub fn spawn_worker() -> Result<WorkerHandle, EngineError> {
    let (control_tx, control_rx) = mpsc::channel();
    let (event_tx, event_rx) = mpsc::sync_channel(EVENT_CAPACITY);

    let thread = thread::Builder::new()
        .name("rhythm-loom-worker".into())
        .spawn(move || worker_loop(control_rx, event_tx))?;

    Ok(WorkerHandle {
        control: Some(control_tx),
        events: event_rx,
        thread: Some(thread),
    })
}

/// Idle loop: wait for `Start`, run it, then run any restart it left
/// pending. Repeats until the control channel closes.
fn worker_loop(control: Receiver<ControlMessage>, events: SyncSender<WorkerEvent>) {
    let mut pending = None;
    loop {
        let payload = match pending.take() {
            Some(payload) => payload,
            None => match control.recv() {
                Ok(ControlMessage::Start { payload }) => payload,
                Ok(ControlMessage::Stop) => continue,
                Err(_) => break,
            },
        };
        let mut host = ChannelHost {
            control: &control,
            events: &events,
            stop_requested: false,
            disconnected: false,
            listener_gone: false,
            pending: None,
        };
        run_payload(&payload, &mut host);
        if host.disconnected || host.listener_gone {
            break;
        }
        pending = host.pending;
    }
    debug!("worker exiting");
}

fn run_payload(payload: &StartPayload, host: &mut ChannelHost<'_>) {
    if let Err(err) = payload.filters().validate() {
        error!(%err, "rejected start payload");
        host.emit(WorkerEvent::Done);
        return;
    }
    let result = panic::catch_unwind(AssertUnwindSafe(|| match payload {
        StartPayload::Generate { filters } => enumerate(filters, &mut *host),
        StartPayload::Agglutinate { items, filters } => agglutinate(items, filters, &mut *host),
    }));
    if let Err(cause) = result {
        let message = cause
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| cause.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".into());
        error!(%message, "producer panicked; ending run");
        host.emit(WorkerEvent::Done);
    }
}

/// Handle to a running worker. Dropping it disconnects the control channel,
/// which stops any active run and lets the thread exit; `shutdown` does the
/// same and waits for the thread.
pub struct WorkerHandle {
    control: Option<Sender<ControlMessage>>,
    events: Receiver<WorkerEvent>,
    thread: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    fn send(&self, message: ControlMessage) -> Result<(), EngineError> {
        let control = self.control.as_ref().ok_or(EngineError::WorkerGone)?;
        control.send(message).map_err(|_| EngineError::WorkerGone)
    }

    /// Validate the payload's filters and begin a run. During an active run
    /// this stops that run and queues `payload` to start after its `Done`.
    pub fn start(&self, payload: StartPayload) -> Result<(), EngineError> {
        payload.filters().validate()?;
        self.send(ControlMessage::Start { payload })
    }

    /// Request cooperative cancellation of the active run and drop any
    /// queued restart. The run still ends with its final batch, progress and
    /// `Done`.
    pub fn stop(&self) -> Result<(), EngineError> {
        self.send(ControlMessage::Stop)
    }

    /// Block for the next event.
    pub fn recv(&self) -> Result<WorkerEvent, EngineError> {
        self.events.recv().map_err(|_| EngineError::WorkerGone)
    }

    pub fn try_recv(&self) -> Result<Option<WorkerEvent>, EngineError> {
        match self.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(EngineError::WorkerGone),
        }
    }

    /// Wait up to `timeout` for the next event; `Ok(None)` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<WorkerEvent>, EngineError> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::WorkerGone),
        }
    }

    /// Consume events up to and including the run's `Done`, feeding batches
    /// into `catalog` and every event to `on_event` first. Returns the number
    /// of records the catalog did not already hold.
    pub fn drain_run_with<F>(&self, catalog: &mut Catalog, mut on_event: F) -> Result<usize, EngineError>
    where
        F: FnMut(&WorkerEvent) -> io::Result<()>,
    {
        let mut added = 0;
        loop {
            let event = self.recv()?;
            on_event(&event)?;
            let done = event.is_done();
            added += catalog.ingest(event);
            if done {
                return Ok(added);
            }
        }
    }

    pub fn drain_run_into(&self, catalog: &mut Catalog) -> Result<usize, EngineError> {
        self.drain_run_with(catalog, |_| Ok(()))
    }

    /// Stop any active run, discard its remaining events and join the thread.
    pub fn shutdown(mut self) -> Result<(), EngineError> {
        if let Some(control) = self.control.take() {
            let _ = control.send(ControlMessage::Stop);
        }
        while self.events.recv().is_ok() {}
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| EngineError::WorkerGone),
            None => Ok(()),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.control.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhythm_loom_protocol::{FilterConfig, Radix};

    fn small_generate() -> StartPayload {
        StartPayload::Generate {
            filters: FilterConfig {
                radix: Radix::Binary,
                ..FilterConfig::exhaustive()
            },
        }
    }

    #[test]
    fn invalid_filters_are_rejected_before_sending() {
        let worker = spawn_worker().unwrap();
        let bad = StartPayload::Generate {
            filters: FilterConfig {
                numerator: 0,
                ..FilterConfig::default()
            },
        };
        assert!(matches!(worker.start(bad), Err(EngineError::Config(_))));
        assert!(worker.recv_timeout(Duration::from_millis(50)).unwrap().is_none());
        worker.shutdown().unwrap();
    }

    #[test]
    fn idle_stop_is_a_noop() {
        let worker = spawn_worker().unwrap();
        worker.stop().unwrap();
        worker.start(small_generate()).unwrap();
        let mut catalog = Catalog::new();
        assert_eq!(worker.drain_run_into(&mut catalog).unwrap(), 16);
        worker.shutdown().unwrap();
    }

    #[test]
    fn on_event_sees_the_whole_stream() {
        let worker = spawn_worker().unwrap();
        worker.start(small_generate()).unwrap();
        let mut kinds = Vec::new();
        let mut catalog = Catalog::new();
        worker
            .drain_run_with(&mut catalog, |event| {
                kinds.push(match event {
                    WorkerEvent::Meta { .. } => "meta",
                    WorkerEvent::Batch { .. } => "batch",
                    WorkerEvent::Progress { .. } => "progress",
                    WorkerEvent::Done => "done",
                });
                Ok(())
            })
            .unwrap();
        assert_eq!(kinds, vec!["batch", "progress", "done"]);
        worker.shutdown().unwrap();
    }

    #[test]
    fn callback_errors_propagate() {
        let worker = spawn_worker().unwrap();
        worker.start(small_generate()).unwrap();
        let mut catalog = Catalog::new();
        let err = worker
            .drain_run_with(&mut catalog, |_| Err(io::Error::other("disk full")))
            .unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
        worker.shutdown().unwrap();
    }

    /// A hex 4/4 space is never exhausted within a test.
    fn endless_generate() -> StartPayload {
        StartPayload::Generate {
            filters: FilterConfig {
                radix: Radix::Hex,
                numerator: 4,
                denominator: 4,
                ..FilterConfig::exhaustive()
            },
        }
    }

    /// Start an endless run and leave its event channel full, so the worker
    /// is parked in a send and reads every control message queued meanwhile
    /// at one yield point.
    fn parked_worker() -> WorkerHandle {
        let worker = spawn_worker().unwrap();
        worker.start(endless_generate()).unwrap();
        let first = worker.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(first.is_some_and(|e| !e.is_done()));
        thread::sleep(Duration::from_millis(300));
        worker
    }

    #[test]
    fn stop_then_start_runs_the_new_payload() {
        let worker = parked_worker();

        worker.stop().unwrap();
        worker.start(small_generate()).unwrap();

        // The stopped run ends with its own Done...
        let mut stopped = Catalog::new();
        worker.drain_run_into(&mut stopped).unwrap();
        // ...and the restart streams a complete second run.
        let mut restarted = Catalog::new();
        assert_eq!(worker.drain_run_into(&mut restarted).unwrap(), 16);
        assert!(restarted.iter().all(|r| r.radix == Radix::Binary));
        assert!(worker.recv_timeout(Duration::from_millis(100)).unwrap().is_none());
        worker.shutdown().unwrap();
    }

    #[test]
    fn start_during_a_run_restarts_with_the_newest_payload() {
        let worker = parked_worker();

        let octal = StartPayload::Generate {
            filters: FilterConfig {
                radix: Radix::Octal,
                numerator: 1,
                denominator: 1,
                ..FilterConfig::exhaustive()
            },
        };
        worker.start(small_generate()).unwrap();
        worker.start(octal).unwrap();

        let mut stopped = Catalog::new();
        worker.drain_run_into(&mut stopped).unwrap();
        let mut restarted = Catalog::new();
        assert_eq!(worker.drain_run_into(&mut restarted).unwrap(), 8);
        assert!(restarted.iter().all(|r| r.radix == Radix::Octal));
        assert!(worker.recv_timeout(Duration::from_millis(100)).unwrap().is_none());
        worker.shutdown().unwrap();
    }

    #[test]
    fn stop_after_start_discards_the_restart() {
        let worker = parked_worker();

        worker.start(small_generate()).unwrap();
        worker.stop().unwrap();

        let mut stopped = Catalog::new();
        worker.drain_run_into(&mut stopped).unwrap();
        assert!(worker.recv_timeout(Duration::from_millis(200)).unwrap().is_none());
        worker.shutdown().unwrap();
    }

    #[test]
    fn dropped_handle_lets_the_thread_exit() {
        let worker = spawn_worker().unwrap();
        worker.start(small_generate()).unwrap();
        drop(worker);
    }
}
