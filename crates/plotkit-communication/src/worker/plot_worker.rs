//! Background plot execution.
//!
//! A [`PlotWorker`] owns one [`Machine`] on a dedicated thread and
//! drives it from a command queue. The thread polls the queue,
//! handles one command per tick, and pushes every result onto an
//! outbound queue so callers never block on hardware.
//!
//! Two commands never travel through the queue: PAUSE and CANCEL run
//! on the caller's thread as atomic flag writes, because while a plot
//! streams the worker thread is inside the protocol loop (and while
//! paused it is busy-waiting there) and cannot service the queue in
//! time to matter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use plotkit_core::{Error, Result, WorkerError};
use plotkit_toolpath::post::GcodePost;
use serde_json::{json, Value};

use crate::machine::Machine;
use crate::worker::command::{Request, WorkerCommand};
use crate::worker::response::{Response, Status};

/// Queue poll interval of the worker thread.
const TICK: Duration = Duration::from_millis(50);

/// Lifecycle of the worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Idle, accepting any command.
    Ready,
    /// Streaming a program.
    Busy,
    /// Streaming suspended at a line boundary.
    Paused,
    /// A fatal error was reported; the thread is winding down.
    Dying,
    /// The thread has exited.
    Dead,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            WorkerState::Ready => "READY",
            WorkerState::Busy => "BUSY",
            WorkerState::Paused => "PAUSED",
            WorkerState::Dying => "DYING",
            WorkerState::Dead => "DEAD",
        })
    }
}

/// One progress report from an active plot: the line just handed to
/// the protocol, its index, and the program length.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub index: usize,
    pub total: usize,
    pub command: String,
}

/// Handle to the worker thread. Cloneable it is not; the handle owns
/// the outbound queues and the thread's lifetime.
pub struct PlotWorker {
    inbound: Sender<String>,
    outbound: Receiver<String>,
    // Results for flag-write commands are pushed from the caller's
    // thread onto the same queue the worker uses.
    outbound_tx: Sender<String>,
    progress: Receiver<Progress>,
    state: Arc<Mutex<WorkerState>>,
    die: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    proto_die: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PlotWorker {
    /// Spawns the worker thread and hands it the machine.
    pub fn spawn(machine: Machine) -> Result<PlotWorker> {
        let (in_tx, in_rx) = mpsc::channel();
        let (out_tx, out_rx) = mpsc::channel();
        let (prog_tx, prog_rx) = mpsc::channel();
        let state = Arc::new(Mutex::new(WorkerState::Ready));
        let die = Arc::new(AtomicBool::new(false));
        let cancel = Arc::new(AtomicBool::new(false));
        let paused = machine.protocol.pause_flag();
        let proto_die = machine.protocol.die_flag();

        let mut inner = Worker {
            machine,
            inbound: in_rx,
            outbound: out_tx.clone(),
            progress: prog_tx,
            state: Arc::clone(&state),
            die: Arc::clone(&die),
            cancel: Arc::clone(&cancel),
            program: None,
        };
        let thread = thread::Builder::new()
            .name("plot-worker".to_string())
            .spawn(move || inner.run())
            .map_err(Error::Io)?;

        Ok(PlotWorker {
            inbound: in_tx,
            outbound: out_rx,
            outbound_tx: out_tx,
            progress: prog_rx,
            state,
            die,
            cancel,
            paused,
            proto_die,
            thread: Some(thread),
        })
    }

    /// Submits one command line. PAUSE and CANCEL take effect here
    /// and now; everything else is queued for the worker thread.
    /// Either way the result arrives on the outbound queue.
    pub fn send(&self, line: &str) -> Result<()> {
        if self.state() == WorkerState::Dead {
            return Err(WorkerError::Dead.into());
        }
        let request = Request::parse(line)?;
        match request.command {
            WorkerCommand::Pause => {
                self.toggle_pause(&request.id);
                Ok(())
            }
            WorkerCommand::Cancel => {
                self.request_cancel(&request.id);
                Ok(())
            }
            _ => self
                .inbound
                .send(line.to_string())
                .map_err(|_| WorkerError::Dead.into()),
        }
    }

    /// Flips the pause flag and mirrors the flip into the state. The
    /// protocol loop observes the flag at its next line boundary.
    fn toggle_pause(&self, id: &str) {
        // Single atomic flip so concurrent PAUSE commands cannot
        // collapse into one toggle.
        let pausing = !self.paused.fetch_xor(true, Ordering::SeqCst);
        {
            let mut state = self.state.lock();
            match (*state, pausing) {
                (WorkerState::Busy, true) => *state = WorkerState::Paused,
                (WorkerState::Paused, false) => *state = WorkerState::Busy,
                _ => {}
            }
        }
        tracing::info!(pausing, "pause toggled");
        let response = Response::ok_with(id, json!({ "paused": pausing }));
        let _ = self.outbound_tx.send(response.to_line());
    }

    /// Arms the cancel flag. Only a paused job may be cancelled; the
    /// flag is consumed by the plot loop right after resume.
    fn request_cancel(&self, id: &str) {
        let response = if self.paused.load(Ordering::SeqCst) {
            self.cancel.store(true, Ordering::SeqCst);
            tracing::info!("cancel armed");
            Response::ok(id)
        } else {
            Response::err(id, &WorkerError::NotPaused.to_string())
        };
        let _ = self.outbound_tx.send(response.to_line());
    }

    /// Next result line, if one is waiting.
    pub fn try_recv(&self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    /// Next result line, waiting up to `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<String> {
        self.outbound.recv_timeout(timeout).ok()
    }

    /// Next progress report, if one is waiting.
    pub fn try_progress(&self) -> Option<Progress> {
        self.progress.try_recv().ok()
    }

    /// Next progress report, waiting up to `timeout`.
    pub fn progress_timeout(&self, timeout: Duration) -> Option<Progress> {
        self.progress.recv_timeout(timeout).ok()
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    pub fn is_dead(&self) -> bool {
        self.state() == WorkerState::Dead
    }

    /// Stops the thread and joins it. An in-flight plot aborts at its
    /// next line boundary; a paused one wakes and aborts.
    pub fn kill(&mut self) {
        self.die.store(true, Ordering::SeqCst);
        self.proto_die.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        *self.state.lock() = WorkerState::Dead;
    }
}

impl Drop for PlotWorker {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.kill();
        }
    }
}

/// Thread-side half: the machine, the queues, and the staged program.
struct Worker {
    machine: Machine,
    inbound: Receiver<String>,
    outbound: Sender<String>,
    progress: Sender<Progress>,
    state: Arc<Mutex<WorkerState>>,
    die: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    program: Option<String>,
}

impl Worker {
    fn run(&mut self) {
        tracing::info!(machine = %self.machine.profile.name, "plot worker started");
        while !self.die.load(Ordering::SeqCst) {
            self.tick();
            thread::sleep(TICK);
        }
        *self.state.lock() = WorkerState::Dead;
        tracing::info!("plot worker stopped");
    }

    /// Services at most one queued command. A FATAL result flips the
    /// worker to DYING and ends the loop on the next pass.
    fn tick(&mut self) {
        match self.inbound.try_recv() {
            Ok(line) => {
                let response = self.dispatch(&line);
                let fatal = response.status == Status::Fatal;
                let _ = self.outbound.send(response.to_line());
                if fatal {
                    *self.state.lock() = WorkerState::Dying;
                    self.die.store(true, Ordering::SeqCst);
                }
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.die.store(true, Ordering::SeqCst);
            }
        }
    }

    fn dispatch(&mut self, line: &str) -> Response {
        let request = match Request::parse(line) {
            Ok(request) => request,
            Err(e) => return Response::err("", &e.to_string()),
        };
        let id = request.id.clone();
        tracing::debug!(id = %id, kind = request.command.kind(), "dispatching");
        let result = match request.command {
            WorkerCommand::Load { program } => self.handle_load(program),
            WorkerCommand::Start => self.handle_start(),
            WorkerCommand::Batch { lines } => self.handle_batch(&lines),
            WorkerCommand::Move { x, y, absolute } => self.handle_move(x, y, absolute),
            WorkerCommand::PenUp => self.send_lines(GcodePost::PEN_UP),
            WorkerCommand::PenDown { depth } => self.handle_pen_down(depth),
            WorkerCommand::Home => self.send_lines(&[GcodePost::HOME]),
            WorkerCommand::Origin => self.send_lines(&[GcodePost::SET_ORIGIN]),
            WorkerCommand::Status => Ok(self.status_payload()),
            // Normally intercepted handle-side; honoured here too so a
            // queue-injected flag command still behaves.
            WorkerCommand::Pause => self.handle_queued_pause(),
            WorkerCommand::Cancel => self.handle_queued_cancel(),
        };
        match result {
            Ok(content) => Response::ok_with(&id, content),
            Err(e) if e.is_fatal() => {
                tracing::error!(error = %e, "fatal device error");
                Response::fatal(&id, &e.to_string())
            }
            Err(e) => Response::err(&id, &e.to_string()),
        }
    }

    fn handle_load(&mut self, program: String) -> Result<Value> {
        if *self.state.lock() != WorkerState::Ready {
            return Err(WorkerError::AlreadyRunning.into());
        }
        let size = program.lines().filter(|l| !l.trim().is_empty()).count();
        tracing::info!(lines = size, "program staged");
        self.program = Some(program);
        Ok(json!({ "size": size }))
    }

    fn handle_start(&mut self) -> Result<Value> {
        let program = self
            .program
            .clone()
            .ok_or::<Error>(WorkerError::NoProgram.into())?;
        {
            let mut state = self.state.lock();
            if *state != WorkerState::Ready {
                return Err(WorkerError::AlreadyRunning.into());
            }
            *state = WorkerState::Busy;
        }

        let machine = &mut self.machine;
        let inbound = &self.inbound;
        let outbound = &self.outbound;
        let progress = &self.progress;
        let state = &self.state;
        let cancel = &self.cancel;
        let mut callback = |index: usize, total: usize, command: &str| -> Result<()> {
            // Keep the queue moving while this thread is stuck in the
            // protocol loop: commands that need the thread get a
            // state-based rejection instead of rotting in the queue.
            if let Ok(line) = inbound.try_recv() {
                let response = busy_dispatch(&line, state);
                let _ = outbound.send(response.to_line());
            }
            if cancel.swap(false, Ordering::SeqCst) {
                // Progress consumers watch this channel, not the result
                // queue; tell them the stream stopped here.
                let _ = progress.send(Progress {
                    index,
                    total,
                    command: "JOB CANCELLED".to_string(),
                });
                return Err(plotkit_core::ProtocolError::Cancelled.into());
            }
            let _ = progress.send(Progress {
                index,
                total,
                command: command.to_string(),
            });
            Ok(())
        };
        let result = machine.plot(&program, Some(&mut callback));

        {
            let mut state = self.state.lock();
            if matches!(*state, WorkerState::Busy | WorkerState::Paused) {
                *state = WorkerState::Ready;
            }
        }
        match result {
            Ok(()) => Ok(Value::Null),
            Err(e) if e.is_cancelled() => {
                tracing::info!("plot cancelled");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn handle_batch(&mut self, lines: &[String]) -> Result<Value> {
        for line in lines {
            self.machine.single(line)?;
        }
        Ok(json!({ "count": lines.len() }))
    }

    fn handle_move(&mut self, x: f64, y: f64, absolute: bool) -> Result<Value> {
        if absolute {
            let target = plotkit_core::Point::new(x, y);
            if !self.machine.profile.limits.contains(&target) {
                return Err(WorkerError::OutOfLimits { x, y }.into());
            }
            self.machine.single("G90")?;
            self.machine.single(&format!("G0 X{x:.2} Y{y:.2}"))?;
        } else {
            self.machine.single("G91")?;
            self.machine.single(&format!("G0 X{x:.2} Y{y:.2}"))?;
            self.machine.single("G90")?;
        }
        Ok(Value::Null)
    }

    fn handle_pen_down(&mut self, depth: Option<u32>) -> Result<Value> {
        match depth {
            Some(depth) => {
                for line in GcodePost::pen_down_to_depth(depth) {
                    self.machine.single(&line)?;
                }
                Ok(Value::Null)
            }
            None => self.send_lines(GcodePost::PEN_DOWN),
        }
    }

    fn send_lines(&mut self, lines: &[&str]) -> Result<Value> {
        for line in lines {
            self.machine.single(line)?;
        }
        Ok(Value::Null)
    }

    fn status_payload(&self) -> Value {
        json!({
            "alive": true,
            "state": self.state.lock().to_string(),
            "staged": self.program.is_some(),
        })
    }

    fn handle_queued_pause(&mut self) -> Result<Value> {
        let pausing = !self
            .machine
            .protocol
            .pause_flag()
            .fetch_xor(true, Ordering::SeqCst);
        let mut state = self.state.lock();
        match (*state, pausing) {
            (WorkerState::Busy, true) => *state = WorkerState::Paused,
            (WorkerState::Paused, false) => *state = WorkerState::Busy,
            _ => {}
        }
        Ok(json!({ "paused": pausing }))
    }

    fn handle_queued_cancel(&mut self) -> Result<Value> {
        if !self.machine.protocol.is_paused() {
            return Err(WorkerError::NotPaused.into());
        }
        self.cancel.store(true, Ordering::SeqCst);
        Ok(Value::Null)
    }
}

/// Dispatch for commands drained while a plot occupies the thread.
/// STATUS still answers truthfully; anything needing the machine is
/// rejected with the current state.
fn busy_dispatch(line: &str, state: &Mutex<WorkerState>) -> Response {
    let request = match Request::parse(line) {
        Ok(request) => request,
        Err(e) => return Response::err("", &e.to_string()),
    };
    match request.command {
        WorkerCommand::Status => Response::ok_with(
            &request.id,
            json!({ "alive": true, "state": state.lock().to_string(), "staged": true }),
        ),
        WorkerCommand::Load { .. } | WorkerCommand::Start => {
            Response::err(&request.id, &WorkerError::AlreadyRunning.to_string())
        }
        other => Response::err(
            &request.id,
            &WorkerError::Busy {
                state: state.lock().to_string(),
                command: other.kind().to_string(),
            }
            .to_string(),
        ),
    }
}
