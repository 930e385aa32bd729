//! Session controller on its own thread.
//!
//! Commands arrive over a crossbeam channel; between commands the loop waits
//! until the next timer deadline and then polls the controller, so timers and
//! commands are handled one at a time on a single thread.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use log::{debug, error, info};
use spin_sleep::{SpinSleeper, SpinStrategy};

use crate::error::SessionError;
use crate::session::{controller::SessionController, params::TestConfig};
use crate::utils::metrics::{EventMarker, SharedTelemetry};

enum Command {
    Start(TestConfig, Sender<Result<(), SessionError>>),
    Stop(Sender<()>),
    AddMarker(String, Sender<Result<EventMarker, SessionError>>),
    Shutdown,
}

pub struct SessionHandle {
    commands: Sender<Command>,
    running: Arc<AtomicBool>,
    telemetry: SharedTelemetry,
    thread: Option<thread::JoinHandle<()>>,
}

impl SessionHandle {
    /// Moves `controller` onto a `session_controller` thread.
    pub fn spawn(controller: SessionController) -> io::Result<Self> {
        let (commands, rx) = unbounded();
        let running = Arc::new(AtomicBool::new(false));
        let telemetry = controller.telemetry();

        let flag = running.clone();
        let thread = thread::Builder::new()
            .name("session_controller".to_string())
            .spawn(move || run_loop(controller, rx, flag))?;

        Ok(Self {
            commands,
            running,
            telemetry,
            thread: Some(thread),
        })
    }

    fn request<T>(&self, build: impl FnOnce(Sender<T>) -> Command) -> Result<T, SessionError> {
        let (reply, response) = bounded(1);
        self.commands
            .send(build(reply))
            .map_err(|_| SessionError::ControllerGone)?;
        response.recv().map_err(|_| SessionError::ControllerGone)
    }

    pub fn start(&self, config: TestConfig) -> Result<(), SessionError> {
        self.request(|reply| Command::Start(config, reply))?
    }

    pub fn stop(&self) -> Result<(), SessionError> {
        self.request(Command::Stop)
    }

    pub fn add_marker(&self, label: impl Into<String>) -> Result<EventMarker, SessionError> {
        let label = label.into();
        self.request(|reply| Command::AddMarker(label, reply))?
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn telemetry(&self) -> SharedTelemetry {
        self.telemetry.clone()
    }

    /// Blocks until the session is idle or `timeout` passes. Returns `true` if idle.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
        let deadline = Instant::now() + timeout;
        while self.is_running() {
            if Instant::now() >= deadline {
                return false;
            }
            sleeper.sleep(Duration::from_millis(10));
        }
        true
    }

    /// Stops any run and joins the controller thread.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // A send error means the loop has already exited.
        let _ = self.commands.send(Command::Shutdown);
        if thread.join().is_err() {
            error!("[Session] controller thread panicked");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_loop(mut controller: SessionController, rx: Receiver<Command>, running: Arc<AtomicBool>) {
    info!("[Session] controller thread started");

    loop {
        let command = match controller.next_deadline() {
            Some(due) => {
                let wait = due.saturating_duration_since(controller.now());
                match rx.recv_timeout(wait) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
        };

        match command {
            Some(Command::Start(config, reply)) => {
                let result = controller.start(config);
                running.store(controller.is_running(), Ordering::Release);
                let _ = reply.send(result);
            }
            Some(Command::Stop(reply)) => {
                controller.stop();
                running.store(false, Ordering::Release);
                let _ = reply.send(());
            }
            Some(Command::AddMarker(label, reply)) => {
                let _ = reply.send(controller.add_marker(&label));
            }
            Some(Command::Shutdown) => break,
            None => {}
        }

        let fired = controller.poll();
        if !fired.is_empty() {
            debug!("[Session] fired {:?}", fired);
        }
        running.store(controller.is_running(), Ordering::Release);
    }

    controller.stop();
    running.store(false, Ordering::Release);
    info!("[Session] controller thread exiting");
}
