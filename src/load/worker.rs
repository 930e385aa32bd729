//! Per-core duty-cycle load workers.
//!
//! Each worker:
//! 1. **Core pinning:** optionally pins to its own logical core (best effort, failure ignored).
//! 2. **Duty cycle:** per control period P, reads the shared ratio r and busy-spins for `P * r`.
//! 3. **Drift-free sleep:** sleeps `P - elapsed`, absorbing busy-loop overrun within the period.
//! 4. **Cooperative stop:** the stop flag is observed at cycle boundaries only.

use std::{
    hint::black_box,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, bounded};
use log::{debug, info, warn};
use spin_sleep::{SpinSleeper, SpinStrategy};

use crate::load::{
    affinity::AffinityControl,
    controller::{SharedLoad, clamp_ratio},
};

/// Busy/sleep split of one control period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyCycle {
    pub work: Duration,
    pub sleep: Duration,
}

/// Splits `period` into busy and idle time for `ratio` (clamped to `[0, 1]`).
pub fn duty_cycle(period: Duration, ratio: f64) -> DutyCycle {
    let work = period.mul_f64(clamp_ratio(ratio));
    DutyCycle {
        work,
        sleep: period.saturating_sub(work),
    }
}

/// Keeps the core busy for `duration` on a bounded recurrence the optimizer
/// cannot drop. Returns the accumulator so callers can feed it back in.
pub fn busy_spin(duration: Duration, seed: f64) -> f64 {
    let start = Instant::now();
    let mut x = seed;
    while start.elapsed() < duration {
        x = black_box(x * 1.000_001 + 1.0);
        if x > 1e6 {
            x %= 1.0;
        }
    }
    x
}

/// Thread launcher used by the session; tests swap it to simulate spawn failures.
pub type WorkerSpawner = Box<
    dyn Fn(DutyCycleWorker, Option<Arc<dyn AffinityControl>>) -> io::Result<WorkerHandle> + Send,
>;

/// The default [`WorkerSpawner`].
pub fn spawn_worker_thread(
    worker: DutyCycleWorker,
    affinity: Option<Arc<dyn AffinityControl>>,
) -> io::Result<WorkerHandle> {
    worker.spawn(affinity)
}

pub struct DutyCycleWorker {
    core_id: usize,
    period: Duration,
    load: SharedLoad,
    stop: Arc<AtomicBool>,
}

impl DutyCycleWorker {
    pub fn new(core_id: usize, period: Duration, load: SharedLoad) -> Self {
        Self {
            core_id,
            period,
            load,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn core_id(&self) -> usize {
        self.core_id
    }

    pub fn load(&self) -> &SharedLoad {
        &self.load
    }

    /// Spawns the worker on a named thread. `affinity = None` disables pinning.
    pub fn spawn(self, affinity: Option<Arc<dyn AffinityControl>>) -> io::Result<WorkerHandle> {
        let core_id = self.core_id;
        let stop = self.stop.clone();
        // Dropped when the thread ends, which disconnects `exited`.
        let (exit_guard, exited) = bounded::<()>(0);

        let thread = thread::Builder::new()
            .name(format!("load_worker_{}", core_id))
            .spawn(move || {
                let _exit_guard: Sender<()> = exit_guard;

                if let Some(affinity) = affinity {
                    if affinity.pin_current_thread(core_id) {
                        debug!("[Worker {}] pinned to core {}", core_id, core_id);
                    } else {
                        debug!("[Worker {}] affinity not applied", core_id);
                    }
                }

                self.run();
            })?;

        Ok(WorkerHandle {
            core_id,
            stop,
            exited,
            thread,
        })
    }

    fn run(&self) {
        let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
        let mut acc = 1.000_001;

        while !self.stop.load(Ordering::Acquire) {
            let cycle = duty_cycle(self.period, self.load.get());
            let cycle_start = Instant::now();

            if !cycle.work.is_zero() {
                acc = busy_spin(cycle.work, acc);
            }

            if !cycle.sleep.is_zero() {
                let remaining = self.period.saturating_sub(cycle_start.elapsed());
                if !remaining.is_zero() {
                    sleeper.sleep(remaining);
                }
            }
        }

        black_box(acc);
        debug!("[Worker {}] exiting", self.core_id);
    }
}

/// Owner side of a running worker.
pub struct WorkerHandle {
    core_id: usize,
    stop: Arc<AtomicBool>,
    exited: Receiver<()>,
    thread: thread::JoinHandle<()>,
}

impl WorkerHandle {
    pub fn core_id(&self) -> usize {
        self.core_id
    }

    /// Asks the worker to exit at its next cycle boundary.
    pub fn signal_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits up to `timeout` for the thread to end. On timeout the thread is
    /// detached and `false` is returned.
    pub fn join_timeout(self, timeout: Duration) -> bool {
        match self.exited.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.thread.join().is_err() {
                    warn!("[Worker {}] panicked", self.core_id);
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

/// Signals every worker, then waits up to `timeout` for each one.
/// Returns the number of workers abandoned after timing out.
pub fn shutdown_workers(workers: Vec<WorkerHandle>, timeout: Duration) -> usize {
    for worker in &workers {
        worker.signal_stop();
    }

    let total = workers.len();
    let mut abandoned = 0;
    for worker in workers {
        let core_id = worker.core_id();
        if !worker.join_timeout(timeout) {
            warn!(
                "[Worker {}] did not exit within {:?}; abandoning thread",
                core_id, timeout
            );
            abandoned += 1;
        }
    }

    info!("[Workers] {} of {} load workers stopped", total - abandoned, total);
    abandoned
}
