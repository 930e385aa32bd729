//! Test session lifecycle: `Idle -> Running -> Idle`.
//!
//! The controller owns everything a run needs: the worker threads, the shared
//! load target, the profile engine, the telemetry sampler and the timer table.
//! It never runs timers on its own; the owner calls [`SessionController::poll`]
//! whenever [`SessionController::next_deadline`] passes (see
//! [`SessionHandle`](crate::session::handle::SessionHandle) for a thread that
//! does exactly that).

use std::{sync::Arc, time::Instant};

use log::{error, info, warn};

use crate::config::SessionSettings;
use crate::error::SessionError;
use crate::load::{
    affinity::{AffinityControl, CoreAffinity},
    controller::{LoadController, SharedLoad},
    profile::ProfileEngine,
    worker::{
        DutyCycleWorker, WorkerHandle, WorkerSpawner, shutdown_workers, spawn_worker_thread,
    },
};
use crate::session::{
    clock::{Clock, MonotonicClock},
    params::TestConfig,
    scheduler::{Scheduler, Timer},
};
use crate::telemetry::{
    sampler::TelemetrySampler,
    system_info::{HostSystemInfo, SystemInfo},
};
use crate::utils::metrics::{EventMarker, SharedTelemetry, TelemetryLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
}

/// One active run. Dropped on stop.
pub struct TestSession {
    config: TestConfig,
    started_at: Instant,
    load: SharedLoad,
    engine: ProfileEngine,
    workers: Vec<WorkerHandle>,
}

impl TestSession {
    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn load(&self) -> &SharedLoad {
        &self.load
    }
}

pub struct SessionController {
    settings: SessionSettings,
    clock: Arc<dyn Clock>,
    system: Arc<dyn SystemInfo>,
    affinity: Arc<dyn AffinityControl>,
    spawner: WorkerSpawner,
    sampler: TelemetrySampler,
    telemetry: SharedTelemetry,
    scheduler: Scheduler,
    session: Option<TestSession>,
}

impl SessionController {
    pub fn new(
        settings: SessionSettings,
        clock: Arc<dyn Clock>,
        system: Arc<dyn SystemInfo>,
        affinity: Arc<dyn AffinityControl>,
        sampler: TelemetrySampler,
    ) -> Self {
        Self {
            settings,
            clock,
            system,
            affinity,
            spawner: Box::new(spawn_worker_thread),
            sampler,
            telemetry: TelemetryLog::shared(),
            scheduler: Scheduler::new(),
            session: None,
        }
    }

    /// Replaces how worker threads are launched.
    pub fn with_spawner(mut self, spawner: WorkerSpawner) -> Self {
        self.spawner = spawner;
        self
    }

    /// Controller wired to the real clock, host sensors and core pinning.
    pub fn host(settings: SessionSettings) -> Self {
        Self::new(
            settings,
            Arc::new(MonotonicClock),
            Arc::new(HostSystemInfo),
            Arc::new(CoreAffinity::detect()),
            TelemetrySampler::host(),
        )
    }

    pub fn telemetry(&self) -> SharedTelemetry {
        self.telemetry.clone()
    }

    pub fn system(&self) -> &dyn SystemInfo {
        self.system.as_ref()
    }

    pub fn state(&self) -> SessionState {
        if self.session.is_some() {
            SessionState::Running
        } else {
            SessionState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&TestSession> {
        self.session.as_ref()
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_due()
    }

    /// Starts a run with one worker per logical core. Rejected while a run
    /// is active; on failure nothing has changed.
    pub fn start(&mut self, config: TestConfig) -> Result<(), SessionError> {
        if self.session.is_some() {
            warn!("[Session] start rejected: a test is already running");
            return Err(SessionError::AlreadyRunning);
        }

        let profile = *config.profile();
        let cores = self.system.logical_core_count().max(1);
        let load = LoadController::shared(profile.initial_ratio());
        let workers = self.spawn_workers(cores, &load)?;

        let now = self.clock.now();
        let duration = config.duration();
        {
            let mut log = self.telemetry.write();
            log.clear();
            log.log_event(format!(
                "Started '{}' test on {} cores for {}s.",
                profile.name(),
                cores,
                duration.as_secs()
            ));
            log.set_power_status(self.sampler.prime(now));
        }

        let tick = self.settings.telemetry_tick;
        self.scheduler.cancel_all();
        self.scheduler.arm_periodic(Timer::Telemetry, now + tick, tick);
        if profile.is_dynamic() {
            let tick = self.settings.profile_tick;
            self.scheduler.arm_periodic(Timer::Profile, now + tick, tick);
        }
        self.scheduler.arm_once(Timer::AutoStop, now + duration);

        info!(
            "[Session] started {} profile on {} workers for {:?} (initial ratio {:.2})",
            profile.name(),
            cores,
            duration,
            profile.initial_ratio()
        );

        self.session = Some(TestSession {
            engine: ProfileEngine::new(profile, duration, load.clone()),
            config,
            started_at: now,
            load,
            workers,
        });
        Ok(())
    }

    fn spawn_workers(
        &self,
        cores: usize,
        load: &SharedLoad,
    ) -> Result<Vec<WorkerHandle>, SessionError> {
        let affinity = self.settings.pin_affinity.then(|| self.affinity.clone());
        let mut workers = Vec::with_capacity(cores);

        for core in 0..cores {
            let worker = DutyCycleWorker::new(core, self.settings.control_period, load.clone());
            match (self.spawner)(worker, affinity.clone()) {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    error!("[Session] failed to spawn worker {}: {}", core, source);
                    shutdown_workers(workers, self.settings.join_timeout);
                    return Err(SessionError::WorkerSpawn { core, source });
                }
            }
        }
        Ok(workers)
    }

    /// Cancels every timer and stops the workers. No-op while idle.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        self.scheduler.cancel_all();
        let abandoned = shutdown_workers(session.workers, self.settings.join_timeout);
        if abandoned > 0 {
            warn!("[Session] {} workers abandoned during stop", abandoned);
        }

        self.telemetry.write().log_event("Stress test stopped.");
        info!(
            "[Session] stopped after {:?}",
            self.clock.now().saturating_duration_since(session.started_at)
        );
    }

    /// Records a marker at the current elapsed second.
    pub fn add_marker(&mut self, label: &str) -> Result<EventMarker, SessionError> {
        if self.session.is_none() {
            return Err(SessionError::NotRunning);
        }
        let label = label.trim();
        if label.is_empty() {
            return Err(SessionError::EmptyMarker);
        }

        let mut log = self.telemetry.write();
        let marker = log.add_marker(label).clone();
        log.log_event(format!("Marker added: {}", label));
        info!("[Session] marker '{}' at {}s", label, marker.elapsed_seconds);
        Ok(marker)
    }

    /// Fires every timer due by now, in deadline order, each as of its own
    /// deadline. Returns what fired.
    pub fn poll(&mut self) -> Vec<Timer> {
        let now = self.clock.now();
        let mut fired = Vec::new();

        while let Some((timer, due)) = self.scheduler.pop_due(now) {
            fired.push(timer);
            match timer {
                Timer::Telemetry => self.sample_telemetry(due),
                Timer::Profile => {
                    if let Some(session) = &self.session {
                        session
                            .engine
                            .tick(due.saturating_duration_since(session.started_at));
                    }
                }
                Timer::AutoStop => {
                    info!("[Session] duration elapsed");
                    self.stop();
                }
            }
        }
        fired
    }

    fn sample_telemetry(&mut self, at: Instant) {
        let sample = self.sampler.sample(at);
        let mut log = self.telemetry.write();
        if !log.push_record(sample.record) {
            warn!(
                "[Session] dropped out-of-order record at {}s",
                sample.record.elapsed_seconds
            );
        }
        log.set_power_status(sample.power);
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SensorError;
    use crate::load::affinity::NoAffinity;
    use crate::session::clock::ManualClock;
    use crate::telemetry::{
        power::{EnergySource, PowerSampler},
        sensors::SensorSource,
        system_info::FixedSystemInfo,
    };
    use parking_lot::Mutex;
    use std::{io, time::Duration};

    struct IdleSensors;

    impl SensorSource for IdleSensors {
        fn current_cpu_load_percent(&mut self) -> f32 {
            1.0
        }

        fn current_temperature_readings(&mut self) -> Vec<f32> {
            Vec::new()
        }
    }

    fn test_settings() -> SessionSettings {
        SessionSettings {
            control_period: Duration::from_millis(5),
            pin_affinity: false,
            ..SessionSettings::default()
        }
    }

    fn controller_with(
        cores: usize,
        settings: SessionSettings,
        power: PowerSampler,
    ) -> (SessionController, ManualClock) {
        let clock = ManualClock::new();
        let c = SessionController::new(
            settings,
            Arc::new(clock.clone()),
            Arc::new(FixedSystemInfo::with_cores(cores)),
            Arc::new(NoAffinity),
            TelemetrySampler::new(Box::new(IdleSensors), power),
        );
        (c, clock)
    }

    fn controller(cores: usize) -> (SessionController, ManualClock) {
        controller_with(cores, test_settings(), PowerSampler::new(None))
    }

    #[test]
    fn constant_profile_arms_no_profile_timer() {
        let (mut c, _clock) = controller(1);
        c.start(TestConfig::constant(30, 5).unwrap()).unwrap();
        assert!(c.scheduler.is_armed(Timer::Telemetry));
        assert!(!c.scheduler.is_armed(Timer::Profile));
        assert!(c.scheduler.is_armed(Timer::AutoStop));
        c.stop();
        assert!(c.scheduler.is_empty());
    }

    #[test]
    fn ramp_ticks_move_the_shared_target() {
        let (mut c, clock) = controller(1);
        c.start(TestConfig::ramp(0, 100, 10).unwrap()).unwrap();
        let load = c.session().unwrap().load().clone();
        assert_eq!(load.get(), 0.0);

        clock.set(Duration::from_secs(5));
        c.poll();
        assert!((load.get() - 0.5).abs() < 1e-9);
        c.stop();
    }

    #[test]
    fn markers_need_a_running_session_and_a_label() {
        let (mut c, clock) = controller(1);
        assert!(matches!(c.add_marker("x"), Err(SessionError::NotRunning)));

        c.start(TestConfig::constant(10, 60).unwrap()).unwrap();
        assert!(matches!(c.add_marker("   "), Err(SessionError::EmptyMarker)));

        clock.set(Duration::from_secs(3));
        c.poll();
        let marker = c.add_marker(" fan spike ").unwrap();
        assert_eq!(marker.elapsed_seconds, 3);
        assert_eq!(marker.label, "fan spike");

        let log = c.telemetry();
        let log = log.read();
        assert_eq!(log.markers().len(), 1);
        assert_eq!(log.events().last().unwrap().message, "Marker added: fan spike");
    }

    #[test]
    fn restart_clears_previous_run() {
        let (mut c, clock) = controller(1);
        c.start(TestConfig::constant(10, 1).unwrap()).unwrap();
        c.add_marker("first").unwrap();
        clock.set(Duration::from_secs(1));
        c.poll();
        assert!(!c.is_running());
        assert_eq!(c.telemetry().read().records().len(), 1);

        c.start(TestConfig::constant(10, 5).unwrap()).unwrap();
        let log = c.telemetry();
        let log = log.read();
        assert!(log.records().is_empty());
        assert!(log.markers().is_empty());
        assert_eq!(log.events().len(), 1);
        assert_eq!(log.power_label(), "N/A (No Sensor)");
    }

    #[test]
    fn dropping_the_controller_stops_workers() {
        let (mut c, _clock) = controller(2);
        c.start(TestConfig::constant(100, 60).unwrap()).unwrap();
        let load = c.session().unwrap().load().clone();
        drop(c);
        // Only the test's handle to the shared target remains.
        assert_eq!(Arc::strong_count(&load), 1);
    }

    /// Gains 1 J per read; the second read fails.
    struct FlakyCounter {
        reads: u32,
        value: u64,
    }

    impl EnergySource for FlakyCounter {
        fn current_energy_micro_joules(&mut self) -> Result<u64, SensorError> {
            self.reads += 1;
            if self.reads == 2 {
                return Err(SensorError::Io {
                    path: "energy_uj".into(),
                    source: io::Error::from(io::ErrorKind::PermissionDenied),
                });
            }
            self.value += 1_000_000;
            Ok(self.value)
        }

        fn max_energy_range_micro_joules(&mut self) -> Result<u64, SensorError> {
            Ok(1 << 40)
        }
    }

    #[test]
    fn power_failure_only_lasts_for_its_run() {
        let power = PowerSampler::new(Some(Box::new(FlakyCounter { reads: 0, value: 0 })));
        let (mut c, clock) = controller_with(1, test_settings(), power);

        c.start(TestConfig::constant(10, 2).unwrap()).unwrap();
        clock.set(Duration::from_secs(2));
        c.poll();
        {
            let log = c.telemetry();
            let log = log.read();
            let watts: Vec<_> = log.records().iter().map(|r| r.power_watts).collect();
            assert_eq!(watts, vec![None, None]);
            assert_eq!(log.power_label(), "N/A (Access Error)");
        }

        c.start(TestConfig::constant(10, 2).unwrap()).unwrap();
        assert_eq!(c.telemetry().read().power_label(), "...");
        clock.set(Duration::from_secs(4));
        c.poll();
        let log = c.telemetry();
        let log = log.read();
        let watts: Vec<_> = log.records().iter().map(|r| r.power_watts).collect();
        assert_eq!(watts, vec![Some(1.0), Some(1.0)]);
        assert_eq!(log.power_label(), "1.00 W");
    }

    #[test]
    fn stop_goes_idle_even_when_a_worker_will_not_exit() {
        let settings = SessionSettings {
            control_period: Duration::from_secs(2),
            join_timeout: Duration::from_millis(50),
            ..test_settings()
        };
        let (mut c, _clock) = controller_with(1, settings, PowerSampler::new(None));
        c.start(TestConfig::constant(0, 60).unwrap()).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let start = Instant::now();
        c.stop();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(c.state(), SessionState::Idle);
        assert_eq!(c.next_deadline(), None);
        assert_eq!(
            c.telemetry().read().events().last().unwrap().message,
            "Stress test stopped."
        );
    }

    #[test]
    fn failed_spawn_rolls_back_started_workers() {
        let seen: Arc<Mutex<Option<SharedLoad>>> = Arc::new(Mutex::new(None));
        let spy = seen.clone();
        let (c, _clock) = controller(4);
        let mut c = c.with_spawner(Box::new(
            move |worker: DutyCycleWorker, affinity: Option<Arc<dyn AffinityControl>>| {
                *spy.lock() = Some(worker.load().clone());
                if worker.core_id() == 2 {
                    return Err(io::Error::new(io::ErrorKind::WouldBlock, "thread limit"));
                }
                worker.spawn(affinity)
            },
        ));

        let err = c.start(TestConfig::constant(100, 60).unwrap()).unwrap_err();
        assert!(matches!(err, SessionError::WorkerSpawn { core: 2, .. }));
        assert_eq!(c.state(), SessionState::Idle);
        assert_eq!(c.next_deadline(), None);
        assert!(c.telemetry().read().events().is_empty());

        // Workers 0 and 1 were joined, so only the recorded handle remains.
        let load = seen.lock().take().unwrap();
        assert_eq!(Arc::strong_count(&load), 1);
    }
}
