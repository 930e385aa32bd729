use std::{sync::Arc, time::Duration};

use cpu_stress_monitor::{
    config::SessionSettings,
    error::{ConfigError, SessionError},
    load::affinity::NoAffinity,
    session::{
        clock::ManualClock,
        controller::{SessionController, SessionState},
        params::{ProfileInput, TestConfig},
        scheduler::Timer,
    },
    telemetry::{
        power::PowerSampler, sampler::TelemetrySampler, sensors::SensorSource,
        system_info::FixedSystemInfo,
    },
};

struct FakeSensors {
    load: f32,
    temps: Vec<f32>,
}

impl SensorSource for FakeSensors {
    fn current_cpu_load_percent(&mut self) -> f32 {
        self.load
    }

    fn current_temperature_readings(&mut self) -> Vec<f32> {
        self.temps.clone()
    }
}

fn controller(cores: usize) -> (SessionController, ManualClock) {
    let clock = ManualClock::new();
    let settings = SessionSettings {
        control_period: Duration::from_millis(5),
        pin_affinity: false,
        ..SessionSettings::default()
    };
    let controller = SessionController::new(
        settings,
        Arc::new(clock.clone()),
        Arc::new(FixedSystemInfo::with_cores(cores)),
        Arc::new(NoAffinity),
        TelemetrySampler::new(
            Box::new(FakeSensors {
                load: 50.0,
                temps: vec![48.0, 52.5],
            }),
            PowerSampler::new(None),
        ),
    );
    (controller, clock)
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn constant_half_load_for_two_seconds() {
    let (mut c, clock) = controller(4);
    c.start(TestConfig::constant(50, 2).unwrap()).unwrap();

    assert_eq!(c.state(), SessionState::Running);
    let session = c.session().unwrap();
    assert_eq!(session.worker_count(), 4);
    assert_eq!(session.load().get(), 0.5);

    clock.set(ms(1000));
    assert_eq!(c.poll(), vec![Timer::Telemetry]);
    clock.set(ms(1999));
    assert!(c.poll().is_empty());
    assert!(c.is_running());

    clock.set(ms(2000));
    assert_eq!(c.poll(), vec![Timer::Telemetry, Timer::AutoStop]);
    assert_eq!(c.state(), SessionState::Idle);
    assert_eq!(c.next_deadline(), None);

    let log = c.telemetry();
    let log = log.read();
    let seconds: Vec<u64> = log.records().iter().map(|r| r.elapsed_seconds).collect();
    assert_eq!(seconds, vec![1, 2]);
    assert_eq!(log.records()[0].temperature_celsius, Some(52.5));
    assert_eq!(log.records()[0].power_watts, None);

    let events: Vec<&str> = log.events().iter().map(|e| e.message.as_str()).collect();
    assert_eq!(
        events,
        vec!["Started 'Constant' test on 4 cores for 2s.", "Stress test stopped."]
    );
}

#[test]
fn late_poll_still_yields_every_record() {
    let (mut c, clock) = controller(1);
    c.start(TestConfig::constant(10, 3).unwrap()).unwrap();

    clock.set(ms(5000));
    c.poll();
    assert!(!c.is_running());
    assert_eq!(c.telemetry().read().records().len(), 3);
}

#[test]
fn start_while_running_is_rejected_and_session_survives() {
    let (mut c, clock) = controller(2);
    c.start(TestConfig::constant(30, 10).unwrap()).unwrap();
    let load = c.session().unwrap().load().clone();

    let err = c.start(TestConfig::constant(90, 5).unwrap()).unwrap_err();
    assert!(matches!(err, SessionError::AlreadyRunning));
    assert_eq!(c.session().unwrap().worker_count(), 2);
    assert_eq!(c.session().unwrap().load().get(), 0.3);
    assert!(Arc::ptr_eq(&load, c.session().unwrap().load()));

    clock.set(ms(10_000));
    c.poll();
    assert!(!c.is_running());
}

#[test]
fn stop_while_idle_is_a_no_op() {
    let (mut c, _clock) = controller(1);
    c.stop();
    assert_eq!(c.state(), SessionState::Idle);
    assert!(c.telemetry().read().events().is_empty());
}

#[test]
fn manual_stop_cancels_timers() {
    let (mut c, clock) = controller(2);
    c.start(TestConfig::ramp(10, 100, 60).unwrap()).unwrap();
    clock.set(ms(1500));
    c.poll();
    c.stop();

    assert_eq!(c.next_deadline(), None);
    clock.set(ms(10_000));
    assert!(c.poll().is_empty());
    assert_eq!(c.telemetry().read().records().len(), 1);
}

#[test]
fn pulsed_profile_switches_phases() {
    let (mut c, clock) = controller(1);
    c.start(TestConfig::pulsed(90, 10, 5, 5, 30).unwrap()).unwrap();
    let load = c.session().unwrap().load().clone();
    assert_eq!(load.get(), 0.9);

    for (at, expected) in [(3_000, 0.9), (7_000, 0.1), (10_000, 0.9), (15_250, 0.1)] {
        clock.set(ms(at));
        c.poll();
        assert_eq!(load.get(), expected, "target at {} ms", at);
    }
    c.stop();
}

#[test]
fn invalid_forms_never_touch_the_session() {
    let (mut c, _clock) = controller(1);
    c.start(TestConfig::constant(40, 60).unwrap()).unwrap();

    let bad = TestConfig::parse(
        &ProfileInput::Pulsed {
            high: "90".into(),
            low: "10".into(),
            on_secs: "0".into(),
            off_secs: "0".into(),
        },
        "60",
    );
    assert_eq!(bad.unwrap_err(), ConfigError::ZeroPulseCycle);
    assert_eq!(
        TestConfig::constant(40, 0).unwrap_err(),
        ConfigError::NonPositiveDuration(0)
    );

    let err: SessionError = ConfigError::NonPositiveDuration(0).into();
    assert!(matches!(err, SessionError::Config(_)));
    assert!(c.is_running());
    assert_eq!(c.session().unwrap().load().get(), 0.4);
}
