use std::{fs, sync::Arc, time::Duration};

use cpu_stress_monitor::{
    config::SessionSettings,
    error::{ExportError, SensorError},
    load::affinity::NoAffinity,
    session::{clock::ManualClock, controller::SessionController, params::TestConfig},
    telemetry::{
        power::{EnergySource, PowerSampler},
        sampler::TelemetrySampler,
        sensors::SensorSource,
        system_info::FixedSystemInfo,
    },
    utils::{
        export::{export_csv, export_summary_csv, render_csv},
        metrics::TelemetryLog,
    },
};

struct NoTemps;

impl SensorSource for NoTemps {
    fn current_cpu_load_percent(&mut self) -> f32 {
        75.0
    }

    fn current_temperature_readings(&mut self) -> Vec<f32> {
        Vec::new()
    }
}

/// Counter that gains 20 J per read and wraps at 100 J.
struct WrappingCounter(u64);

impl EnergySource for WrappingCounter {
    fn current_energy_micro_joules(&mut self) -> Result<u64, SensorError> {
        self.0 = (self.0 + 20_000_000) % 100_000_000;
        Ok(self.0)
    }

    fn max_energy_range_micro_joules(&mut self) -> Result<u64, SensorError> {
        Ok(100_000_000)
    }
}

fn run_with_markers() -> SessionController {
    let clock = ManualClock::new();
    let mut c = SessionController::new(
        SessionSettings {
            control_period: Duration::from_millis(5),
            pin_affinity: false,
            ..SessionSettings::default()
        },
        Arc::new(clock.clone()),
        Arc::new(FixedSystemInfo::with_cores(1)),
        Arc::new(NoAffinity),
        TelemetrySampler::new(
            Box::new(NoTemps),
            PowerSampler::new(Some(Box::new(WrappingCounter(50_000_000)))),
        ),
    );

    c.start(TestConfig::constant(75, 3).unwrap()).unwrap();
    for (at, label) in [(1_000, "warm"), (2_500, "fan, loud")] {
        clock.set(Duration::from_millis(at));
        c.poll();
        c.add_marker(label).unwrap();
    }
    clock.set(Duration::from_secs(3));
    c.poll();
    assert!(!c.is_running());
    c
}

#[test]
fn exported_run_matches_expected_layout() {
    let c = run_with_markers();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.csv");
    export_csv(&path, &c.telemetry().read()).unwrap();

    // 20 J per 1 s tick, including the tick that wraps the counter.
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "Time (s),CPU Load (%),Temperature (C),Power (W)\r\n\
         1,75.00,N/A,20.00\r\n\
         2,75.00,N/A,20.00\r\n\
         3,75.00,N/A,20.00\r\n\
         \r\n\
         --- Event Markers ---\r\n\
         Time (s),Event\r\n\
         1,warm\r\n\
         2,\"fan, loud\"\r\n"
    );
}

#[test]
fn export_is_byte_identical_across_calls() {
    let c = run_with_markers();
    let log = c.telemetry();
    let log = log.read();
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.csv");
    let b = dir.path().join("b.csv");
    export_csv(&a, &log).unwrap();
    export_csv(&b, &log).unwrap();
    assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
    assert_eq!(
        fs::read(&a).unwrap(),
        render_csv(log.records(), log.markers()).unwrap()
    );
}

#[test]
fn summary_export_and_empty_refusal() {
    let c = run_with_markers();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("summary.csv");
    let summary = c.telemetry().read().summary().unwrap();
    export_summary_csv(&path, &summary).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("samples,3,Telemetry records\r\n"));
    assert!(text.contains("temp_max_c,N/A,Maximum\r\n"));
    assert!(text.contains("power_avg_w,20.00,Average\r\n"));
    assert!(text.contains("markers,2,Event markers\r\n"));

    let empty = dir.path().join("empty.csv");
    assert!(matches!(
        export_csv(&empty, &TelemetryLog::default()),
        Err(ExportError::NoData)
    ));
}
