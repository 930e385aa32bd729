//! # CPU Stress Monitor Entry Point
//!
//! Interactive terminal front end for the stress engine.
//!
//! ## Flow
//! - **Menu:** pick a profile (Constant, Pulsed, Ramp), export the last run, or exit.
//! - **Parameters:** each field is prompted with its default; empty input keeps it.
//! - **Run:** one live line per telemetry record. `m <label>` adds a marker, `s` stops.
//! - **After a run:** summary, event log, optional CSV export.
//!
//! Stdin is read on its own thread so the live view keeps updating while waiting for input.

use std::{
    io::{Write, stdin, stdout},
    path::PathBuf,
    thread,
    time::Duration,
};

use chrono::Local;
use crossbeam::channel::{Receiver, RecvTimeoutError, unbounded};
use log::{error, info};

use cpu_stress_monitor::{
    config::{DEFAULT_DURATION, SessionSettings},
    session::{
        controller::SessionController,
        handle::SessionHandle,
        params::{ProfileInput, ProfileKind, TestConfig},
    },
    telemetry::system_info::{SystemInfo, cores_summary},
    utils::{
        export::{default_export_filename, export_csv},
        metrics::{SharedTelemetry, TelemetryRecord, load_label, temperature_label},
    },
};

const LIVE_REFRESH: Duration = Duration::from_millis(200);

fn main() {
    env_logger::init();
    info!("=== CPU STRESS MONITOR START ===");

    let controller = SessionController::host(SessionSettings::default());
    print_system_info(controller.system());

    let session = match SessionHandle::spawn(controller) {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to start session controller: {}", e);
            return;
        }
    };
    let input = spawn_input_reader();

    loop {
        let Some(choice) = prompt_menu(&input) else {
            break;
        };
        let outcome = match choice.as_str() {
            "1" | "" => run_test(&session, &input, ProfileKind::Constant),
            "2" => run_test(&session, &input, ProfileKind::Pulsed),
            "3" => run_test(&session, &input, ProfileKind::Ramp),
            "4" => export_results(&session.telemetry(), &input),
            "5" => break,
            other => {
                println!("Unrecognized option '{}', please try again.", other);
                Some(())
            }
        };
        if outcome.is_none() {
            break;
        }
    }

    println!("Exiting. Goodbye!");
    info!("=== CPU STRESS MONITOR FINISHED ===");
}

fn print_system_info(system: &dyn SystemInfo) {
    println!("CPU:   {}", system.cpu_model_name());
    println!("Cores: {}", cores_summary(system));
}

/// Forwards stdin lines; the channel closes on EOF.
fn spawn_input_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    let spawned = thread::Builder::new()
        .name("stdin_reader".to_string())
        .spawn(move || {
            loop {
                let mut line = String::new();
                match stdin().read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line.trim().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    if let Err(e) = spawned {
        error!("Failed to start input reader: {}", e);
    }
    rx
}

fn prompt(input: &Receiver<String>, label: &str, default: &str) -> Option<String> {
    print!("{} [default: {}]: ", label, default);
    let _ = stdout().flush();
    let line = input.recv().ok()?;
    Some(if line.is_empty() {
        default.to_string()
    } else {
        line
    })
}

//interactive menu
fn prompt_menu(input: &Receiver<String>) -> Option<String> {
    println!("\n┌─────────────────────────────────────────────┐");
    println!("│     SELECT STRESS PROFILE                   │");
    println!("├─────────────────────────────────────────────┤");
    println!("│  1) Constant load                           │");
    println!("│  2) Pulsed load (high/low phases)           │");
    println!("│  3) Ramp load (start -> end)                │");
    println!("│  4) Export last run to CSV                  │");
    println!("│  5) Exit                                    │");
    println!("└─────────────────────────────────────────────┘");
    print!("Select [1/2/3/4/5] (default: 1): ");
    let _ = stdout().flush();
    input.recv().ok()
}

fn prompt_profile(input: &Receiver<String>, kind: ProfileKind) -> Option<ProfileInput> {
    Some(match ProfileInput::defaults(kind) {
        ProfileInput::Constant { load } => ProfileInput::Constant {
            load: prompt(input, "CPU load (%)", &load)?,
        },
        ProfileInput::Pulsed {
            high,
            low,
            on_secs,
            off_secs,
        } => ProfileInput::Pulsed {
            high: prompt(input, "High load (%)", &high)?,
            low: prompt(input, "Low load (%)", &low)?,
            on_secs: prompt(input, "High phase (s)", &on_secs)?,
            off_secs: prompt(input, "Low phase (s)", &off_secs)?,
        },
        ProfileInput::Ramp { start, end } => ProfileInput::Ramp {
            start: prompt(input, "Start load (%)", &start)?,
            end: prompt(input, "End load (%)", &end)?,
        },
    })
}

fn run_test(session: &SessionHandle, input: &Receiver<String>, kind: ProfileKind) -> Option<()> {
    let form = prompt_profile(input, kind)?;
    let duration = prompt(input, "Duration (s)", DEFAULT_DURATION)?;

    let config = match TestConfig::parse(&form, &duration) {
        Ok(config) => config,
        Err(e) => {
            println!("Invalid configuration: {}", e);
            return Some(());
        }
    };
    if let Err(e) = session.start(config) {
        println!("Could not start test: {}", e);
        return Some(());
    }

    println!("Running... type 'm <label>' + Enter to add a marker, 's' + Enter to stop.");
    let telemetry = session.telemetry();
    let mut shown = 0u64;

    while session.is_running() {
        match input.recv_timeout(LIVE_REFRESH) {
            Ok(line) => handle_run_command(session, &line),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                let _ = session.stop();
                return None;
            }
        }

        let (latest, power) = {
            let log = telemetry.read();
            (log.latest().copied(), log.power_label())
        };
        if let Some(record) = latest.filter(|r| r.elapsed_seconds > shown) {
            shown = record.elapsed_seconds;
            print_live(&record, &power);
        }
    }

    print_report(&telemetry);
    let answer = prompt(input, "Export results to CSV? (y/n)", "n")?;
    if answer.eq_ignore_ascii_case("y") {
        export_results(&telemetry, input)?;
    }
    Some(())
}

fn handle_run_command(session: &SessionHandle, line: &str) {
    match line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest)) {
        ("s", _) => {
            if let Err(e) = session.stop() {
                println!("Stop failed: {}", e);
            }
        }
        ("m", label) => match session.add_marker(label) {
            Ok(marker) => println!("Marker '{}' at {}s", marker.label, marker.elapsed_seconds),
            Err(e) => println!("Marker rejected: {}", e),
        },
        _ => println!("Commands: 'm <label>' adds a marker, 's' stops the test."),
    }
}

fn print_live(record: &TelemetryRecord, power: &str) {
    println!(
        "[{:>5}s] Load: {:>8} | Temp: {:>9} | Power: {}",
        record.elapsed_seconds,
        load_label(record.load_percent),
        temperature_label(record.temperature_celsius),
        power
    );
}

fn print_report(telemetry: &SharedTelemetry) {
    let log = telemetry.read();

    println!("\n--- Session Log ---");
    for entry in log.events() {
        println!("{}", entry);
    }

    let Some(summary) = log.summary() else {
        println!("No telemetry was recorded.");
        return;
    };
    println!("\n--- Summary ---");
    println!("Samples:         {}", summary.samples);
    println!(
        "CPU load:        min {} / avg {} / max {}",
        load_label(summary.load.min),
        load_label(summary.load.mean),
        load_label(summary.load.max)
    );
    println!(
        "Max temperature: {}",
        temperature_label(summary.temperature.map(|t| t.max))
    );
    match summary.power {
        Some(p) => println!("Average power:   {:.2} W", p.mean),
        None => println!("Average power:   {}", log.power_label()),
    }
    println!("Markers:         {}", summary.markers);
}

fn export_results(telemetry: &SharedTelemetry, input: &Receiver<String>) -> Option<()> {
    if telemetry.read().records().is_empty() {
        println!("No data to export yet. Run a test first.");
        return Some(());
    }
    let path = PathBuf::from(prompt(
        input,
        "Export file",
        &default_export_filename(Local::now()),
    )?);

    match export_csv(&path, &telemetry.read()) {
        Ok(()) => println!("Data successfully exported to {}", path.display()),
        Err(e) => {
            error!("[Export] failed: {}", e);
            println!("Failed to export data: {}", e);
        }
    }
    Some(())
}
