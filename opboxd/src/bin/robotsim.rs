//! Robot-side peer for bench testing the operator box. Heartbeats robot
//! status, mirrors the received kill button into its own kill state, and runs
//! a danger monitor over a scripted diagnostic cycle so escalations reach the
//! box as notifications.

use clap::{Arg, Command};
use slog::{info, o};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tether::danger::{DangerMonitor, DangerRule};
use tether::logging;
use tether::{
    DiagnosticState, ErrorUtils, KillSwitchState, LeakState, Link, LinkCallbacks,
    NotificationType, ThrusterState,
};

/// Scripted diagnostic levels the simulator cycles through; three
/// consecutive warns so the danger rule trips once per lap.
const DIAG_SCRIPT: [DiagnosticState; 8] = [
    DiagnosticState::Ok,
    DiagnosticState::Ok,
    DiagnosticState::Ok,
    DiagnosticState::Ok,
    DiagnosticState::Ok,
    DiagnosticState::Warn,
    DiagnosticState::Warn,
    DiagnosticState::Warn,
];

fn main() {
    let matches = Command::new("robotsim")
        .about("Simulated robot peer for bench testing the operator box")
        .arg(
            Arg::new("address")
                .long("address")
                .value_name("HOST")
                .default_value("localhost"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .value_parser(clap::value_parser!(u16))
                .default_value("9000"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .default_value("info"),
        )
        .get_matches();

    let level = logging::severity_from_str(
        matches
            .get_one::<String>("log-level")
            .map(String::as_str)
            .unwrap_or("info"),
    );
    let log = logging::term_logger(level);

    let address = matches.get_one::<String>("address").expect("has default");
    let port = *matches.get_one::<u16>("port").expect("has default");

    let kill_state = Arc::new(Mutex::new(KillSwitchState::Killed));

    let callbacks = {
        let kill_state = kill_state.clone();
        let button_log = log.new(o!("handler" => "kill-button"));
        let conn_log = log.new(o!("handler" => "connection"));

        LinkCallbacks {
            on_kill_button: Box::new(move |state| {
                info!(button_log, "kill button"; "state" => ?state);
                *kill_state.lock().expect("Kill state poisoned") = state;
            }),
            on_connection_change: Box::new(move |connected| {
                info!(conn_log, "opbox link"; "connected" => connected);
            }),
            ..LinkCallbacks::default()
        }
    };

    let link =
        Link::robot_side(address, port, callbacks, &log).expect("Link construction failed");

    let mut monitor = DangerMonitor::new(vec![DangerRule {
        diagnostic: "thermals".to_string(),
        target: DiagnosticState::Warn,
        min_consecutive: 3,
        escalation: NotificationType::Warning,
    }]);

    info!(log, "robotsim running"; "address" => address, "port" => port);

    for lap in 0usize.. {
        let diag = DIAG_SCRIPT[lap % DIAG_SCRIPT.len()];
        let kill = *kill_state.lock().expect("Kill state poisoned");
        let thruster = match kill {
            KillSwitchState::Unkilled => ThrusterState::Active,
            KillSwitchState::Killed => ThrusterState::Idle,
        };

        if link
            .send_robot_state(kill, thruster, diag, LeakState::Ok)
            .has_failed()
        {
            info!(log, "robot state transmit failed");
        }

        for escalation in monitor.observe("thermals", diag, "housing running warm") {
            let delivered = link.send_notification(
                escalation.severity,
                &escalation.sensor,
                &escalation.message,
                Duration::from_millis(500),
            );

            info!(log, "escalation";
                  "sensor" => &escalation.sensor,
                  "delivered" => delivered);
        }

        thread::sleep(Duration::from_millis(500));
    }
}
