//! Topside operator box daemon. Wires the supervisory link to the physical
//! box: kill button in, status LEDs and buzzer out.

mod config;

use beacon::gpio::GpioSensor;
use beacon::indicator::{Buzzer, BuzzerState, KillSwitchLeds, Led, LedState};
use beacon::sink::FileSink;
use clap::{Arg, Command};
use slog::{error, info, o};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tether::logging;
use tether::{
    DiagnosticState, ErrorUtils, KillSwitchState, LeakState, Link, LinkCallbacks, NotificationType,
};

use crate::config::OpboxSettings;

fn main() {
    let matches = Command::new("opboxd")
        .about("Topside operator box daemon")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Settings file (TOML)"),
        )
        .arg(
            Arg::new("overrides")
                .long("overrides")
                .value_name("FILE")
                .help("Optional settings override file layered on top of --config"),
        )
        .arg(
            Arg::new("address")
                .long("address")
                .value_name("HOST")
                .help("Robot peer address; overrides the settings file"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .value_parser(clap::value_parser!(u16))
                .help("Robot peer port; overrides the settings file"),
        )
        .arg(
            Arg::new("io-dir")
                .long("io-dir")
                .value_name("DIR")
                .default_value("/sys/class/leds")
                .help("Directory holding the LED and buzzer value files"),
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

    let mut settings = match matches.get_one::<String>("config") {
        Some(base) => match matches.get_one::<String>("overrides") {
            Some(overrides) => OpboxSettings::load_with_overrides(base, overrides),
            None => OpboxSettings::load(base),
        },
        None => OpboxSettings::default(),
    };

    if let Some(address) = matches.get_one::<String>("address") {
        settings.client = address.clone();
    }
    if let Some(&port) = matches.get_one::<u16>("port") {
        settings.client_port = port;
    }

    info!(log, "opboxd starting";
          "client" => &settings.client,
          "client_port" => settings.client_port);

    let io_dir = PathBuf::from(
        matches
            .get_one::<String>("io-dir")
            .expect("io-dir has a default")
            .as_str(),
    );

    let ks_leds = Arc::new(KillSwitchLeds::new(
        Led::new(FileSink::new(io_dir.join("ks-green/brightness")), &log),
        Led::new(FileSink::new(io_dir.join("ks-yellow/brightness")), &log),
        Led::new(FileSink::new(io_dir.join("ks-red/brightness")), &log),
    ));
    let usr_led = Arc::new(Led::new(
        FileSink::new(io_dir.join("usr-led/brightness")),
        &log,
    ));
    let buzzer = Arc::new(Buzzer::new(
        FileSink::new(io_dir.join("usr-buzzer/brightness")),
        &log,
    ));

    // Boot annunciation, then settle into "waiting for peer".
    buzzer.set_state(BuzzerState::ChirpTwice);
    buzzer.set_next_state(BuzzerState::Off, Duration::from_secs(1));
    usr_led.set_state(LedState::BlinkTwice);
    usr_led.set_next_state(LedState::Off, Duration::from_secs(1));
    ks_leds.set_all(LedState::SlowBlink);

    let callbacks = {
        let status_leds = ks_leds.clone();
        let note_buzzer = buzzer.clone();
        let conn_led = usr_led.clone();
        let warning_alerts = settings.warning_alerts.clone();
        let error_alerts = settings.error_alerts.clone();
        let status_log = log.new(o!("handler" => "status"));
        let note_log = log.new(o!("handler" => "notification"));
        let conn_log = log.new(o!("handler" => "connection"));
        let button_log = log.new(o!("handler" => "kill-button"));

        LinkCallbacks {
            on_status: Box::new(move |kill, thruster, diag, leak| {
                match kill {
                    KillSwitchState::Killed => {
                        status_leds.red.set_state(LedState::On);
                        status_leds.green.set_state(LedState::Off);
                    }
                    KillSwitchState::Unkilled => {
                        status_leds.red.set_state(LedState::Off);
                        status_leds.green.set_state(LedState::On);
                    }
                }

                let yellow = match (diag, leak) {
                    (_, LeakState::Leaking) => LedState::FastBlink,
                    (DiagnosticState::Error, _) => LedState::FastBlink,
                    (DiagnosticState::Warn, _) => LedState::SlowBlink,
                    (DiagnosticState::Ok, LeakState::Ok) => LedState::Off,
                };
                status_leds.yellow.set_state(yellow);

                slog::debug!(status_log, "robot status";
                             "kill" => ?kill,
                             "thruster" => ?thruster,
                             "diag" => ?diag,
                             "leak" => ?leak);
            }),
            on_notification: Box::new(move |severity, sensor, desc| {
                info!(note_log, "notification";
                      "severity" => ?severity,
                      "sensor" => sensor,
                      "desc" => desc);

                let alerts = match severity {
                    NotificationType::Warning => &warning_alerts,
                    _ => &error_alerts,
                };

                if alerts.buzzer_enabled {
                    note_buzzer.set_state(match severity {
                        NotificationType::Warning => BuzzerState::Chirp,
                        NotificationType::Error => BuzzerState::ChirpTwice,
                        NotificationType::Fatal => BuzzerState::Panic,
                    });
                }
            }),
            on_kill_button: Box::new(move |state| {
                // The robot echoes opbox frames only on misconfiguration.
                slog::debug!(button_log, "unexpected kill button frame"; "state" => ?state);
            }),
            on_connection_change: Box::new(move |connected| {
                info!(conn_log, "robot link"; "connected" => connected);
                conn_led.set_state(if connected { LedState::On } else { LedState::SlowBlink });
            }),
        }
    };

    let link = match Link::opbox_side(&settings.client, settings.client_port, callbacks, &log) {
        Ok(link) => Arc::new(link),
        Err(err) => {
            error!(log, "link construction failed"; "err" => ?err);
            std::process::exit(1);
        }
    };

    let _kill_button = {
        let button_link = link.clone();
        let button_log = log.new(o!("input" => "kill-button"));

        GpioSensor::new(
            io_dir.join("ks-button/value"),
            move |value| {
                let state = if value == 0 {
                    KillSwitchState::Unkilled
                } else {
                    KillSwitchState::Killed
                };

                if button_link.send_kill_button_state(state).has_failed() {
                    error!(button_log, "kill button transmit failed"; "state" => ?state);
                }
            },
            &log,
        )
    };

    info!(log, "opboxd running");

    loop {
        thread::sleep(Duration::from_secs(1));
    }
}
