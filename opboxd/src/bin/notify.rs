//! Sends one acknowledged notification to the operator box and reports the
//! outcome through the exit code. Handy for exercising the annunciation path
//! from the robot end of the tether.

use clap::{Arg, Command};
use slog::info;
use std::thread;
use std::time::{Duration, Instant};
use tether::logging;
use tether::{Link, LinkCallbacks, NotificationType};

fn severity_from_str(name: &str) -> NotificationType {
    match name {
        "error" => NotificationType::Error,
        "fatal" => NotificationType::Fatal,
        _ => NotificationType::Warning,
    }
}

fn main() {
    let matches = Command::new("notify")
        .about("Send one acknowledged notification to the operator box")
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
            Arg::new("severity")
                .long("severity")
                .value_name("LEVEL")
                .default_value("warning")
                .help("warning, error or fatal"),
        )
        .arg(
            Arg::new("sensor")
                .long("sensor")
                .value_name("NAME")
                .default_value("notify-cli"),
        )
        .arg(
            Arg::new("description")
                .long("description")
                .value_name("TEXT")
                .default_value("test notification"),
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
    let severity = severity_from_str(matches.get_one::<String>("severity").expect("has default"));
    let sensor = matches.get_one::<String>("sensor").expect("has default");
    let description = matches
        .get_one::<String>("description")
        .expect("has default");

    let link = Link::robot_side(address, port, LinkCallbacks::default(), &log)
        .expect("Link construction failed");

    // Give the heartbeat exchange a moment before giving up on the peer.
    let deadline = Instant::now() + Duration::from_secs(2);
    while !link.connected() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(25));
    }

    let outcome = link.send_opbox_notification(severity, sensor, description);

    info!(log, "notification finished";
          "success" => outcome.success,
          "message" => &outcome.message);

    std::process::exit(if outcome.success { 0 } else { 1 });
}
