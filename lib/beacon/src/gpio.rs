//! Polled GPIO input. The kill button arrives as a sysfs-style value file;
//! a worker thread watches it and reports edges to a callback.

use slog::{debug, o, trace, Discard, Logger};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Watches a value file and invokes the callback with every changed reading.
/// The callback runs on the sensor's worker thread.
pub struct GpioSensor {
    stop: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl GpioSensor {
    pub fn new<'a, P, F, L>(path: P, on_change: F, log: L) -> GpioSensor
    where
        P: Into<PathBuf>,
        F: Fn(i32) + Send + 'static,
        L: Into<Option<&'a Logger>>,
    {
        let path = path.into();
        let log = match log.into() {
            Some(log) => log.new(o!("gpio" => path.display().to_string())),
            None => Logger::root(Discard, o!()),
        };

        let stop = Arc::new(AtomicBool::new(false));
        let worker = {
            let stop = stop.clone();

            thread::Builder::new()
                .name("gpio-sensor".to_string())
                .spawn(move || Self::poll_loop(path, on_change, stop, log))
                .expect("Gpio sensor thread spawn failed")
        };

        GpioSensor {
            stop,
            worker: Some(worker),
        }
    }

    fn poll_loop<F: Fn(i32)>(path: PathBuf, on_change: F, stop: Arc<AtomicBool>, log: Logger) {
        debug!(log, "sensor thread starting");

        let mut last: Option<i32> = None;

        while !stop.load(Ordering::Relaxed) {
            match Self::read_value(&path) {
                Some(value) => {
                    if last != Some(value) {
                        debug!(log, "input changed"; "value" => value);
                        on_change(value);
                        last = Some(value);
                    }
                }
                None => {
                    trace!(log, "input unreadable");
                }
            }

            thread::sleep(POLL_INTERVAL);
        }

        debug!(log, "sensor thread ending");
    }

    fn read_value(path: &PathBuf) -> Option<i32> {
        fs::read_to_string(path)
            .ok()
            .and_then(|text| text.trim().parse().ok())
    }
}

impl Drop for GpioSensor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread::sleep;

    fn scratch_file(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("beacon-gpio-{}-{}", tag, std::process::id()))
    }

    #[test]
    fn test_reports_edges_only() {
        let path = scratch_file("edges");
        fs::write(&path, "0").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let sensor = GpioSensor::new(&path, move |value| sink.lock().unwrap().push(value), None);

        sleep(Duration::from_millis(100));
        fs::write(&path, "1").unwrap();
        sleep(Duration::from_millis(100));
        // Unchanged rewrite must not re-fire.
        fs::write(&path, "1").unwrap();
        sleep(Duration::from_millis(100));
        fs::write(&path, "0").unwrap();
        sleep(Duration::from_millis(100));

        drop(sensor);

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 0]);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_survives_missing_file() {
        let path = scratch_file("missing");
        let _ = fs::remove_file(&path);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let sensor = GpioSensor::new(&path, move |value| sink.lock().unwrap().push(value), None);

        sleep(Duration::from_millis(100));
        assert!(seen.lock().unwrap().is_empty());

        fs::write(&path, "7").unwrap();
        sleep(Duration::from_millis(100));

        drop(sensor);

        assert_eq!(*seen.lock().unwrap(), vec![7]);

        let _ = fs::remove_file(&path);
    }
}
