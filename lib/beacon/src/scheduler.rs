//! Pattern playback. An [`Actuator`] owns one worker thread that plays the
//! active pattern step by step, watching a queue of delayed follow-ups. A new
//! pattern preempts the running step within one poll tick; on shutdown the
//! worker leaves the sink at the default value.

use crate::pattern::{Pattern, Step};
use crate::sink::Sink;
use slog::{debug, o, Discard, Logger};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Poll granularity of the worker: preemption and queue promotion are
/// observed within this bound.
const PLAYBACK_TICK: Duration = Duration::from_millis(5);

/// Step substituted when concurrent mutation leaves the active pattern
/// shorter than the playback index.
const FALLBACK_HOLD: Duration = Duration::from_millis(100);

struct QueueEntry<T> {
    pattern: Pattern<T>,
    /// Measured from the instant the entry ahead of it was installed.
    delay: Duration,
}

struct Playback<T> {
    active: Pattern<T>,
    queue: VecDeque<QueueEntry<T>>,
    /// When the queue head started aging.
    queue_start: Instant,
    /// When the active pattern was installed.
    active_start: Instant,
    last_value: T,
}

/// Plays `(value, hold)` patterns on a sink from a worker thread.
///
/// At most one pattern is active at a time. A non-empty active pattern with
/// an empty queue replays from the top, which is how the repeating blink
/// states work; one-shot patterns end in a long terminal hold instead.
pub struct Actuator<T: Copy + Send + 'static> {
    playback: Arc<Mutex<Playback<T>>>,
    stop: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl<T: Copy + Send + 'static> Actuator<T> {
    /// Spawns the worker and drives the sink to `default_value`. The same
    /// value is restored when the actuator is dropped.
    pub fn new<'a, S, L>(sink: S, default_value: T, log: L) -> Actuator<T>
    where
        S: Sink<T> + 'static,
        L: Into<Option<&'a Logger>>,
    {
        let log = match log.into() {
            Some(log) => log.new(o!("component" => "actuator")),
            None => Logger::root(Discard, o!()),
        };

        let now = Instant::now();
        let playback = Arc::new(Mutex::new(Playback {
            active: Vec::new(),
            queue: VecDeque::new(),
            queue_start: now,
            active_start: now,
            last_value: default_value,
        }));

        let stop = Arc::new(AtomicBool::new(false));
        let worker = {
            let playback = playback.clone();
            let stop = stop.clone();

            thread::Builder::new()
                .name("actuator".to_string())
                .spawn(move || Self::playback_loop(sink, playback, stop, default_value, log))
                .expect("Actuator thread spawn failed")
        };

        Actuator {
            playback,
            stop,
            worker: Some(worker),
        }
    }

    /// Replaces the active pattern. With `clear_queue` the pending follow-ups
    /// are dropped; otherwise the head entry's delay is reduced by the time
    /// the preempted pattern already played, keeping the queue's absolute
    /// schedule. Takes effect within one poll tick.
    pub fn set_pattern(&self, pattern: Pattern<T>, clear_queue: bool) {
        let mut playback = self.playback.lock().expect("Playback state poisoned");
        let now = Instant::now();
        let played = now.duration_since(playback.active_start);

        if clear_queue {
            playback.queue.clear();
        } else if let Some(front) = playback.queue.front_mut() {
            front.delay = front.delay.checked_sub(played).unwrap_or_default();
        }

        playback.queue.push_front(QueueEntry {
            pattern,
            delay: Duration::from_secs(0),
        });
        playback.queue_start = now;
    }

    /// Appends a follow-up that starts `delay` after the pattern ahead of it
    /// was installed.
    pub fn set_next_pattern(&self, pattern: Pattern<T>, delay: Duration) {
        let mut playback = self.playback.lock().expect("Playback state poisoned");
        playback.queue.push_back(QueueEntry { pattern, delay });
    }

    /// Last value written to the sink.
    pub fn state(&self) -> T {
        self.playback.lock().expect("Playback state poisoned").last_value
    }

    fn playback_loop<S: Sink<T>>(
        mut sink: S,
        playback: Arc<Mutex<Playback<T>>>,
        stop: Arc<AtomicBool>,
        default_value: T,
        log: Logger,
    ) {
        debug!(log, "playback thread starting");
        Self::drive(&mut sink, &playback, default_value, &log);

        'outer: while !stop.load(Ordering::Relaxed) {
            if Self::install_due_entry(&playback) {
                continue;
            }

            let len = playback.lock().expect("Playback state poisoned").active.len();
            if len == 0 {
                thread::sleep(PLAYBACK_TICK);
                continue;
            }

            let mut index = 0;
            while index < len {
                if stop.load(Ordering::Relaxed) {
                    break 'outer;
                }

                let step = Self::step_at(&playback, index, default_value, &log);
                Self::drive(&mut sink, &playback, step.value, &log);

                let held_from = Instant::now();
                while held_from.elapsed() < step.hold {
                    if stop.load(Ordering::Relaxed) {
                        break 'outer;
                    }

                    if Self::queue_head_due(&playback) {
                        continue 'outer;
                    }

                    thread::sleep(PLAYBACK_TICK);
                }

                index += 1;
            }
        }

        Self::drive(&mut sink, &playback, default_value, &log);
        debug!(log, "playback thread ending");
    }

    /// Promotes the queue head to active when its delay has elapsed.
    fn install_due_entry(playback: &Mutex<Playback<T>>) -> bool {
        let mut playback = playback.lock().expect("Playback state poisoned");
        let now = Instant::now();

        let due = playback
            .queue
            .front()
            .map(|entry| now.duration_since(playback.queue_start) >= entry.delay)
            .unwrap_or(false);

        if due {
            let entry = playback.queue.pop_front().expect("Due entry vanished");
            playback.active = entry.pattern;
            playback.queue_start = now;
            playback.active_start = now;
        }

        due
    }

    fn queue_head_due(playback: &Mutex<Playback<T>>) -> bool {
        let playback = playback.lock().expect("Playback state poisoned");
        let now = Instant::now();

        playback
            .queue
            .front()
            .map(|entry| now.duration_since(playback.queue_start) >= entry.delay)
            .unwrap_or(false)
    }

    fn step_at(
        playback: &Mutex<Playback<T>>,
        index: usize,
        default_value: T,
        log: &Logger,
    ) -> Step<T> {
        let playback = playback.lock().expect("Playback state poisoned");

        match playback.active.get(index) {
            Some(step) => *step,
            None => {
                debug!(log, "pattern shrank under playback"; "index" => index);
                Step {
                    value: default_value,
                    hold: FALLBACK_HOLD,
                }
            }
        }
    }

    fn drive<S: Sink<T>>(sink: &mut S, playback: &Mutex<Playback<T>>, value: T, log: &Logger) {
        playback.lock().expect("Playback state poisoned").last_value = value;

        if let Err(err) = sink.write(value) {
            debug!(log, "sink write failed"; "err" => ?err);
        }
    }
}

impl<T: Copy + Send + 'static> Drop for Actuator<T> {
    /// Destruction is the cancellation primitive: flag the worker, join it,
    /// and let it restore the default value on the way out.
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
    use crate::pattern::HOLD_FOREVER;
    use crate::sink::MemorySink;
    use crate::steps;
    use std::thread::sleep;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn actuator_with_sink() -> (Actuator<i32>, MemorySink<i32>) {
        let sink = MemorySink::new();
        let actuator = Actuator::new(sink.clone(), 0, None);
        (actuator, sink)
    }

    #[test]
    fn test_default_written_at_startup() {
        let (actuator, sink) = actuator_with_sink();

        sleep(ms(50));

        assert_eq!(sink.last(), Some(0));
        assert_eq!(actuator.state(), 0);
    }

    #[test]
    fn test_pattern_first_step_latency() {
        let (actuator, _sink) = actuator_with_sink();

        sleep(ms(20));
        actuator.set_pattern(steps![(1, HOLD_FOREVER)], true);
        sleep(ms(50));

        assert_eq!(actuator.state(), 1);
    }

    #[test]
    fn test_one_shot_holds_terminal_value() {
        let (actuator, _sink) = actuator_with_sink();

        actuator.set_pattern(steps![(1, ms(200)), (0, HOLD_FOREVER)], true);

        sleep(ms(100));
        assert_eq!(actuator.state(), 1);

        sleep(ms(200));
        assert_eq!(actuator.state(), 0);

        sleep(ms(200));
        assert_eq!(actuator.state(), 0);
    }

    #[test]
    fn test_preemption_clears_queue() {
        let (actuator, _sink) = actuator_with_sink();

        // ON now, OFF at 500 ms, ON again at 250 ms after that.
        actuator.set_pattern(steps![(1, HOLD_FOREVER)], true);
        actuator.set_next_pattern(steps![(0, HOLD_FOREVER)], ms(500));
        actuator.set_next_pattern(steps![(1, HOLD_FOREVER)], ms(250));

        sleep(ms(400));
        assert_eq!(actuator.state(), 1);

        actuator.set_pattern(steps![(0, HOLD_FOREVER)], true);

        sleep(ms(100));
        assert_eq!(actuator.state(), 0);

        // The queued follow-ups died with the preemption.
        sleep(ms(500));
        assert_eq!(actuator.state(), 0);
    }

    #[test]
    fn test_preemption_without_clear_keeps_schedule() {
        let (actuator, _sink) = actuator_with_sink();

        actuator.set_pattern(steps![(1, HOLD_FOREVER)], true);
        actuator.set_next_pattern(steps![(3, HOLD_FOREVER)], ms(400));

        sleep(ms(150));

        // Replace the active pattern but keep the queue's absolute schedule.
        actuator.set_pattern(steps![(2, HOLD_FOREVER)], false);

        sleep(ms(100));
        assert_eq!(actuator.state(), 2);

        // The follow-up still lands at roughly its original instant.
        sleep(ms(350));
        assert_eq!(actuator.state(), 3);
    }

    #[test]
    fn test_repeating_pattern_cycles() {
        let (actuator, sink) = actuator_with_sink();

        actuator.set_pattern(steps![(0, ms(50)), (1, ms(50))], true);
        sleep(ms(400));

        let values: Vec<i32> = sink.writes().into_iter().map(|(_, value)| value).collect();
        let ones = values.iter().filter(|&&value| value == 1).count();

        // Several full cycles must have played.
        assert!(ones >= 2, "expected repeated cycles, saw {:?}", values);
    }

    #[test]
    fn test_empty_pattern_is_idle() {
        let (actuator, sink) = actuator_with_sink();

        actuator.set_pattern(steps![], true);
        sleep(ms(100));

        assert_eq!(actuator.state(), 0);
        // Startup default only; the empty pattern never wrote.
        assert_eq!(sink.writes().len(), 1);

        // The queue still works from an empty active pattern.
        actuator.set_next_pattern(steps![(1, HOLD_FOREVER)], ms(50));
        sleep(ms(150));
        assert_eq!(actuator.state(), 1);
    }

    #[test]
    fn test_drop_restores_default() {
        let (actuator, sink) = actuator_with_sink();

        actuator.set_pattern(steps![(1, HOLD_FOREVER)], true);
        sleep(ms(50));
        assert_eq!(sink.last(), Some(1));

        drop(actuator);

        assert_eq!(sink.last(), Some(0));
    }
}
