//! Semantic indicator states and their concrete timings. The tables here are
//! the authoritative mapping; everything else just plays them back.

use crate::pattern::{Pattern, Step, HOLD_FOREVER};
use crate::scheduler::Actuator;
use crate::sink::Sink;
use crate::steps;
use slog::Logger;
use std::time::Duration;

const fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LedState {
    Off,
    On,
    BlinkOnce,
    BlinkTwice,
    FastBlink,
    SlowBlink,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BuzzerState {
    Off,
    Chirp,
    LongChirp,
    ChirpTwice,
    Panic,
}

pub fn led_pattern(state: LedState) -> Pattern<i32> {
    match state {
        LedState::Off => steps![(0, ms(1000))],
        LedState::On => steps![(1, ms(1000))],
        LedState::BlinkOnce => steps![(0, ms(125)), (1, ms(125)), (0, ms(125)), (0, HOLD_FOREVER)],
        LedState::BlinkTwice => steps![
            (0, ms(125)),
            (1, ms(125)),
            (0, ms(125)),
            (1, ms(125)),
            (0, HOLD_FOREVER),
        ],
        LedState::FastBlink => steps![(0, ms(250)), (1, ms(250))],
        LedState::SlowBlink => steps![(0, ms(1000)), (1, ms(1000))],
    }
}

pub fn buzzer_pattern(state: BuzzerState) -> Pattern<i32> {
    match state {
        BuzzerState::Off => steps![(0, ms(1000))],
        BuzzerState::Chirp => steps![(1, ms(125)), (0, HOLD_FOREVER)],
        BuzzerState::LongChirp => steps![(1, ms(500)), (0, HOLD_FOREVER)],
        BuzzerState::ChirpTwice => steps![
            (0, ms(125)),
            (1, ms(125)),
            (0, ms(125)),
            (1, ms(125)),
            (0, HOLD_FOREVER),
        ],
        BuzzerState::Panic => {
            // A long blast, then a rapid stutter until replaced.
            let mut pattern = steps![(1, ms(500))];

            for _ in 0..50 {
                pattern.push(Step { value: 0, hold: ms(5) });
                pattern.push(Step { value: 1, hold: ms(5) });
            }

            pattern
        }
    }
}

/// One physical LED driven through an actuator.
pub struct Led {
    actuator: Actuator<i32>,
}

impl Led {
    pub fn new<'a, S, L>(sink: S, log: L) -> Led
    where
        S: Sink<i32> + 'static,
        L: Into<Option<&'a Logger>>,
    {
        Led {
            actuator: Actuator::new(sink, 0, log),
        }
    }

    /// Replaces whatever the LED is doing.
    pub fn set_state(&self, state: LedState) {
        self.actuator.set_pattern(led_pattern(state), true);
    }

    /// Queues `state` to start `delay` after the current one began.
    pub fn set_next_state(&self, state: LedState, delay: Duration) {
        self.actuator.set_next_pattern(led_pattern(state), delay);
    }

    pub fn output(&self) -> i32 {
        self.actuator.state()
    }
}

/// The buzzer, same drive model as an LED.
pub struct Buzzer {
    actuator: Actuator<i32>,
}

impl Buzzer {
    pub fn new<'a, S, L>(sink: S, log: L) -> Buzzer
    where
        S: Sink<i32> + 'static,
        L: Into<Option<&'a Logger>>,
    {
        Buzzer {
            actuator: Actuator::new(sink, 0, log),
        }
    }

    pub fn set_state(&self, state: BuzzerState) {
        self.actuator.set_pattern(buzzer_pattern(state), true);
    }

    pub fn set_next_state(&self, state: BuzzerState, delay: Duration) {
        self.actuator.set_next_pattern(buzzer_pattern(state), delay);
    }

    pub fn output(&self) -> i32 {
        self.actuator.state()
    }
}

/// The kill-switch status LED trio on the box face.
pub struct KillSwitchLeds {
    pub green: Led,
    pub yellow: Led,
    pub red: Led,
}

impl KillSwitchLeds {
    pub fn new(green: Led, yellow: Led, red: Led) -> KillSwitchLeds {
        KillSwitchLeds { green, yellow, red }
    }

    pub fn set_all(&self, state: LedState) {
        self.green.set_state(state);
        self.yellow.set_state(state);
        self.red.set_state(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use std::thread::sleep;

    #[test]
    fn test_led_pattern_table() {
        assert_eq!(led_pattern(LedState::On), steps![(1, ms(1000))]);
        assert_eq!(
            led_pattern(LedState::BlinkOnce),
            steps![(0, ms(125)), (1, ms(125)), (0, ms(125)), (0, HOLD_FOREVER)]
        );
        assert_eq!(led_pattern(LedState::FastBlink), steps![(0, ms(250)), (1, ms(250))]);
        assert_eq!(led_pattern(LedState::SlowBlink), steps![(0, ms(1000)), (1, ms(1000))]);
        assert_eq!(led_pattern(LedState::BlinkTwice).len(), 5);
    }

    #[test]
    fn test_buzzer_pattern_table() {
        assert_eq!(buzzer_pattern(BuzzerState::Chirp), steps![(1, ms(125)), (0, HOLD_FOREVER)]);
        assert_eq!(
            buzzer_pattern(BuzzerState::LongChirp),
            steps![(1, ms(500)), (0, HOLD_FOREVER)]
        );
        assert_eq!(buzzer_pattern(BuzzerState::ChirpTwice).len(), 5);

        let panic = buzzer_pattern(BuzzerState::Panic);
        assert_eq!(panic.len(), 101);
        assert_eq!(panic[0], Step { value: 1, hold: ms(500) });
        assert_eq!(panic[1], Step { value: 0, hold: ms(5) });
        assert_eq!(panic[100], Step { value: 1, hold: ms(5) });
    }

    #[test]
    fn test_led_drives_sink() {
        let sink = MemorySink::new();
        let led = Led::new(sink.clone(), None);

        led.set_state(LedState::On);
        sleep(Duration::from_millis(50));

        assert_eq!(led.output(), 1);
        assert_eq!(sink.last(), Some(1));

        led.set_state(LedState::Off);
        sleep(Duration::from_millis(50));

        assert_eq!(led.output(), 0);
    }

    #[test]
    fn test_trio_sets_every_led() {
        let green_sink = MemorySink::new();
        let yellow_sink = MemorySink::new();
        let red_sink = MemorySink::new();

        let leds = KillSwitchLeds::new(
            Led::new(green_sink.clone(), None),
            Led::new(yellow_sink.clone(), None),
            Led::new(red_sink.clone(), None),
        );

        leds.set_all(LedState::On);
        sleep(Duration::from_millis(50));

        assert_eq!(green_sink.last(), Some(1));
        assert_eq!(yellow_sink.last(), Some(1));
        assert_eq!(red_sink.last(), Some(1));
    }
}
