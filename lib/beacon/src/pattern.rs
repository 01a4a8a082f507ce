use std::time::Duration;

/// Hold long enough to outlive any realistic session; the idiom for
/// "one-shot: keep the terminal value until replaced".
pub const HOLD_FOREVER: Duration = Duration::from_secs(24 * 60 * 60);

/// One playback step: drive the sink to `value`, hold for `hold`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Step<T> {
    pub value: T,
    pub hold: Duration,
}

/// Ordered steps played back by an actuator. A non-empty pattern with no
/// queued follow-up replays from the top; an empty pattern is immediately
/// finished.
pub type Pattern<T> = Vec<Step<T>>;

/// Builds a [`Pattern`] from `(value, hold)` pairs.
#[macro_export]
macro_rules! steps {
    ($(($value:expr, $hold:expr)),* $(,)?) => {
        vec![$($crate::pattern::Step { value: $value, hold: $hold }),*]
    };
}
