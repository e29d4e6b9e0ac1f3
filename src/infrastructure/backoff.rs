use std::time::Duration;

/// Delay before the next reconnect attempt, as a function of how many
/// consecutive attempts have already been made.
///
/// There is no retry cap: past 100 attempts the client keeps retrying at the
/// 60-second interval until the channel set empties or the process ends.
pub fn retry_delay(attempts: u32) -> Duration {
    let millis = match attempts {
        0..=4 => 1_000,
        5..=14 => 5_000,
        15..=99 => 10_000,
        _ => 60_000,
    };
    Duration::from_millis(millis)
}
