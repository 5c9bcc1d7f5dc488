// Timer service seam

/// Key identifying a registered timer
pub type TimerKey = u64;

/// External periodic timer service
///
/// The service only handles registration. When a registered timer fires,
/// the host is expected to invoke the matching tick entry point of the
/// connection that owns it (ping_timer_tick for the keepalive timer).
pub trait Timers {
    /// Registers a periodic timer
    ///
    /// # Arguments
    ///
    /// * `period_seconds` - Period of the timer, in seconds
    ///
    /// # Return value
    ///
    /// A key identifying the timer, to be passed to delete_timer
    fn add_periodic_timer(&mut self, period_seconds: u32) -> TimerKey;

    /// Deregisters a timer
    ///
    /// # Arguments
    ///
    /// * `key` - Key of the timer to remove
    fn delete_timer(&mut self, key: TimerKey);
}
