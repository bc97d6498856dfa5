//! Pacing policies for the client's write loop.
//!
//! A pause between successive writes is a stand-in for real backpressure toward a slow consumer.
//! It's a knob, not a correctness mechanism: [`NoDelay`] is always a valid choice.

use std::{fmt::Debug, time::Duration};

/// Decides how long to wait before each write after the first.
pub trait Pacing: Debug + Send + Sync + 'static {
    /// Returns the pause before the next write, given how many writes have completed so far.
    fn delay(&self, completed: u32) -> Duration;
}

/// Waits the same amount of time before every write.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FixedDelay(pub Duration);
impl Pacing for FixedDelay {
    #[inline]
    fn delay(&self, _: u32) -> Duration { self.0 }
}
impl Default for FixedDelay {
    /// One second, as between the writes of the demo client.
    fn default() -> Self { Self(Duration::from_secs(1)) }
}

/// Never waits.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NoDelay;
impl Pacing for NoDelay {
    #[inline]
    fn delay(&self, _: u32) -> Duration { Duration::ZERO }
}
