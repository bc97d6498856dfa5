use std::{
    fmt::{self, Display, Formatter},
    sync::atomic::{
        AtomicU8,
        Ordering::{AcqRel, Acquire},
    },
};

/// Where a [`Session`](super::Session) is in its lifecycle.
///
/// States only ever move forward. A closed session stays closed; the pool replaces it with a fresh
/// listening session instead of reviving it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    /// Created, no operation armed yet.
    Idle = 0,
    /// Waiting for a peer to connect to this instance.
    Listening = 1,
    /// A stream is attached and no data has been transferred yet.
    Connected = 2,
    /// The last completed transfer was a read.
    Reading = 3,
    /// The last completed transfer was a write.
    Writing = 4,
    /// The stream has been released. Terminal.
    Closed = 5,
}
impl SessionState {
    /// Whether the state machine permits going from `self` to `to`.
    pub fn can_advance(self, to: Self) -> bool {
        use SessionState::*;
        match (self, to) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Idle, Listening | Connected) => true,
            (Listening, Connected) => true,
            (Connected | Reading | Writing, Reading | Writing) => true,
            _ => false,
        }
    }
    #[inline]
    fn from_u8(v: u8) -> Self {
        use SessionState::*;
        match v {
            0 => Idle,
            1 => Listening,
            2 => Connected,
            3 => Reading,
            4 => Writing,
            _ => Closed,
        }
    }
}
impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use SessionState::*;
        f.write_str(match self {
            Idle => "idle",
            Listening => "listening",
            Connected => "connected",
            Reading => "reading",
            Writing => "writing",
            Closed => "closed",
        })
    }
}

#[derive(Debug)]
pub(crate) struct AtomicSessionState(AtomicU8);
impl AtomicSessionState {
    #[inline]
    pub fn new(state: SessionState) -> Self { Self(AtomicU8::new(state as u8)) }
    #[inline]
    pub fn load(&self) -> SessionState { SessionState::from_u8(self.0.load(Acquire)) }
    /// Moves to `to` if the transition is legal from whatever the current state is. On failure,
    /// returns the state that refused the transition.
    pub fn advance(&self, to: SessionState) -> Result<SessionState, SessionState> {
        let mut current = self.load();
        loop {
            if !current.can_advance(to) {
                return Err(current);
            }
            match self.0.compare_exchange_weak(current as u8, to as u8, AcqRel, Acquire) {
                Ok(_) => return Ok(current),
                Err(actual) => current = SessionState::from_u8(actual),
            }
        }
    }
}
