//! The error taxonomy shared by sessions, the pool, the client driver and the reactor.
//!
//! Every I/O failure reaches a session through the same completion channel as a successful result,
//! already classified into one of the variants below by [`Error::from_io`].

use {
    crate::endpoint::Endpoint,
    std::{
        fmt::{self, Display, Formatter},
        io,
    },
};

/// Result type used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The kind of an asynchronous operation, used to report which one is still outstanding.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Waiting for a peer to connect to a listening instance.
    Accept,
    /// Opening a connection to the endpoint.
    Connect,
    /// Reading into a session's read buffer.
    Read,
    /// Writing out of a session's write buffer.
    Write,
}
impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accept => "accept",
            Self::Connect => "connect",
            Self::Read => "read",
            Self::Write => "write",
        })
    }
}

/// Errors produced by sessions and the components that drive them.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The remote end closed its side of the stream. Expected; terminal for the session.
    #[error("the peer closed the connection")]
    PeerDisconnected,

    /// The endpoint did not become available within the configured wait policy.
    #[error("endpoint {endpoint} is unavailable")]
    EndpointUnavailable {
        /// The endpoint that could not be reached.
        endpoint: Endpoint,
        /// The last error reported by the transport while trying.
        #[source]
        source: io::Error,
    },

    /// Any other I/O failure. Treated as fatal for the session it happened on.
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),

    /// A just-closed server instance could not be prepared for reuse. Fatal for the whole server.
    #[error("failed to reset the endpoint instance: {0}")]
    ResetFailed(#[source] io::Error),

    /// The pool could not create a new listening instance. Fatal for the whole server.
    #[error("failed to provision a listening instance: {0}")]
    ProvisionFailed(#[source] io::Error),

    /// An operation of the given kind is already outstanding on the session.
    #[error("a {0} operation is already outstanding on this session")]
    OperationInFlight(OperationKind),

    /// The payload does not fit in the session's write buffer.
    #[error("payload of {len} bytes exceeds the buffer capacity of {capacity} bytes")]
    PayloadTooLarge {
        /// Length of the rejected payload.
        len: usize,
        /// Capacity of the write buffer.
        capacity: usize,
    },

    /// The session has no stream attached, either because it has not connected yet or because it
    /// was already closed.
    #[error("the session is not connected")]
    NotConnected,

    /// The reactor was stopped before the operation could be dispatched.
    #[error("the reactor has been stopped")]
    ReactorStopped,
}

impl Error {
    /// Classifies a raw I/O error coming out of the transport.
    ///
    /// Broken pipes, resets, aborts and unexpected EOFs all mean that the remote end went away,
    /// and map to [`PeerDisconnected`](Self::PeerDisconnected). Everything else is a
    /// [`Transport`](Self::Transport) error.
    pub fn from_io(e: io::Error) -> Self {
        use io::ErrorKind::*;
        match e.kind() {
            BrokenPipe | ConnectionReset | ConnectionAborted | UnexpectedEof => {
                Self::PeerDisconnected
            }
            _ => Self::Transport(e),
        }
    }

    /// Whether this is the expected end of a session rather than a failure.
    #[inline]
    pub fn is_peer_disconnect(&self) -> bool { matches!(self, Self::PeerDisconnected) }

    /// Whether the error must bring down the whole server rather than just one session.
    #[inline]
    pub fn is_fatal(&self) -> bool { matches!(self, Self::ResetFailed(..) | Self::ProvisionFailed(..)) }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(e: io::Error) -> Self { Self::from_io(e) }
}
