//! The connection primitives sessions are built on.
//!
//! The reactor and the sessions only ever need a connected, readable and writable byte stream.
//! How a listening instance is created, how it waits for a peer and how a client finds the
//! endpoint is the business of a [`Transport`]. Two are provided: Unix domain sockets and Windows
//! named pipes. [`DefaultTransport`] names the one for the current platform.

#[cfg(unix)]
#[cfg_attr(feature = "doc_cfg", doc(cfg(unix)))]
pub mod unix;
#[cfg(windows)]
#[cfg_attr(feature = "doc_cfg", doc(cfg(windows)))]
pub mod windows;

use {
    crate::{endpoint::Endpoint, noop_waker},
    futures_core::future::BoxFuture,
    std::{
        fmt::{self, Debug, Formatter},
        future::Future,
        io,
        task::{Context, Poll},
    },
    tokio::io::{AsyncRead, AsyncWrite},
};

/// The transport of the current platform.
#[cfg(unix)]
pub type DefaultTransport = unix::LocalSocketTransport;
/// The transport of the current platform.
#[cfg(windows)]
pub type DefaultTransport = windows::NamedPipeTransport;

/// Creates the platform's transport for a server listening on `endpoint`.
///
/// `buffer_size` is passed to the transport as a hint for its own buffering, where it has any.
pub fn server(endpoint: &Endpoint, buffer_size: usize) -> io::Result<DefaultTransport> {
    #[cfg(unix)]
    {
        let _ = buffer_size;
        unix::LocalSocketTransport::bind(endpoint.clone(), unix::LocalSocketOptions::new())
    }
    #[cfg(windows)]
    {
        Ok(windows::NamedPipeTransport::new(endpoint.clone(), buffer_size))
    }
}
/// Creates the platform's transport for a client connecting to `endpoint`.
pub fn client(endpoint: &Endpoint) -> DefaultTransport {
    #[cfg(unix)]
    {
        unix::LocalSocketTransport::new(endpoint.clone())
    }
    #[cfg(windows)]
    {
        windows::NamedPipeTransport::new(endpoint.clone(), 0)
    }
}

/// A duplex, byte-stream transport bound to one [`Endpoint`].
///
/// [`create_instance()`](Self::create_instance), [`accept()`](Self::accept) and
/// [`connect()`](Self::connect) are always called with the reactor's I/O driver
/// [entered](crate::Reactor::enter), so implementations may register handles with it. Closing a
/// stream is dropping it.
pub trait Transport: Send + Sync + 'static {
    /// A server-side instance that a single peer can connect to.
    type Instance: Send + 'static;
    /// A connected stream.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// The endpoint this transport is bound to.
    fn endpoint(&self) -> &Endpoint;
    /// Creates a new instance on the endpoint. Any number of instances may be waiting for peers at
    /// the same time.
    fn create_instance(&self) -> io::Result<Self::Instance>;
    /// Starts waiting for a peer to connect to `instance`.
    fn accept(&self, instance: Self::Instance) -> Accept<Self::Stream>;
    /// Makes a single attempt at connecting to the endpoint.
    fn connect(&self) -> BoxFuture<'static, io::Result<Self::Stream>>;
    /// Prepares the server side of a stream whose peer has left for reuse, right before the stream
    /// is dropped.
    fn disconnect_reset(&self, stream: &mut Self::Stream) -> io::Result<()>;

    /// Whether a failed [`connect()`](Self::connect) means that the endpoint is not there (yet),
    /// as opposed to a failure that waiting won't fix.
    fn is_unavailable(&self, e: &io::Error) -> bool {
        use io::ErrorKind::*;
        matches!(e.kind(), NotFound | ConnectionRefused | WouldBlock)
    }
}

/// The outcome of starting an accept.
///
/// Whether a peer was already connected at the time the accept started is platform-dependent;
/// both outcomes are delivered to the same continuation by the server.
pub enum Accept<S> {
    /// The accept finished without waiting.
    Ready(io::Result<S>),
    /// The accept is waiting for a peer.
    Pending(BoxFuture<'static, io::Result<S>>),
}
impl<S> Accept<S> {
    /// Polls `future` once, with a waker that does nothing, to find out whether it finishes
    /// without waiting.
    ///
    /// Must be called with the reactor's I/O driver entered if `future` touches it.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = io::Result<S>> + Send + 'static,
    {
        let mut future: BoxFuture<'static, io::Result<S>> = Box::pin(future);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(rslt) => Self::Ready(rslt),
            Poll::Pending => Self::Pending(future),
        }
    }
    /// Whether the accept finished without waiting.
    #[inline]
    pub fn is_ready(&self) -> bool { matches!(self, Self::Ready(..)) }
}
impl<S> Debug for Accept<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(rslt) => f.debug_tuple("Ready").field(&rslt.as_ref().map(|_| ())).finish(),
            Self::Pending(..) => f.write_str("Pending"),
        }
    }
}
