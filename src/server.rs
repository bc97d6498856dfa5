//! The listening side: a pool of sessions that keeps the endpoint accepting new peers.
//!
//! ```no_run
//! use sessionpipe::{transport, Endpoint, Reactor, ServerOptions};
//!
//! let endpoint = Endpoint::default();
//! let reactor = Reactor::new()?;
//! let server = ServerOptions::new()
//!     .min_listening(1)
//!     .create(reactor, transport::server(&endpoint, 4096)?);
//! // Serve on two worker threads until a fatal error stops the reactor.
//! server.run(2)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod machine;
mod pool;

pub use pool::*;

use {
    crate::{
        error::Result,
        lossy_preview,
        reactor::Reactor,
        session::SessionId,
        transport::Transport,
    },
    std::sync::Arc,
};

/// What the server does with the bytes of each completed read.
pub type Consumer = Arc<dyn Fn(SessionId, &[u8]) + Send + Sync + 'static>;

/// The default [`Consumer`], which logs every chunk.
pub fn log_consumer() -> Consumer {
    Arc::new(|id, data| {
        tracing::info!(session = %id, bytes = data.len(), message = %lossy_preview(data), "Message Read");
    })
}

/// Server-side builder.
#[derive(Clone)]
pub struct ServerOptions {
    min_listening: usize,
    buffer_size: usize,
    consumer: Consumer,
}
debug_fields!(ServerOptions, min_listening, buffer_size);
impl ServerOptions {
    /// The read buffer size used unless configured otherwise.
    pub const DEFAULT_BUFFER_SIZE: usize = 4096;

    /// Returns the default set of options: one listening session, 4 KiB buffers and the
    /// [logging consumer](log_consumer).
    pub fn new() -> Self {
        Self {
            min_listening: 1,
            buffer_size: Self::DEFAULT_BUFFER_SIZE,
            consumer: log_consumer(),
        }
    }
    builder_setters! {
        /// Sets how many sessions are kept waiting for peers at all times. Zero is treated as one.
        ///
        /// Sessions and worker threads scale independently: one thread can serve any number of
        /// sessions.
        min_listening: usize,
        /// Sets the capacity of each session's read and write buffers.
        buffer_size: usize,
        /// Sets what's done with received bytes.
        consumer: Consumer,
    }
    /// Creates a server that uses `reactor` to drive sessions created by `transport`. No sessions
    /// are provisioned until the server is [started](Server::start).
    pub fn create<T: Transport>(self, reactor: Reactor, transport: T) -> Server<T> {
        Server { pool: SessionPool::new(reactor, transport, self) }
    }
}
impl Default for ServerOptions {
    #[inline]
    fn default() -> Self { Self::new() }
}

/// A server accepting any number of concurrent peers on one endpoint.
#[derive(Debug)]
pub struct Server<T: Transport> {
    pool: Arc<SessionPool<T>>,
}
impl<T: Transport> Server<T> {
    /// Provisions the configured number of listening sessions.
    ///
    /// The sessions start waiting for peers right away, but their completions are only dispatched
    /// once the reactor is running.
    pub fn start(&self) -> Result<()> {
        self.pool.replenish()?;
        tracing::info!(
            endpoint = %self.pool.transport().endpoint(),
            listening = self.pool.listening(),
            "server listening",
        );
        Ok(())
    }
    /// [Starts](Self::start) the server and runs the reactor on `threads` worker threads until it
    /// stops.
    ///
    /// Returns the fatal error that stopped the reactor, if that's what happened.
    pub fn run(&self, threads: usize) -> Result<()> {
        self.start()?;
        self.pool.reactor().run_on(threads)?;
        match self.pool.take_fatal() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
    /// Stops the reactor and closes every session.
    pub fn shutdown(&self) {
        self.pool.reactor().stop();
        self.pool.close_all();
    }
    /// Returns the session pool.
    #[inline]
    pub fn pool(&self) -> &Arc<SessionPool<T>> { &self.pool }
}
