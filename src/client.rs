//! The client driver: connect once, write a payload a bounded number of times, then stop.
//!
//! ```no_run
//! use sessionpipe::{transport, ClientOptions, Endpoint, FixedDelay, Reactor};
//! use std::{sync::Arc, time::Duration};
//!
//! let endpoint = Endpoint::default();
//! let client = ClientOptions::new()
//!     .pacing(Arc::new(FixedDelay(Duration::from_millis(100))))
//!     .create(Reactor::new()?, transport::client(&endpoint));
//! let summary = client.run(1)?;
//! println!("wrote {} bytes in {} writes", summary.bytes, summary.writes);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use {
    crate::{
        endpoint::ConnectWaitMode,
        error::{Error, Result},
        pacing::{FixedDelay, Pacing},
        reactor::Reactor,
        session::Session,
        transport::Transport,
        MutexExt,
    },
    std::{
        sync::{
            atomic::{AtomicU32, AtomicU64, Ordering::Relaxed},
            Arc, Mutex,
        },
        time::{Duration, Instant},
    },
    tokio::io::{AsyncRead, AsyncWrite},
};

/// Client-side builder.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    wait_mode: ConnectWaitMode,
    retry_interval: Duration,
    payload: Vec<u8>,
    max_iterations: u32,
    pacing: Arc<dyn Pacing>,
    buffer_size: usize,
}
impl ClientOptions {
    /// The payload written unless configured otherwise.
    pub const DEFAULT_PAYLOAD: &'static [u8] = b"!@#%$^SDF;oiji";
    /// The number of writes performed unless configured otherwise.
    pub const DEFAULT_ITERATIONS: u32 = 11;

    /// Returns the default set of options: wait for the endpoint indefinitely, retrying every
    /// 50 ms, then write [`DEFAULT_PAYLOAD`](Self::DEFAULT_PAYLOAD)
    /// [`DEFAULT_ITERATIONS`](Self::DEFAULT_ITERATIONS) times, one second apart.
    pub fn new() -> Self {
        Self {
            wait_mode: ConnectWaitMode::Unbounded,
            retry_interval: Duration::from_millis(50),
            payload: Self::DEFAULT_PAYLOAD.to_vec(),
            max_iterations: Self::DEFAULT_ITERATIONS,
            pacing: Arc::new(FixedDelay::default()),
            buffer_size: 4096,
        }
    }
    builder_setters! {
        /// Sets how long to wait for the endpoint to appear.
        wait_mode: ConnectWaitMode,
        /// Sets the pause between connection attempts while waiting for the endpoint.
        retry_interval: Duration,
        /// Sets the bytes written on every iteration. Must fit in the write buffer.
        payload: Vec<u8>,
        /// Sets the number of writes performed before the client closes the connection.
        max_iterations: u32,
        /// Sets the policy deciding the pause between writes.
        pacing: Arc<dyn Pacing>,
        /// Sets the capacity of the session's read and write buffers.
        buffer_size: usize,
    }
    /// Creates a client that uses `reactor` to drive a session connected through `transport`.
    pub fn create<T: Transport>(self, reactor: Reactor, transport: T) -> Client<T> {
        Client { reactor, transport, options: self }
    }
}
impl Default for ClientOptions {
    #[inline]
    fn default() -> Self { Self::new() }
}

/// Totals of a finished exchange.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExchangeSummary {
    /// Number of writes that completed successfully.
    pub writes: u32,
    /// Number of bytes written in total.
    pub bytes: u64,
}

/// A single-session client.
#[derive(Debug)]
pub struct Client<T: Transport> {
    reactor: Reactor,
    transport: T,
    options: ClientOptions,
}
impl<T: Transport> Client<T> {
    /// Waits for the endpoint according to the configured [wait mode](ConnectWaitMode), then
    /// connects to it and returns a connected session.
    ///
    /// Blocks the calling thread, so it must not be called from a continuation. Fails with
    /// [`Error::EndpointUnavailable`] if the endpoint doesn't appear in time.
    pub fn connect_blocking_wait(&self) -> Result<Arc<Session<T::Stream>>> {
        let expiry = self.options.wait_mode.expiry(Instant::now())?;
        let stream = self.reactor.block_on(async {
            loop {
                let e = match self.transport.connect().await {
                    Ok(stream) => return Ok(stream),
                    Err(e) if self.transport.is_unavailable(&e) => e,
                    Err(e) => return Err(Error::Transport(e)),
                };
                let now = Instant::now();
                let pause = match expiry {
                    Some(end) if now >= end => {
                        return Err(Error::EndpointUnavailable {
                            endpoint: self.transport.endpoint().clone(),
                            source: e,
                        });
                    }
                    Some(end) => self.options.retry_interval.min(end.saturating_duration_since(now)),
                    None => self.options.retry_interval,
                };
                tracing::debug!(error = %e, "endpoint not available yet");
                tokio::time::sleep(pause).await;
            }
        })?;

        let session = Session::new(self.reactor.clone(), self.options.buffer_size);
        let attached = session.attach(stream);
        debug_assert!(attached, "a new session refused its stream");
        tracing::info!(session = %session.id(), endpoint = %self.transport.endpoint(), "Connected");
        Ok(session)
    }

    /// Arms the first write of the exchange on `session`.
    ///
    /// Each completed write is followed by a pause chosen by the pacing policy and the next write,
    /// until `max_iterations` writes have completed or one fails. At that point the session is
    /// closed and the reactor is stopped. The returned handle reports how it went once the reactor
    /// has finished running.
    pub fn run_exchange(&self, session: &Arc<Session<T::Stream>>, max_iterations: u32) -> Result<Exchange> {
        let state = Arc::new(ExchangeState {
            payload: self.options.payload.clone().into_boxed_slice(),
            pacing: Arc::clone(&self.options.pacing),
            max_iterations,
            writes: AtomicU32::new(0),
            bytes: AtomicU64::new(0),
            error: Mutex::new(None),
        });
        if max_iterations == 0 {
            state.finish(session, None);
        } else {
            state.arm(session, Duration::ZERO)?;
        }
        Ok(Exchange(state))
    }

    /// Connects, then runs the configured exchange on `threads` worker threads until it ends.
    pub fn run(&self, threads: usize) -> Result<ExchangeSummary> {
        let session = self.connect_blocking_wait()?;
        let exchange = self.run_exchange(&session, self.options.max_iterations)?;
        self.reactor.run_on(threads)?;
        exchange.into_result()
    }

    /// Returns the reactor the client's session is driven by.
    #[inline]
    pub fn reactor(&self) -> &Reactor { &self.reactor }
    /// Returns the transport the client connects with.
    #[inline]
    pub fn transport(&self) -> &T { &self.transport }
}

/// Handle to an exchange started by [`Client::run_exchange()`].
#[derive(Debug)]
pub struct Exchange(Arc<ExchangeState>);
impl Exchange {
    /// Returns the totals so far.
    pub fn summary(&self) -> ExchangeSummary {
        ExchangeSummary { writes: self.0.writes.load(Relaxed), bytes: self.0.bytes.load(Relaxed) }
    }
    /// Returns the totals, or the error that ended the exchange early.
    pub fn into_result(self) -> Result<ExchangeSummary> {
        match self.0.error.lock_or_recover().take() {
            Some(e) => Err(e),
            None => Ok(self.summary()),
        }
    }
}

#[derive(Debug)]
struct ExchangeState {
    payload: Box<[u8]>,
    pacing: Arc<dyn Pacing>,
    max_iterations: u32,
    writes: AtomicU32,
    bytes: AtomicU64,
    error: Mutex<Option<Error>>,
}
impl ExchangeState {
    fn arm<S>(self: &Arc<Self>, session: &Arc<Session<S>>, delay: Duration) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let state = Arc::clone(self);
        session.begin_write(&self.payload, delay, move |session, rslt| state.on_write(session, rslt))
    }
    fn on_write<S>(self: Arc<Self>, session: &Arc<Session<S>>, rslt: Result<usize>)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let n = match rslt {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(session = %session.id(), error = %e, "Write Operation failed");
                self.finish(session, Some(e));
                return;
            }
        };
        let writes = self.writes.fetch_add(1, Relaxed).saturating_add(1);
        self.bytes.fetch_add(n as u64, Relaxed);
        tracing::info!(session = %session.id(), bytes = n, writes, "Write Operation: success");

        if writes >= self.max_iterations {
            self.finish(session, None);
            return;
        }
        if let Err(e) = self.arm(session, self.pacing.delay(writes)) {
            self.finish(session, Some(e));
        }
    }
    fn finish<S>(&self, session: &Arc<Session<S>>, error: Option<Error>)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        if let Some(e) = error {
            self.error.lock_or_recover().get_or_insert(e);
        }
        session.close();
        session.reactor().stop();
    }
}
