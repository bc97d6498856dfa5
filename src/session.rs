//! The per-connection state machine shared by the server and the client driver.
//!
//! A [`Session`] owns one stream, split into a read half and a write half, and one fixed-capacity
//! buffer for each direction. Each half forms a *lane* together with its buffer. Arming an
//! operation moves the lane into it, which is what keeps more than one read (or more than one
//! write) from ever being outstanding: while a lane is away, attempts to arm another operation on
//! it fail with [`Error::OperationInFlight`]. The completion hands the lane back.
//!
//! Closing a session cancels whatever it has in flight. The cancelled operations drop their halves
//! on the I/O driver, so the stream is released even if no worker is dispatching completions.

mod buffer;
mod state;

pub(crate) use buffer::IoBuffer;
pub use state::SessionState;

use {
    crate::{
        error::{Error, OperationKind, Result},
        reactor::Reactor,
        MutexExt,
    },
    state::AtomicSessionState,
    std::{
        fmt::{self, Debug, Display, Formatter},
        io,
        mem,
        ops::ControlFlow,
        sync::{
            atomic::{AtomicU64, Ordering::Relaxed},
            Arc, Mutex,
        },
        time::Duration,
    },
    tokio::{
        io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
        sync::watch,
    },
};

/// Stable identity of a session, used as the key in the pool's bookkeeping.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);
impl SessionId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Relaxed))
    }
    /// Returns the numeric value of the identifier.
    #[inline]
    pub fn get(self) -> u64 { self.0 }
}
impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// The state of one direction of a session.
enum Lane<H> {
    /// No stream is attached.
    Vacant(IoBuffer),
    /// Available for the next operation.
    Ready(H, IoBuffer),
    /// An operation owns the half and the buffer.
    InFlight,
}
impl<H> Lane<H> {
    fn arm(&mut self, kind: OperationKind) -> Result<(H, IoBuffer)> {
        match mem::replace(self, Self::InFlight) {
            Self::Ready(half, buffer) => Ok((half, buffer)),
            Self::InFlight => Err(Error::OperationInFlight(kind)),
            vacant @ Self::Vacant(..) => {
                *self = vacant;
                Err(Error::NotConnected)
            }
        }
    }
    fn attach(&mut self, half: H) {
        *self = match mem::replace(self, Self::InFlight) {
            Self::Vacant(buffer) | Self::Ready(_, buffer) => Self::Ready(half, buffer),
            Self::InFlight => Self::InFlight,
        }
    }
    /// Returns the lane from an operation. If the session was closed in the meantime, the half is
    /// dropped, which releases it. A cancelled operation has already dropped its half.
    fn restore(&mut self, half: Option<H>, buffer: IoBuffer, closed: bool) {
        *self = match half {
            Some(half) if !closed => Self::Ready(half, buffer),
            _ => Self::Vacant(buffer),
        };
    }
    fn detach(&mut self) -> Option<H> {
        match mem::replace(self, Self::InFlight) {
            Self::Ready(half, buffer) => {
                *self = Self::Vacant(buffer);
                Some(half)
            }
            other => {
                *self = other;
                None
            }
        }
    }
    #[inline]
    fn is_in_flight(&self) -> bool { matches!(self, Self::InFlight) }
}

/// One connection's state machine, buffers and owned stream.
pub struct Session<S> {
    id: SessionId,
    reactor: Reactor,
    state: AtomicSessionState,
    buffer_size: usize,
    closing: watch::Sender<bool>,
    reader: Mutex<Lane<ReadHalf<S>>>,
    writer: Mutex<Lane<WriteHalf<S>>>,
}

impl<S: AsyncRead + AsyncWrite + Send + Unpin + 'static> Session<S> {
    /// Creates an idle session with read and write buffers of `buffer_size` bytes each.
    pub fn new(reactor: Reactor, buffer_size: usize) -> Arc<Self> {
        Arc::new(Self {
            id: SessionId::next(),
            reactor,
            state: AtomicSessionState::new(SessionState::Idle),
            buffer_size,
            closing: watch::channel(false).0,
            reader: Mutex::new(Lane::Vacant(IoBuffer::new(buffer_size))),
            writer: Mutex::new(Lane::Vacant(IoBuffer::new(buffer_size))),
        })
    }

    /// Attaches a connected stream and moves to [`Connected`](SessionState::Connected).
    ///
    /// If the session can no longer become connected (it was closed while its accept was pending),
    /// the stream is dropped and `false` is returned.
    pub fn attach(&self, stream: S) -> bool {
        if let Err(from) = self.state.advance(SessionState::Connected) {
            tracing::debug!(session = %self.id, state = %from, "not attaching stream");
            return false;
        }
        let (rd, wr) = split(stream);
        self.reader.lock_or_recover().attach(rd);
        self.writer.lock_or_recover().attach(wr);
        true
    }

    /// Arms a read into the read buffer, up to its capacity.
    ///
    /// `handler` is invoked on a reactor worker with the received bytes every time a read
    /// completes with data. Returning [`ControlFlow::Continue`] re-arms the next read right away,
    /// with the same handler and buffer; returning [`ControlFlow::Break`] leaves the session with
    /// no read outstanding.
    ///
    /// Fails with [`Error::ReactorStopped`] if the reactor no longer dispatches completions.
    ///
    /// A read that completes with zero bytes means the peer closed its end, and is reported as
    /// [`Error::PeerDisconnected`]. Errors end the read loop regardless of what the handler
    /// returns, and are reported after the lane is back in place, so that the handler can
    /// [close](Self::close) the session.
    pub fn begin_read<F>(self: &Arc<Self>, handler: F) -> Result<()>
    where
        F: FnMut(&Arc<Self>, Result<&[u8]>) -> ControlFlow<()> + Send + 'static,
    {
        if self.reactor.is_stopped() {
            return Err(Error::ReactorStopped);
        }
        let (half, buffer) = self.reader.lock_or_recover().arm(OperationKind::Read)?;
        self.arm_read(half, buffer, handler);
        Ok(())
    }
    fn arm_read<F>(self: &Arc<Self>, mut half: ReadHalf<S>, mut buffer: IoBuffer, handler: F)
    where
        F: FnMut(&Arc<Self>, Result<&[u8]>) -> ControlFlow<()> + Send + 'static,
    {
        let session = Arc::clone(self);
        let closing = self.closing.subscribe();
        self.reactor.submit(
            async move {
                let rslt = tokio::select! {
                    biased;
                    () = closed(closing) => None,
                    rslt = half.read(buffer.as_mut_slice()) => Some(rslt.map_err(Error::from_io)),
                };
                let (half, rslt) = cancelled_or(half, rslt);
                (half, buffer, rslt)
            },
            move |(half, buffer, rslt)| session.on_read(half, buffer, rslt, handler),
        );
    }
    fn on_read<F>(
        self: Arc<Self>,
        half: Option<ReadHalf<S>>,
        buffer: IoBuffer,
        rslt: Result<usize>,
        mut handler: F,
    ) where
        F: FnMut(&Arc<Self>, Result<&[u8]>) -> ControlFlow<()> + Send + 'static,
    {
        let rslt = match (half, rslt) {
            (Some(half), Ok(n)) if n > 0 => {
                if self.state.advance(SessionState::Reading).is_err() {
                    // Closed while the read was in flight.
                    self.restore_reader(None, buffer);
                    return;
                }
                match handler(&self, Ok(buffer.filled(n))) {
                    ControlFlow::Continue(()) => self.arm_read(half, buffer, handler),
                    ControlFlow::Break(()) => self.restore_reader(Some(half), buffer),
                }
                return;
            }
            (half, rslt) => {
                self.restore_reader(half, buffer);
                rslt
            }
        };
        let err = match rslt {
            Ok(_) => Error::PeerDisconnected,
            Err(e) => e,
        };
        let _ = handler(&self, Err(err));
    }
    fn restore_reader(&self, half: Option<ReadHalf<S>>, buffer: IoBuffer) {
        let mut reader = self.reader.lock_or_recover();
        reader.restore(half, buffer, self.state() == SessionState::Closed);
    }

    /// Arms a write of `payload`, which is first copied into the write buffer.
    ///
    /// If `delay` is nonzero, the operation waits that long on the I/O driver before writing,
    /// without occupying a worker thread. `on_complete` is invoked on a reactor worker with the
    /// number of bytes written or the error that stopped the write. The write lane is back in
    /// place by then, so `on_complete` may arm the next write.
    ///
    /// Closing the session cancels a write that hasn't finished, including its delay, and reports
    /// [`Error::NotConnected`]. A write that did finish is reported as such even if the session was
    /// closed before `on_complete` ran, since its bytes went out.
    pub fn begin_write<C>(self: &Arc<Self>, payload: &[u8], delay: Duration, on_complete: C) -> Result<()>
    where
        C: FnOnce(&Arc<Self>, Result<usize>) + Send + 'static,
    {
        if self.reactor.is_stopped() {
            return Err(Error::ReactorStopped);
        }
        if payload.len() > self.buffer_size {
            return Err(Error::PayloadTooLarge { len: payload.len(), capacity: self.buffer_size });
        }
        let (mut half, mut buffer) = self.writer.lock_or_recover().arm(OperationKind::Write)?;
        let len = match buffer.fill_from(payload) {
            Ok(len) => len,
            Err(e) => {
                self.restore_writer(Some(half), buffer);
                return Err(e);
            }
        };
        let session = Arc::clone(self);
        let closing = self.closing.subscribe();
        self.reactor.submit(
            async move {
                let write = async {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    half.write_all(buffer.filled(len)).await.map(|()| len)
                };
                let rslt = tokio::select! {
                    biased;
                    () = closed(closing) => None,
                    rslt = write => Some(rslt.map_err(Error::from_io)),
                };
                let (half, rslt) = cancelled_or(half, rslt);
                (half, buffer, rslt)
            },
            move |(half, buffer, rslt)| {
                session.restore_writer(half, buffer);
                if rslt.is_ok() {
                    // Stays closed if it was closed meanwhile.
                    let _ = session.state.advance(SessionState::Writing);
                }
                on_complete(&session, rslt);
            },
        );
        Ok(())
    }
    fn restore_writer(&self, half: Option<WriteHalf<S>>, buffer: IoBuffer) {
        let mut writer = self.writer.lock_or_recover();
        writer.restore(half, buffer, self.state() == SessionState::Closed);
    }

    /// Closes the session, releasing its stream. Returns `false` if it was already closed.
    ///
    /// Outstanding operations are cancelled. They drop the halves they own right away, and their
    /// continuations are invoked with [`Error::NotConnected`].
    pub fn close(&self) -> bool { matches!(self.close_and_reset(|_| Ok(())), Ok(true)) }
    /// Like [`close()`](Self::close), but first hands the rejoined stream to `reset` so that the
    /// transport can prepare the endpoint side for the next peer.
    ///
    /// `reset` is only called if neither half is owned by an outstanding operation. Its failure is
    /// reported as [`Error::ResetFailed`]; the stream is released either way.
    pub fn close_and_reset<R>(&self, reset: R) -> Result<bool>
    where
        R: FnOnce(&mut S) -> io::Result<()>,
    {
        if self.state.advance(SessionState::Closed).is_err() {
            return Ok(false);
        }
        self.closing.send_replace(true);
        let rd = self.reader.lock_or_recover().detach();
        let wr = self.writer.lock_or_recover().detach();
        let (Some(rd), Some(wr)) = (rd, wr) else {
            tracing::debug!(session = %self.id, "closing with an operation in flight");
            return Ok(true);
        };
        let mut stream = rd.unsplit(wr);
        reset(&mut stream).map_err(Error::ResetFailed)?;
        drop(stream);
        Ok(true)
    }
}

/// Resolves once the session is closed, or once it's gone.
async fn closed(mut closing: watch::Receiver<bool>) {
    loop {
        if *closing.borrow_and_update() {
            return;
        }
        if closing.changed().await.is_err() {
            return;
        }
    }
}
/// Drops the half of an operation that was cancelled, reporting it as [`Error::NotConnected`].
fn cancelled_or<H>(half: H, rslt: Option<Result<usize>>) -> (Option<H>, Result<usize>) {
    match rslt {
        Some(rslt) => (Some(half), rslt),
        None => (None, Err(Error::NotConnected)),
    }
}

impl<S> Session<S> {
    /// Returns the session's identity.
    #[inline]
    pub fn id(&self) -> SessionId { self.id }
    /// Returns the current state.
    #[inline]
    pub fn state(&self) -> SessionState { self.state.load() }
    /// Returns the reactor the session submits its operations to.
    #[inline]
    pub fn reactor(&self) -> &Reactor { &self.reactor }
    /// Returns the capacity of each of the session's two buffers.
    #[inline]
    pub fn buffer_size(&self) -> usize { self.buffer_size }
    /// Whether an operation of the given kind is currently outstanding.
    ///
    /// Accept and connect operations happen before a stream is attached and are tracked by
    /// whoever drives them, so they are always reported as not outstanding here.
    pub fn in_flight(&self, kind: OperationKind) -> bool {
        match kind {
            OperationKind::Read => self.reader.lock_or_recover().is_in_flight(),
            OperationKind::Write => self.writer.lock_or_recover().is_in_flight(),
            OperationKind::Accept | OperationKind::Connect => false,
        }
    }
    /// Moves to the given state if that is a legal transition. On failure, returns the state that
    /// refused it.
    pub(crate) fn advance(&self, to: SessionState) -> Result<SessionState, SessionState> {
        self.state.advance(to)
    }
}

impl<S> Debug for Session<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("buffer_size", &self.buffer_size)
            .field("reading", &self.in_flight(OperationKind::Read))
            .field("writing", &self.in_flight(OperationKind::Write))
            .finish()
    }
}
