use {
    super::ServerOptions,
    crate::{
        error::{Error, Result},
        reactor::Reactor,
        session::{Session, SessionId, SessionState},
        transport::Transport,
        MutexExt,
    },
    std::{
        collections::HashMap,
        fmt::{self, Debug, Formatter},
        sync::{
            atomic::{AtomicU64, Ordering::Relaxed},
            Arc, Mutex,
        },
    },
};

/// The session type of a server using transport `T`.
pub type ServerSession<T> = Session<<T as Transport>::Stream>;

/// The server's collection of sessions, keyed by identity.
///
/// Sessions come and go as peers connect and leave. The pool makes sure that at least the
/// configured number of them is always waiting for a new peer, by provisioning replacements
/// whenever one stops listening.
pub struct SessionPool<T: Transport> {
    reactor: Reactor,
    transport: T,
    pub(super) options: ServerOptions,
    sessions: Mutex<HashMap<SessionId, Arc<ServerSession<T>>>>,
    /// Serializes top-ups, so that two sessions leaving at once don't both provision for the same
    /// shortfall.
    provisioning: Mutex<()>,
    provisioned: AtomicU64,
    fatal: Mutex<Option<Error>>,
}

impl<T: Transport> SessionPool<T> {
    pub(super) fn new(reactor: Reactor, transport: T, options: ServerOptions) -> Arc<Self> {
        Arc::new(Self {
            reactor,
            transport,
            options,
            sessions: Mutex::new(HashMap::new()),
            provisioning: Mutex::new(()),
            provisioned: AtomicU64::new(0),
            fatal: Mutex::new(None),
        })
    }

    /// Creates a new instance on the endpoint, wraps it in a session and starts listening on it.
    ///
    /// Every call produces an independent listening session, regardless of how many there
    /// already are.
    pub fn provision(self: &Arc<Self>) -> Result<SessionId> {
        let session = Session::new(self.reactor.clone(), self.options.buffer_size);
        let id = session.id();
        let accept = {
            let _driver = self.reactor.enter();
            let instance = self.transport.create_instance().map_err(Error::ProvisionFailed)?;
            // Idle sessions always accept this transition.
            let _ = session.advance(SessionState::Listening);
            self.sessions.lock_or_recover().insert(id, Arc::clone(&session));
            self.transport.accept(instance)
        };
        self.provisioned.fetch_add(1, Relaxed);
        tracing::debug!(session = %id, "provisioned listening session");
        self.begin_accept(session, accept);
        Ok(id)
    }
    /// Provisions sessions until at least the configured minimum is listening.
    pub fn replenish(self: &Arc<Self>) -> Result<()> {
        let _serial = self.provisioning.lock_or_recover();
        let target = self.options.min_listening.max(1);
        let mut listening = self.listening();
        while listening < target {
            self.provision()?;
            listening = listening.saturating_add(1);
        }
        Ok(())
    }
    /// Recycles the slot of a session that has reached [`Closed`](SessionState::Closed).
    ///
    /// Replacement listeners are provisioned first, and only then is the closed session dropped
    /// from the pool. If a replacement cannot be provisioned, the server is stopped, since the
    /// endpoint would otherwise silently lose capacity.
    pub fn on_session_closed(self: &Arc<Self>, id: SessionId) {
        if !self.reactor.is_stopped() {
            if let Err(e) = self.replenish() {
                tracing::error!(session = %id, error = %e, "failed to replace closed session");
                self.fail(e);
            }
        }
        let mut sessions = self.sessions.lock_or_recover();
        sessions.remove(&id);
        let remaining = sessions.len();
        drop(sessions);
        tracing::debug!(session = %id, remaining, "closed session removed");
    }

    /// Records a condition that the whole server cannot continue after, and stops the reactor.
    /// Only the first such error is kept.
    pub(crate) fn fail(&self, e: Error) {
        self.fatal.lock_or_recover().get_or_insert(e);
        self.reactor.stop();
    }
    /// Takes the error that stopped the server, if any.
    pub fn take_fatal(&self) -> Option<Error> { self.fatal.lock_or_recover().take() }

    /// Closes every session and forgets about them.
    pub fn close_all(&self) {
        let sessions = std::mem::take(&mut *self.sessions.lock_or_recover());
        for session in sessions.into_values() {
            session.close();
        }
    }

    /// Returns the identity and current state of every session, ordered by identity.
    pub fn snapshot(&self) -> Vec<(SessionId, SessionState)> {
        let mut states = self
            .sessions
            .lock_or_recover()
            .values()
            .map(|s| (s.id(), s.state()))
            .collect::<Vec<_>>();
        states.sort_unstable_by_key(|&(id, _)| id);
        states
    }
    /// Returns the number of sessions currently waiting for a peer.
    pub fn listening(&self) -> usize {
        self.sessions
            .lock_or_recover()
            .values()
            .filter(|s| s.state() == SessionState::Listening)
            .count()
    }
    /// Returns the number of sessions in the pool, in any state.
    pub fn len(&self) -> usize { self.sessions.lock_or_recover().len() }
    /// Whether the pool holds no sessions at all.
    pub fn is_empty(&self) -> bool { self.len() == 0 }
    /// Returns how many sessions have been provisioned over the pool's lifetime.
    pub fn provisioned_total(&self) -> u64 { self.provisioned.load(Relaxed) }
    /// Looks up a session by identity.
    pub fn get(&self, id: SessionId) -> Option<Arc<ServerSession<T>>> {
        self.sessions.lock_or_recover().get(&id).cloned()
    }

    /// Returns the transport sessions are created with.
    #[inline]
    pub fn transport(&self) -> &T { &self.transport }
    /// Returns the reactor sessions are driven by.
    #[inline]
    pub fn reactor(&self) -> &Reactor { &self.reactor }
}

impl<T: Transport> Debug for SessionPool<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionPool")
            .field("options", &self.options)
            .field("sessions", &self.snapshot())
            .field("provisioned", &self.provisioned_total())
            .finish_non_exhaustive()
    }
}
