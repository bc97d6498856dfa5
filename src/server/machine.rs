//! The server-side session state machine: accept, then read until the peer leaves.

use {
    super::pool::{ServerSession, SessionPool},
    crate::{
        error::Error,
        transport::{Accept, Transport},
    },
    std::{io, ops::ControlFlow, sync::Arc},
};

impl<T: Transport> SessionPool<T> {
    /// Hands the outcome of starting an accept to [`on_connection`](Self::on_connection), through
    /// the reactor in both cases.
    pub(super) fn begin_accept(self: &Arc<Self>, session: Arc<ServerSession<T>>, accept: Accept<T::Stream>) {
        let pool = Arc::clone(self);
        match accept {
            Accept::Ready(rslt) => {
                tracing::debug!(session = %session.id(), "accept finished without waiting");
                self.reactor().post(move || pool.on_connection(session, rslt));
            }
            Accept::Pending(fut) => {
                tracing::debug!(session = %session.id(), "Pending...");
                self.reactor().submit(fut, move |rslt| pool.on_connection(session, rslt));
            }
        }
    }

    fn on_connection(self: Arc<Self>, session: Arc<ServerSession<T>>, rslt: io::Result<T::Stream>) {
        let id = session.id();
        let stream = match rslt {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(session = %id, error = %Error::from_io(e), "connection failed");
                session.close();
                self.on_session_closed(id);
                return;
            }
        };
        if !session.attach(stream) {
            return;
        }
        tracing::info!(session = %id, "client connected");

        // This session no longer listens; put another one in its place before serving it.
        if let Err(e) = self.replenish() {
            tracing::error!(session = %id, error = %e, "failed to provision a listener");
            self.fail(e);
        }
        self.begin_reading(&session);
    }

    fn begin_reading(self: &Arc<Self>, session: &Arc<ServerSession<T>>) {
        let pool = Arc::clone(self);
        let consumer = Arc::clone(&self.options.consumer);
        let armed = session.begin_read(move |session, rslt| {
            match rslt {
                Ok(data) => consumer(session.id(), data),
                Err(e) => pool.on_read_error(session, e),
            }
            ControlFlow::Continue(())
        });
        if let Err(e) = armed {
            tracing::warn!(session = %session.id(), error = %e, "could not start reading");
            session.close();
            self.on_session_closed(session.id());
        }
    }

    fn on_read_error(self: &Arc<Self>, session: &Arc<ServerSession<T>>, e: Error) {
        let id = session.id();
        if matches!(e, Error::NotConnected) {
            // Cancelled by whoever closed the session, who also recycles it.
            tracing::debug!(session = %id, "read cancelled");
            return;
        }
        if e.is_peer_disconnect() {
            tracing::info!(session = %id, "client closed the handle");
            if let Err(e) = session.close_and_reset(|stream| self.transport().disconnect_reset(stream)) {
                tracing::error!(session = %id, error = %e, "failed to reset pipe");
                self.fail(e);
            }
        } else {
            tracing::warn!(session = %id, error = %e, "failed to read from pipe");
            session.close();
        }
        self.on_session_closed(id);
    }
}
