//! Unix domain socket transport.
//!
//! Every listening instance is a duplicate of one bound listener's file descriptor. Each
//! duplicate waits for, and hands out, exactly one connection before it's closed, which mirrors
//! how a named pipe instance serves a single client.

use {
    super::{Accept, Transport},
    crate::endpoint::Endpoint,
    futures_core::future::BoxFuture,
    std::{
        fs, io,
        os::unix::net::UnixListener as StdUnixListener,
        path::{Path, PathBuf},
    },
    tokio::net::{UnixListener, UnixStream},
};

/// Options for binding a [`LocalSocketTransport`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LocalSocketOptions {
    try_overwrite: bool,
    reclaim_name: bool,
}
impl LocalSocketOptions {
    /// Returns the default set of options: no overwriting, reclaiming enabled.
    #[inline]
    pub fn new() -> Self { Self { try_overwrite: false, reclaim_name: true } }
    builder_setters! {
        /// Sets whether a file already occupying the socket path is deleted before binding.
        ///
        /// When a server terminates without deleting its socket file, the file remains and can
        /// neither be connected to nor bound again. Deleting it blindly also deletes the socket of
        /// a server that's still running, so this is off by default.
        try_overwrite: bool,
        /// Sets whether the socket file is deleted when the transport is dropped.
        reclaim_name: bool,
    }
}
impl Default for LocalSocketOptions {
    #[inline]
    fn default() -> Self { Self::new() }
}

/// Deletes the socket file on drop.
#[derive(Debug, Default)]
struct ReclaimGuard(Option<PathBuf>);
impl Drop for ReclaimGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = fs::remove_file(path);
        }
    }
}

/// [`Transport`] over Unix domain sockets.
#[derive(Debug)]
pub struct LocalSocketTransport {
    endpoint: Endpoint,
    listener: Option<StdUnixListener>,
    _reclaim: ReclaimGuard,
}
impl LocalSocketTransport {
    /// Creates a client-side transport. It can [connect](Transport::connect), but creating
    /// instances fails.
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint, listener: None, _reclaim: ReclaimGuard::default() }
    }
    /// Binds a listener to the endpoint's path.
    pub fn bind(endpoint: Endpoint, options: LocalSocketOptions) -> io::Result<Self> {
        let path = endpoint.path();
        if options.try_overwrite {
            remove_stale(path)?;
        }
        let listener = StdUnixListener::bind(path)?;
        // Duplicates share this flag, which the driver requires.
        listener.set_nonblocking(true)?;
        tracing::debug!(endpoint = %endpoint, "bound local socket listener");
        let reclaim = ReclaimGuard(options.reclaim_name.then(|| path.to_owned()));
        Ok(Self { endpoint, listener: Some(listener), _reclaim: reclaim })
    }
}
fn remove_stale(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

impl Transport for LocalSocketTransport {
    type Instance = StdUnixListener;
    type Stream = UnixStream;

    #[inline]
    fn endpoint(&self) -> &Endpoint { &self.endpoint }
    fn create_instance(&self) -> io::Result<StdUnixListener> {
        match &self.listener {
            Some(listener) => listener.try_clone(),
            None => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "cannot create listening instances on a client-side transport",
            )),
        }
    }
    fn accept(&self, instance: StdUnixListener) -> Accept<UnixStream> {
        match UnixListener::from_std(instance) {
            Ok(listener) => Accept::from_future(async move {
                let (stream, _) = listener.accept().await?;
                Ok(stream)
            }),
            Err(e) => Accept::Ready(Err(e)),
        }
    }
    fn connect(&self) -> BoxFuture<'static, io::Result<UnixStream>> {
        let path = self.endpoint.path().to_owned();
        Box::pin(async move { UnixStream::connect(path).await })
    }
    #[inline]
    fn disconnect_reset(&self, _: &mut UnixStream) -> io::Result<()> {
        // Instances are never reused on Unix, so there is nothing to reset.
        Ok(())
    }
}
