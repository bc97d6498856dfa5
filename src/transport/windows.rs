//! Windows named pipe transport.
//!
//! Pipes are created in byte mode, duplex, with no limit on the number of instances, and with both
//! buffer size hints set to the session buffer size.

use {
    super::{Accept, Transport},
    crate::endpoint::Endpoint,
    futures_core::future::BoxFuture,
    std::{
        io,
        pin::Pin,
        sync::atomic::{AtomicBool, Ordering::AcqRel},
        task::{Context, Poll},
    },
    tokio::{
        io::{AsyncRead, AsyncWrite, ReadBuf},
        net::windows::named_pipe::{
            ClientOptions, NamedPipeClient, NamedPipeServer, PipeMode, ServerOptions,
        },
    },
    windows_sys::Win32::Foundation::ERROR_PIPE_BUSY,
};

/// [`Transport`] over Windows named pipes.
#[derive(Debug)]
pub struct NamedPipeTransport {
    endpoint: Endpoint,
    buffer_size: u32,
    first_created: AtomicBool,
}
impl NamedPipeTransport {
    /// Creates a transport for the pipe at the endpoint's path. `buffer_size` is the size hint for
    /// the pipe's inbound and outbound buffers, saturated to `u32::MAX`.
    pub fn new(endpoint: Endpoint, buffer_size: usize) -> Self {
        Self {
            endpoint,
            buffer_size: u32::try_from(buffer_size).unwrap_or(u32::MAX),
            first_created: AtomicBool::new(false),
        }
    }
}

impl Transport for NamedPipeTransport {
    type Instance = NamedPipeServer;
    type Stream = PipeStream;

    #[inline]
    fn endpoint(&self) -> &Endpoint { &self.endpoint }
    fn create_instance(&self) -> io::Result<NamedPipeServer> {
        // Only the first instance claims the name; a second server on it fails here.
        let first = !self.first_created.swap(true, AcqRel);
        ServerOptions::new()
            .first_pipe_instance(first)
            .access_inbound(true)
            .access_outbound(true)
            .pipe_mode(PipeMode::Byte)
            .in_buffer_size(self.buffer_size)
            .out_buffer_size(self.buffer_size)
            .create(self.endpoint.path())
    }
    fn accept(&self, instance: NamedPipeServer) -> Accept<PipeStream> {
        Accept::from_future(async move {
            instance.connect().await?;
            Ok(PipeStream::Server(instance))
        })
    }
    fn connect(&self) -> BoxFuture<'static, io::Result<PipeStream>> {
        let path = self.endpoint.path().to_owned();
        Box::pin(async move {
            match ClientOptions::new().pipe_mode(PipeMode::Byte).open(&path) {
                Ok(client) => Ok(PipeStream::Client(client)),
                Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY as i32) => {
                    Err(io::ErrorKind::WouldBlock.into())
                }
                Err(e) => Err(e),
            }
        })
    }
    fn disconnect_reset(&self, stream: &mut PipeStream) -> io::Result<()> {
        match stream {
            PipeStream::Server(server) => server.disconnect(),
            PipeStream::Client(..) => Ok(()),
        }
    }
}

/// Server and client ends of a named pipe behind one stream type.
#[derive(Debug)]
pub enum PipeStream {
    /// The end created by the server.
    Server(NamedPipeServer),
    /// The end opened by a client.
    Client(NamedPipeClient),
}

macro_rules! dispatch {
    ($slf:ident, $p:ident => $e:expr) => {
        match $slf.get_mut() {
            PipeStream::Server($p) => $e,
            PipeStream::Client($p) => $e,
        }
    };
}

impl AsyncRead for PipeStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        dispatch!(self, p => Pin::new(p).poll_read(cx, buf))
    }
}
impl AsyncWrite for PipeStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        dispatch!(self, p => Pin::new(p).poll_write(cx, buf))
    }
    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        dispatch!(self, p => Pin::new(p).poll_flush(cx))
    }
    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        dispatch!(self, p => Pin::new(p).poll_shutdown(cx))
    }
}
