//! An in-process transport. Every accepted or connected stream plays back a script of read
//! outcomes and records everything written to it.

use {
    crate::{
        endpoint::Endpoint,
        transport::{Accept, Transport},
    },
    futures_core::future::BoxFuture,
    std::{
        collections::VecDeque,
        io,
        pin::Pin,
        sync::{Arc, Mutex},
        task::{Context, Poll},
    },
    tokio::{
        io::{AsyncRead, AsyncWrite, ReadBuf},
        sync::oneshot,
    },
};

/// One read outcome of a scripted peer.
#[derive(Clone, Debug)]
pub enum Step {
    /// The peer sent these bytes.
    Data(Vec<u8>),
    /// The read fails with an error of this kind.
    Fail(io::ErrorKind),
    /// The peer closed its end.
    Eof,
}

/// A stream whose reads follow a script. Once the script runs out, reads wait forever.
#[derive(Debug)]
pub struct MockStream {
    script: VecDeque<Step>,
    written: Arc<Mutex<Vec<u8>>>,
    fail_writes: bool,
    _open: Arc<()>,
}
impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.script.pop_front() {
            Some(Step::Data(mut data)) => {
                let n = data.len().min(buf.remaining());
                buf.put_slice(&data[..n]);
                if n < data.len() {
                    self.script.push_front(Step::Data(data.split_off(n)));
                }
                Poll::Ready(Ok(()))
            }
            Some(Step::Fail(kind)) => Poll::Ready(Err(io::Error::from(kind))),
            Some(Step::Eof) => Poll::Ready(Ok(())),
            None => Poll::Pending,
        }
    }
}
impl AsyncWrite for MockStream {
    fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        if self.fail_writes {
            return Poll::Ready(Err(io::Error::from(io::ErrorKind::PermissionDenied)));
        }
        self.written.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }
    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
    fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[derive(Debug, Default)]
struct MockState {
    /// Peers that connect as soon as an instance starts accepting.
    queued: VecDeque<Vec<Step>>,
    /// Instances waiting for a peer, oldest first.
    waiting: VecDeque<oneshot::Sender<io::Result<MockStream>>>,
    instances: usize,
    resets: usize,
}

/// A [`Transport`] whose peers are driven by the test.
#[derive(Debug)]
pub struct MockTransport {
    endpoint: Endpoint,
    state: Mutex<MockState>,
    written: Arc<Mutex<Vec<u8>>>,
    open: Arc<()>,
    fail_create: bool,
    fail_reset: bool,
    fail_writes: bool,
    connect_error: Option<io::ErrorKind>,
}
impl MockTransport {
    pub fn new() -> Self {
        Self {
            endpoint: Endpoint::from_name("mock"),
            state: Mutex::default(),
            written: Arc::default(),
            open: Arc::default(),
            fail_create: false,
            fail_reset: false,
            fail_writes: false,
            connect_error: None,
        }
    }
    pub fn fail_create(mut self) -> Self {
        self.fail_create = true;
        self
    }
    pub fn fail_reset(mut self) -> Self {
        self.fail_reset = true;
        self
    }
    pub fn fail_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }
    /// Makes every connection attempt fail with `kind`.
    pub fn connect_error(mut self, kind: io::ErrorKind) -> Self {
        self.connect_error = Some(kind);
        self
    }

    /// Queues a peer for the next instance that starts accepting, which will then finish its
    /// accept without waiting.
    pub fn queue_peer(&self, script: Vec<Step>) { self.state.lock().unwrap().queued.push_back(script); }
    /// Connects a peer to the oldest instance that's waiting for one. Returns `false` if there is
    /// no such instance.
    pub fn connect_peer(&self, script: Vec<Step>) -> bool {
        let mut stream = self.stream(script);
        let mut state = self.state.lock().unwrap();
        // Instances whose session was closed have dropped their receiving end.
        while let Some(waiter) = state.waiting.pop_front() {
            match waiter.send(Ok(stream)) {
                Ok(()) => return true,
                Err(rejected) => stream = rejected.unwrap(),
            }
        }
        false
    }
    /// Number of instances waiting for a peer.
    pub fn waiting(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.waiting.iter().filter(|w| !w.is_closed()).count()
    }
    pub fn instances(&self) -> usize { self.state.lock().unwrap().instances }
    pub fn resets(&self) -> usize { self.state.lock().unwrap().resets }
    /// Number of streams handed out that haven't been dropped yet, including ones still waiting
    /// to be accepted.
    pub fn open_streams(&self) -> usize { Arc::strong_count(&self.open) - 1 }
    /// Everything written to streams created by this transport, in order.
    pub fn written(&self) -> Vec<u8> { self.written.lock().unwrap().clone() }

    fn stream(&self, script: Vec<Step>) -> MockStream {
        MockStream {
            script: script.into(),
            written: Arc::clone(&self.written),
            fail_writes: self.fail_writes,
            _open: Arc::clone(&self.open),
        }
    }
}

impl Transport for MockTransport {
    type Instance = ();
    type Stream = MockStream;

    fn endpoint(&self) -> &Endpoint { &self.endpoint }
    fn create_instance(&self) -> io::Result<()> {
        if self.fail_create {
            return Err(io::Error::other("instance limit reached"));
        }
        self.state.lock().unwrap().instances += 1;
        Ok(())
    }
    fn accept(&self, (): ()) -> Accept<MockStream> {
        let mut state = self.state.lock().unwrap();
        if let Some(script) = state.queued.pop_front() {
            let stream = self.stream(script);
            return Accept::from_future(async move { Ok(stream) });
        }
        let (tx, rx) = oneshot::channel();
        state.waiting.push_back(tx);
        Accept::from_future(async move {
            rx.await.unwrap_or_else(|_| Err(io::Error::other("instance abandoned")))
        })
    }
    fn connect(&self) -> BoxFuture<'static, io::Result<MockStream>> {
        let rslt = match self.connect_error {
            Some(kind) => Err(io::Error::from(kind)),
            None => Ok(self.stream(Vec::new())),
        };
        Box::pin(async move { rslt })
    }
    fn disconnect_reset(&self, _: &mut MockStream) -> io::Result<()> {
        if self.fail_reset {
            return Err(io::Error::other("pipe reset refused"));
        }
        self.state.lock().unwrap().resets += 1;
        Ok(())
    }
}
