//! The completion reactor: a queue of finished asynchronous operations, dispatched to their
//! continuations by any number of worker threads.
//!
//! Operations are futures. They are executed by a private I/O driver (a Tokio runtime owned by the
//! reactor), and once one finishes, its output is handed to the continuation it was submitted with
//! by pushing a completion into the reactor's queue. Threads calling [`Reactor::run()`] pop
//! completions off that queue and invoke them, so continuations always run on a worker thread and
//! never on the driver.
//!
//! ```no_run
//! use sessionpipe::Reactor;
//! use std::time::Duration;
//!
//! let reactor = Reactor::new()?;
//! let stopper = reactor.clone();
//! // Futures run on the driver, so the timer is created there.
//! reactor.submit(async { tokio::time::sleep(Duration::from_millis(10)).await }, move |()| {
//!     println!("timer fired");
//!     stopper.stop();
//! });
//! reactor.run_on(2)?;
//! # std::io::Result::<()>::Ok(())
//! ```

use {
    crate::MutexExt,
    std::{
        collections::VecDeque,
        fmt::{self, Debug, Formatter},
        future::Future,
        io,
        panic,
        sync::{Arc, Condvar, Mutex, PoisonError},
        thread,
    },
    tokio::runtime::{self, EnterGuard, Handle, Runtime},
};

type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Creation options for a [`Reactor`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReactorOptions {
    driver_threads: usize,
}
impl ReactorOptions {
    /// Returns the default set of options: a single I/O driver thread.
    #[inline]
    pub fn new() -> Self { Self { driver_threads: 1 } }
    builder_setters! {
        /// Sets the number of threads the I/O driver uses to carry operations forward. These are
        /// distinct from the worker threads that call [`run()`](Reactor::run), and never execute
        /// continuations. Zero is treated as one.
        driver_threads: usize,
    }
    /// Creates the reactor.
    pub fn create(self) -> io::Result<Reactor> {
        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(self.driver_threads.max(1))
            .thread_name("sessionpipe-io")
            .enable_all()
            .build()?;
        tracing::debug!(driver_threads = self.driver_threads.max(1), "reactor created");
        Ok(Reactor {
            queue: Arc::new(Queue::default()),
            driver: Arc::new(Driver {
                handle: runtime.handle().clone(),
                runtime: Mutex::new(Some(runtime)),
            }),
        })
    }
}
impl Default for ReactorOptions {
    #[inline]
    fn default() -> Self { Self::new() }
}

/// Handle to a completion reactor. Cloning the handle is cheap and yields another reference to the
/// same reactor.
#[derive(Clone)]
pub struct Reactor {
    queue: Arc<Queue>,
    driver: Arc<Driver>,
}
impl Reactor {
    /// Creates a reactor with [default options](ReactorOptions::new).
    #[inline]
    pub fn new() -> io::Result<Self> { ReactorOptions::new().create() }

    /// Registers a pending operation together with the continuation that receives its output.
    ///
    /// Never blocks, and may be called from any thread, including from inside a continuation. If
    /// the reactor has already been stopped, the operation is dropped without being started.
    pub fn submit<F, C>(&self, operation: F, continuation: C)
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
        C: FnOnce(F::Output) + Send + 'static,
    {
        if !self.queue.register() {
            tracing::debug!("operation submitted after stop, dropping it");
            return;
        }
        let queue = Arc::clone(&self.queue);
        self.driver.handle.spawn(async move {
            let output = operation.await;
            queue.complete(Box::new(move || continuation(output)));
        });
    }
    /// Queues a continuation as an operation that has already completed.
    ///
    /// This is how operations that finish synchronously are reported through the same path as
    /// ones that had to wait. Like [`submit()`](Self::submit), this does nothing once the reactor
    /// is stopped.
    pub fn post(&self, continuation: impl FnOnce() + Send + 'static) {
        if self.queue.register() {
            self.queue.complete(Box::new(continuation));
        }
    }

    /// Dispatches completions on the calling thread until the reactor is stopped or runs out of
    /// work.
    ///
    /// Any number of threads may call this at the same time. A continuation may run on any of
    /// them. Once [`stop()`](Self::stop) has been called, completions that were already queued are
    /// still dispatched, after which every caller returns.
    ///
    /// A continuation that panics stops the reactor on its way out, so that the other callers
    /// return as well instead of waiting on work that may never come.
    pub fn run(&self) {
        while let Some(completion) = self.queue.next() {
            let _guard = Dispatched(&self.queue);
            completion();
        }
    }
    /// Spawns `threads` worker threads that all [`run()`](Self::run) the reactor, and waits for all
    /// of them to return. Zero is treated as one.
    ///
    /// A panic in a continuation is propagated to the caller once every worker has exited.
    pub fn run_on(&self, threads: usize) -> io::Result<()> {
        let workers = (0..threads.max(1))
            .map(|i| {
                let reactor = self.clone();
                thread::Builder::new()
                    .name(format!("sessionpipe-worker-{i}"))
                    .spawn(move || reactor.run())
            })
            .collect::<io::Result<Vec<_>>>()?;
        tracing::debug!(workers = workers.len(), "reactor running");
        let mut panicked = None;
        for worker in workers {
            if let Err(payload) = worker.join() {
                panicked.get_or_insert(payload);
            }
        }
        tracing::debug!("reactor finished");
        if let Some(payload) = panicked {
            panic::resume_unwind(payload);
        }
        Ok(())
    }
    /// Requests that all [`run()`](Self::run) callers return once the completions already queued
    /// have been dispatched.
    ///
    /// Operations in flight are not cancelled. Their completions, as well as anything submitted
    /// from now on, are discarded instead of dispatched.
    pub fn stop(&self) {
        let mut state = self.queue.state.lock_or_recover();
        if !state.stopped {
            tracing::debug!("reactor stopping");
        }
        state.stopped = true;
        drop(state);
        self.queue.cvar.notify_all();
    }
    /// Whether [`stop()`](Self::stop) has been called.
    #[inline]
    pub fn is_stopped(&self) -> bool { self.queue.state.lock_or_recover().stopped }
    /// Returns the number of operations that were registered and have not finished dispatching.
    #[inline]
    pub fn outstanding(&self) -> usize { self.queue.state.lock_or_recover().outstanding }

    /// Drives a future to completion on the I/O driver, blocking the calling thread.
    ///
    /// Must not be called from an asynchronous context.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output { self.driver.handle.block_on(future) }
    /// Enters the I/O driver's context, which is required to create transport objects that
    /// register themselves with it.
    #[inline]
    pub fn enter(&self) -> EnterGuard<'_> { self.driver.handle.enter() }

    /// Stops the reactor and tears down the I/O driver, dropping every operation in flight along
    /// with the sessions and continuations it owns.
    ///
    /// In-flight operations hold references to the reactor through their sessions, so a reactor
    /// with outstanding operations is only released by calling this. Transport objects cannot be
    /// created afterwards.
    pub fn shutdown(&self) {
        self.stop();
        self.driver.shutdown();
    }
}
impl Debug for Reactor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = self.queue.state.lock_or_recover();
        f.debug_struct("Reactor")
            .field("queued", &state.completions.len())
            .field("outstanding", &state.outstanding)
            .field("stopped", &state.stopped)
            .finish()
    }
}

#[derive(Default)]
struct Queue {
    state: Mutex<QueueState>,
    cvar: Condvar,
}
#[derive(Default)]
struct QueueState {
    completions: VecDeque<Completion>,
    /// Operations registered and not yet done being dispatched, including queued ones.
    outstanding: usize,
    stopped: bool,
}
impl Queue {
    /// Accounts for a new operation. Returns `false` if the reactor is stopped.
    fn register(&self) -> bool {
        let mut state = self.state.lock_or_recover();
        if state.stopped {
            return false;
        }
        state.outstanding = state.outstanding.saturating_add(1);
        true
    }
    fn complete(&self, completion: Completion) {
        let mut state = self.state.lock_or_recover();
        if state.stopped {
            self.finish(&mut state);
            drop(state);
            // Dropped outside of the lock, since it may own the last reference to a session.
            drop(completion);
            return;
        }
        state.completions.push_back(completion);
        drop(state);
        self.cvar.notify_one();
    }
    /// Blocks until there's a completion to dispatch, or returns `None` if the caller should exit.
    fn next(&self) -> Option<Completion> {
        let mut state = self.state.lock_or_recover();
        loop {
            if let Some(completion) = state.completions.pop_front() {
                return Some(completion);
            }
            if state.stopped || state.outstanding == 0 {
                return None;
            }
            state = self.cvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }
    fn finish(&self, state: &mut QueueState) {
        state.outstanding = state.outstanding.saturating_sub(1);
        if state.outstanding == 0 {
            self.cvar.notify_all();
        }
    }
}

/// Marks a dispatched completion as finished when dropped. If its continuation panicked, the
/// reactor is stopped as well.
struct Dispatched<'q>(&'q Queue);
impl Drop for Dispatched<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state.lock_or_recover();
        self.0.finish(&mut state);
        if thread::panicking() {
            state.stopped = true;
            drop(state);
            tracing::error!("continuation panicked, stopping the reactor");
            self.0.cvar.notify_all();
        }
    }
}

/// Owns the I/O driver runtime.
struct Driver {
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
}
impl Driver {
    fn shutdown(&self) {
        let runtime = self.runtime.lock_or_recover().take();
        // The last handle can be released from inside a driver task, where a regular runtime drop
        // would panic.
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
    }
}
impl Drop for Driver {
    fn drop(&mut self) { self.shutdown(); }
}
