//! Test utilities: error reporting, a watchdog, unique endpoint names and an in-process transport
//! whose peers follow a script.
#![allow(dead_code, unused_macros)]

#[macro_use]
mod eyre;
#[macro_use]
mod namegen;
mod mock;
mod wdt;
mod xorshift;

#[allow(unused_imports)]
pub use {eyre::*, mock::*, namegen::*, xorshift::*};

use {
    crate::{reactor::Reactor, server::Consumer, session::SessionId},
    color_eyre::eyre::bail,
    std::{
        sync::{mpsc, Arc, Mutex},
        thread::{self, JoinHandle},
        time::{Duration, Instant},
    },
};

pub fn test_wrapper(f: impl (FnOnce() -> TestResult) + Send + 'static) -> TestResult {
    eyre::install();
    self::wdt::run_under_watchdog(f)
}

/// Polls `cond` until it holds, failing after `timeout`.
pub fn wait_until(what: &str, timeout: Duration, mut cond: impl FnMut() -> bool) -> TestResult {
    let deadline = Instant::now() + timeout;
    while !cond() {
        if Instant::now() >= deadline {
            bail!("timed out waiting until {what}");
        }
        thread::sleep(Duration::from_millis(2));
    }
    Ok(())
}

/// A consumer that forwards every chunk it receives to the returned channel.
pub fn channel_consumer() -> (Consumer, mpsc::Receiver<(SessionId, Vec<u8>)>) {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let consumer: Consumer = Arc::new(move |id: SessionId, data: &[u8]| {
        let _ = tx.lock().unwrap().send((id, data.to_vec()));
    });
    (consumer, rx)
}

/// Runs the reactor on a background thread.
pub fn spawn_worker(reactor: &Reactor) -> JoinHandle<()> {
    let reactor = reactor.clone();
    thread::Builder::new()
        .name("test-worker".to_owned())
        .spawn(move || reactor.run())
        .unwrap()
}
