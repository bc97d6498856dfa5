use {
    super::TestResult,
    color_eyre::eyre::{bail, eyre},
    std::{
        panic::{self, AssertUnwindSafe},
        sync::mpsc,
        thread,
        time::Duration,
    },
};

const TIMEOUT: Duration = Duration::from_secs(30);

/// Runs `f` on its own thread and fails the test if it takes longer than the watchdog allows. A
/// hung test thread is leaked rather than joined.
pub fn run_under_watchdog(f: impl (FnOnce() -> TestResult) + Send + 'static) -> TestResult {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new().name("test-main".to_owned()).spawn(move || {
        let rslt = panic::catch_unwind(AssertUnwindSafe(f));
        let _ = tx.send(rslt);
    })?;
    match rx.recv_timeout(TIMEOUT) {
        Ok(Ok(rslt)) => rslt,
        Ok(Err(payload)) => panic::resume_unwind(payload),
        Err(mpsc::RecvTimeoutError::Timeout) => bail!("watchdog: test timed out after {TIMEOUT:?}"),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(eyre!("watchdog: test thread vanished")),
    }
}
