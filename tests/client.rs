use {
    crate::{
        tests::util::*, ClientOptions, ConnectWaitMode, Error, ExchangeSummary, NoDelay, Pacing,
        Reactor, SessionState,
    },
    std::{
        io,
        sync::{Arc, Mutex},
        time::{Duration, Instant},
    },
};

fn options() -> ClientOptions { ClientOptions::new().pacing(Arc::new(NoDelay)) }

#[test]
fn exchange_writes_the_payload_every_iteration() -> TestResult {
    test_wrapper(|| {
        let client = options().max_iterations(5).create(Reactor::new()?, MockTransport::new());
        let summary = client.run(1)?;
        ensure_eq!(summary, ExchangeSummary { writes: 5, bytes: 5 * 14 });
        ensure_eq!(client.transport().written(), ClientOptions::DEFAULT_PAYLOAD.repeat(5));
        client.reactor().shutdown();
        Ok(())
    })
}

#[test]
fn payload_arrives_in_order() -> TestResult {
    test_wrapper(|| {
        let reactor = Reactor::new()?;
        let client = options().payload(b"xyz".to_vec()).create(reactor.clone(), MockTransport::new());
        let session = client.connect_blocking_wait()?;
        ensure_eq!(session.state(), SessionState::Connected);
        let exchange = client.run_exchange(&session, 4)?;
        reactor.run();
        ensure_eq!(exchange.into_result()?, ExchangeSummary { writes: 4, bytes: 12 });
        ensure_eq!(session.state(), SessionState::Closed);
        ensure_eq!(client.transport().written(), b"xyzxyzxyzxyz".to_vec());
        reactor.shutdown();
        Ok(())
    })
}

#[test]
fn default_exchange_is_eleven_writes() -> TestResult {
    test_wrapper(|| {
        let reactor = Reactor::new()?;
        let transport = MockTransport::new();
        let client = options().create(reactor.clone(), transport);
        let summary = client.run(2)?;
        ensure_eq!(summary.writes, ClientOptions::DEFAULT_ITERATIONS);
        ensure_eq!(summary.bytes, 11 * ClientOptions::DEFAULT_PAYLOAD.len() as u64);
        reactor.shutdown();
        Ok(())
    })
}

#[test]
fn zero_iterations_closes_right_away() -> TestResult {
    test_wrapper(|| {
        let reactor = Reactor::new()?;
        let client = options().max_iterations(0).create(reactor.clone(), MockTransport::new());
        let summary = client.run(1)?;
        ensure_eq!(summary, ExchangeSummary::default());
        color_eyre::eyre::ensure!(reactor.is_stopped(), "reactor still running");
        reactor.shutdown();
        Ok(())
    })
}

#[derive(Debug, Default)]
struct Recorded(Mutex<Vec<u32>>);
impl Pacing for Arc<Recorded> {
    fn delay(&self, completed: u32) -> Duration {
        self.0.lock().unwrap().push(completed);
        Duration::from_millis(5)
    }
}

#[test]
fn pacing_is_consulted_between_writes() -> TestResult {
    test_wrapper(|| {
        let reactor = Reactor::new()?;
        let recorded = Arc::new(Recorded::default());
        let client = options()
            .max_iterations(4)
            .pacing(Arc::new(Arc::clone(&recorded)))
            .create(reactor.clone(), MockTransport::new());
        let start = Instant::now();
        client.run(1)?;
        ensure_eq!(*recorded.0.lock().unwrap(), vec![1, 2, 3]);
        color_eyre::eyre::ensure!(start.elapsed() >= Duration::from_millis(15), "writes were not paced");
        reactor.shutdown();
        Ok(())
    })
}

#[test]
fn write_failure_ends_the_exchange() -> TestResult {
    test_wrapper(|| {
        let reactor = Reactor::new()?;
        let client = options().create(reactor.clone(), MockTransport::new().fail_writes());
        let rslt = client.run(1);
        ensure_matches!(rslt, Err(Error::Transport(..)));
        reactor.shutdown();
        Ok(())
    })
}

#[test]
fn oversized_payload_fails_before_writing() -> TestResult {
    test_wrapper(|| {
        let reactor = Reactor::new()?;
        let client = options()
            .buffer_size(8)
            .payload(vec![0; 9])
            .create(reactor.clone(), MockTransport::new());
        ensure_matches!(client.run(1), Err(Error::PayloadTooLarge { len: 9, capacity: 8 }));
        reactor.shutdown();
        Ok(())
    })
}

#[test]
fn immediate_mode_fails_without_waiting() -> TestResult {
    test_wrapper(|| {
        let reactor = Reactor::new()?;
        let client = options()
            .wait_mode(ConnectWaitMode::Immediate)
            .retry_interval(Duration::from_secs(10))
            .create(reactor.clone(), MockTransport::new().connect_error(io::ErrorKind::NotFound));
        let start = Instant::now();
        ensure_matches!(client.connect_blocking_wait(), Err(Error::EndpointUnavailable { .. }));
        color_eyre::eyre::ensure!(start.elapsed() < Duration::from_secs(5), "client waited");
        reactor.shutdown();
        Ok(())
    })
}

#[test]
fn timeout_mode_gives_up_after_the_timeout() -> TestResult {
    test_wrapper(|| {
        let reactor = Reactor::new()?;
        let client = options()
            .wait_mode(ConnectWaitMode::Timeout(Duration::from_millis(100)))
            .retry_interval(Duration::from_millis(10))
            .create(reactor.clone(), MockTransport::new().connect_error(io::ErrorKind::ConnectionRefused));
        let start = Instant::now();
        let rslt = client.run(1);
        ensure_matches!(rslt, Err(Error::EndpointUnavailable { .. }));
        color_eyre::eyre::ensure!(start.elapsed() >= Duration::from_millis(100), "gave up early");
        reactor.shutdown();
        Ok(())
    })
}

#[test]
fn unexpected_connect_errors_are_not_retried() -> TestResult {
    test_wrapper(|| {
        let reactor = Reactor::new()?;
        let client = options()
            .wait_mode(ConnectWaitMode::Unbounded)
            .create(reactor.clone(), MockTransport::new().connect_error(io::ErrorKind::PermissionDenied));
        ensure_matches!(client.connect_blocking_wait(), Err(Error::Transport(..)));
        reactor.shutdown();
        Ok(())
    })
}
