//! Connects to a server and writes a payload to it a fixed number of times.

use {
    clap::Parser,
    color_eyre::eyre::{Result, WrapErr},
    sessionpipe::{
        transport, ClientOptions, ConnectWaitMode, Endpoint, FixedDelay, ReactorOptions,
    },
    std::{process::ExitCode, sync::Arc, time::Duration},
    tracing_subscriber::EnvFilter,
};

#[derive(Parser, Debug)]
#[command(name = "sessionpipe-client")]
#[command(about = "Writes a payload to a local endpoint at a fixed pace")]
struct Args {
    /// Endpoint name, or a full pipe/socket path
    #[arg(short, long, default_value = Endpoint::DEFAULT_NAME)]
    name: String,

    /// Number of worker threads dispatching completions
    #[arg(short, long, default_value_t = 1)]
    threads: usize,

    /// Number of writes to perform
    #[arg(short, long, default_value_t = ClientOptions::DEFAULT_ITERATIONS)]
    iterations: u32,

    /// Pause between writes, in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    delay_ms: u64,

    /// Bytes to write, as a UTF-8 string
    #[arg(short, long)]
    payload: Option<String>,

    /// Give up if the endpoint hasn't appeared after this many milliseconds (waits forever if
    /// omitted, 0 makes a single attempt)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _ = color_eyre::install();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let endpoint = Endpoint::from_name(&args.name);
    let reactor = ReactorOptions::new().create().wrap_err("failed to create the reactor")?;

    let wait_mode = match args.timeout_ms {
        None => ConnectWaitMode::Unbounded,
        Some(0) => ConnectWaitMode::Immediate,
        Some(ms) => ConnectWaitMode::Timeout(Duration::from_millis(ms)),
    };
    let mut options = ClientOptions::new()
        .wait_mode(wait_mode)
        .max_iterations(args.iterations)
        .pacing(Arc::new(FixedDelay(Duration::from_millis(args.delay_ms))));
    if let Some(payload) = &args.payload {
        options = options.payload(payload.clone().into_bytes());
    }

    let client = options.create(reactor.clone(), transport::client(&endpoint));
    let rslt = client.run(args.threads);
    reactor.shutdown();
    let summary = rslt.wrap_err_with(|| format!("exchange with {endpoint} failed"))?;
    tracing::info!(writes = summary.writes, bytes = summary.bytes, "exchange finished");
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();
}
