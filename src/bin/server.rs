//! Serves any number of clients on one endpoint, logging everything they send.

use {
    clap::Parser,
    color_eyre::eyre::{Result, WrapErr},
    sessionpipe::{transport, Endpoint, ReactorOptions, ServerOptions},
    std::process::ExitCode,
    tracing_subscriber::EnvFilter,
};

#[derive(Parser, Debug)]
#[command(name = "sessionpipe-server")]
#[command(about = "Accepts clients on a local endpoint and logs what they write")]
struct Args {
    /// Endpoint name, or a full pipe/socket path
    #[arg(short, long, default_value = Endpoint::DEFAULT_NAME)]
    name: String,

    /// Number of worker threads dispatching completions
    #[arg(short, long, default_value_t = 1)]
    threads: usize,

    /// Number of sessions kept listening for new clients
    #[arg(short, long, default_value_t = 1)]
    concurrency: usize,

    /// Size of each session's read and write buffers, in bytes
    #[arg(long, default_value_t = ServerOptions::DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Delete a stale socket file occupying the endpoint before binding (Unix only)
    #[arg(long)]
    overwrite: bool,

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

    #[cfg(unix)]
    let transport = transport::unix::LocalSocketTransport::bind(
        endpoint.clone(),
        transport::unix::LocalSocketOptions::new().try_overwrite(args.overwrite),
    );
    #[cfg(not(unix))]
    let transport = transport::server(&endpoint, args.buffer_size);
    let transport = transport.wrap_err_with(|| format!("failed to set up endpoint {endpoint}"))?;

    let server = ServerOptions::new()
        .min_listening(args.concurrency)
        .buffer_size(args.buffer_size)
        .create(reactor.clone(), transport);
    let rslt = server.run(args.threads).wrap_err("server stopped");
    server.shutdown();
    reactor.shutdown();
    rslt
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();
}
