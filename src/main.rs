//! padkernel stdio worker.
//!
//! Reads one JSON request per line on stdin and writes one JSON reply per line
//! on stdout, so a host in another process can run the kernel out of band.
//! Logs go to stderr and honour `RUST_LOG`.

use padkernel::job::KernelConfig;
use padkernel::job::dispatcher::GeometryExecutor;
use padkernel::job::stdio::serve;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = KernelConfig::from_env();
    let stdin = BufReader::new(tokio::io::stdin());
    serve(&config, stdin, tokio::io::stdout(), |_| GeometryExecutor).await
}
