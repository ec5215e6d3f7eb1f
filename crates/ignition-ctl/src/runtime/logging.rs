use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber with optional JSON output.
///
/// Output goes through a non-blocking writer so a slow terminal never stalls
/// the threads that log. Keep the returned guard alive until exit to flush.
pub fn init_tracing(json_output: bool) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ignition_ctl=debug,ignition_io=info"));
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    if json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(writer))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(writer))
            .init();
    }
    guard
}
