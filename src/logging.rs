use tracing::Level;

/// Installs the global `tracing` subscriber.
///
/// Logs go to stderr, so the summary printed on stdout stays clean.
pub fn init(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}
