use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn default_directive(verbose: bool, debug: bool) -> &'static str {
    if debug {
        "quotawatch=debug"
    } else if verbose {
        "quotawatch=info"
    } else {
        "quotawatch=warn"
    }
}

/// Logs go to stderr so `parse` can keep stdout for JSON. `RUST_LOG` wins
/// over the flags when set.
pub fn init(verbose: bool, debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, debug)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}
