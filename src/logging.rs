use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins when set; otherwise info
/// for this crate, or debug with `verbose`. Logs go to stderr.
pub fn init_logging(verbose: bool) {
    let default = if verbose {
        "vigne_amm=debug"
    } else {
        "vigne_amm=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    // a second init (tests) is not an error
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();
}
