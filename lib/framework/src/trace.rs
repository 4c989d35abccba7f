use tracing_subscriber::EnvFilter;

/// Install the global subscriber, logs are written to stderr so stdout
/// stays free for collected metrics.
///
/// `levels` accepts `EnvFilter` directives, e.g. `info` or
/// `natscope=debug,framework=trace`.
pub fn init(color: bool, json: bool, levels: &str) {
    let filter = EnvFilter::try_new(levels).unwrap_or_else(|err| {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("invalid log levels {levels:?}, fallback to \"info\": {err}");
        }

        EnvFilter::new("info")
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(color)
        .with_writer(std::io::stderr);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(err) = result {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("install tracing subscriber failed: {err}");
        }
    }
}
