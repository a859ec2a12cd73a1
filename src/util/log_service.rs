use tracing::Level;
use tracing_subscriber::{filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. `debug` lowers our own threshold to DEBUG;
/// the browser driver and HTTP stack stay at WARN either way.
pub fn set_logging(debug: bool) {
    let level = match debug {
        true => Level::DEBUG,
        false => Level::INFO,
    };

    let filter = Targets::new()
        .with_default(level)
        .with_target("chromiumoxide", Level::WARN)
        .with_target("hyper", Level::WARN)
        .with_target("hyper_util", Level::WARN)
        .with_target("reqwest", Level::WARN);

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    if debug {
        tracing::debug!("Debug logging enabled");
    }
}
