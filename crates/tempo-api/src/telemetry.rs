//! Tracing initialization.

use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Initialize the tracing subscriber.
///
/// Production emits JSON lines so audit events stay machine-parseable;
/// development gets a compact console format.
pub fn init_telemetry(is_production: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "tempo_api=debug,tempo_db=debug,tempo_core=debug,tower_http=debug,audit=info".into()
    });

    if is_production {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        let console_fmt = tracing_subscriber::fmt::layer().event_format(
            Format::default()
                .compact()
                .with_target(false)
                .without_time(),
        );
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_fmt)
            .init();
    }
}
