mod api_doc;
mod auth;
mod constants;
mod error;
mod guards;
mod handlers;
mod middleware;
mod setup;
mod state;
mod telemetry;
mod tenancy;
mod utils;

use tempo_core::AppConfig;

// Use mimalloc as the global allocator for better performance and lower fragmentation,
// especially when running on musl-based systems inside containers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = AppConfig::from_env()?;

    // Initialize the application (database, state, routes)
    let (_state, router) = crate::setup::initialize_app(config.clone()).await?;

    // Start the server
    crate::setup::server::start_server(&config, router).await?;

    Ok(())
}
