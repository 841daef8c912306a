pub mod config;
pub mod observer;
pub mod server;

use std::sync::Arc;

use self::config::Config;

/// Start the server. Split out of `main` so integration tests can run a
/// whole server in-process.
pub async fn startup(config: Arc<Config>) -> anyhow::Result<()> {
    server::run(config).await
}
