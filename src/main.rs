use std::sync::Arc;

use reqwest::Client;
use tenor_mcp::{
    config::settings_from_env,
    request::{HttpTransport, ReqwestTransport},
    server::run_stdio,
    tenor::TenorManager,
};

async fn run() -> anyhow::Result<()> {
    let settings = settings_from_env()?;
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(Arc::new(Client::new())));
    let manager = TenorManager::new(settings, transport)?;
    run_stdio(Arc::new(manager)).await
}

#[tokio::main]
async fn main() {
    better_panic::install();
    env_logger::init();

    if let Err(err) = run().await {
        eprintln!("{:?}", err);
        std::process::exit(1);
    }
}
