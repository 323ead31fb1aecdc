use std::sync::Arc;

use anyhow::Result;

use crate::crawler::twse::realtime::MisTwse;

#[cfg(all(target_os = "linux", target_env = "musl"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod config;
pub mod crawler;
pub mod declare;
pub mod logging;
pub mod server;
pub mod util;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        logging::error_console("Failed to install rustls crypto provider".to_string());
    }

    logging::info_file_async(format!(
        "upstream: {} timeout: {:?}",
        config::SETTINGS.upstream.url,
        config::SETTINGS.upstream.timeout()
    ));

    server::start(Arc::new(MisTwse::default())).await?;

    tokio::signal::ctrl_c().await?;
    logging::info_file_async("Received ctrl_c, shutting down");
    // 讓寫檔線程有機會把最後的日誌寫出去
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    Ok(())
}
