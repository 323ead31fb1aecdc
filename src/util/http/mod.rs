use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use once_cell::sync::OnceCell;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;

use crate::{config::SETTINGS, logging};

/// A singleton instance of the reqwest client.
static CLIENT: OnceCell<Client> = OnceCell::new();

/// Returns the reqwest client singleton instance or creates one if it doesn't exist.
///
/// The client is shared by every request and is safe for concurrent use.
fn get_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        // 執行檔由 main 安裝 provider，測試不經過 main
        #[cfg(test)]
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            logging::debug_file_async("rustls crypto provider already installed");
        }

        Client::builder()
            // ===== 壓縮 =====
            .brotli(true)
            .gzip(true)
            .zstd(true)
            // ===== 超時設置 =====
            .connect_timeout(SETTINGS.upstream.timeout())
            .timeout(SETTINGS.upstream.timeout())
            // ===== TCP 優化 =====
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(60))
            // ===== 連接池 =====
            .pool_max_idle_per_host(20)
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::limited(5))
            // ===== Headers =====
            .user_agent(SETTINGS.upstream.user_agent.as_str())
            .build()
            .map_err(|e| anyhow!("Failed to create reqwest client: {:?}", e))
    })
}

/// Performs an HTTP GET request and deserializes the JSON response into the specified type.
///
/// A non-success status code is treated as an error, the same as a transport failure
/// or a body that cannot be deserialized into `RES`.
pub async fn get_json<RES: DeserializeOwned>(url: &str, timeout: Duration) -> Result<RES> {
    get_response(url, timeout)
        .await?
        .json::<RES>()
        .await
        .map_err(|e| anyhow!("Error parsing response JSON: {:?}", e))
}

pub async fn get_response(url: &str, timeout: Duration) -> Result<Response> {
    send(Method::GET, url, timeout).await
}

/// Sends a single HTTP request with its own timeout.
///
/// No retry is made here; callers that have alternatives (another market, another key)
/// decide what to do with the failure.
async fn send(method: Method, url: &str, timeout: Duration) -> Result<Response> {
    let visit_log = format!("{method}:{url}");
    let client = get_client()?;
    let rb = client.request(method, url).timeout(timeout);
    let start = Instant::now();
    let res = rb.send().await;
    let elapsed = start.elapsed().as_millis();

    match res {
        Ok(response) => {
            let status = response.status();
            logging::info_file_async(format!("{} {} {} ms", visit_log, status, elapsed));
            response
                .error_for_status()
                .map_err(|why| anyhow!("{} responded with {}: {:?}", visit_log, status, why))
        }
        Err(why) => {
            logging::error_file_async(format!(
                "{} failed because {:?}. {} ms",
                visit_log, why, elapsed
            ));
            Err(anyhow!("Failed to send request to {}: {:?}", url, why))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use crate::logging;

    use super::*;

    #[tokio::test]
    #[ignore]
    async fn test_get_json() {
        dotenv::dotenv().ok();
        let url = format!(
            "{}?ex_ch=tse_2330.tw&json=1&delay=0",
            SETTINGS.upstream.url
        );

        match get_json::<Value>(&url, SETTINGS.upstream.timeout()).await {
            Ok(v) => {
                logging::debug_file_async(format!("get_json: {:#?}", v));
            }
            Err(why) => {
                logging::debug_file_async(format!("Failed to get_json because {:?}", why));
            }
        }
    }

    #[tokio::test]
    async fn test_get_json_unreachable_host() {
        // 保留位址 (RFC 5737)，連線必定失敗
        let result =
            get_json::<Value>("http://192.0.2.1:9/never", Duration::from_millis(200)).await;
        assert!(result.is_err());
    }
}
