use std::{env, path::PathBuf, str::FromStr, time::Duration};

use anyhow::Result;
use config::{Config as config_config, File as config_file};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::logging;

const CONFIG_PATH: &str = "app.json";

/// 證交所基本市況報導網站的即時報價 API
const DEFAULT_UPSTREAM_URL: &str = "https://mis.twse.com.tw/stock/api/getStockInfo.jsp";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const DEFAULT_HTTP_PORT: u16 = 8000;

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct App {
    #[serde(default)]
    pub upstream: Upstream,
    #[serde(default)]
    pub system: System,
}

const UPSTREAM_URL: &str = "UPSTREAM_URL";
const UPSTREAM_TIMEOUT_SECS: &str = "UPSTREAM_TIMEOUT_SECS";
const UPSTREAM_USER_AGENT: &str = "UPSTREAM_USER_AGENT";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Upstream {
    #[serde(default = "default_upstream_url")]
    pub url: String,
    /// 單次請求的逾時秒數
    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for Upstream {
    fn default() -> Self {
        Upstream {
            url: default_upstream_url(),
            timeout_secs: default_upstream_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Upstream {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_upstream_url() -> String {
    DEFAULT_UPSTREAM_URL.to_string()
}

fn default_upstream_timeout_secs() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

const SYSTEM_HTTP_PORT: &str = "SYSTEM_HTTP_PORT";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct System {
    /// 0 表示不啟動 HTTP 服務
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl Default for System {
    fn default() -> Self {
        System {
            http_port: default_http_port(),
        }
    }
}

fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}

pub static SETTINGS: Lazy<App> = Lazy::new(|| match App::get() {
    Ok(app) => app,
    Err(why) => {
        logging::error_file_async(format!(
            "I can't read the config context because {:?}",
            why
        ));
        App::default().override_with_env()
    }
});

impl App {
    fn get() -> Result<Self> {
        let config_path = config_path();
        if config_path.exists() {
            let config: App = config_config::builder()
                .add_source(config_file::from(config_path))
                .build()?
                .try_deserialize()?;
            return Ok(config.override_with_env());
        }

        Ok(App::default().override_with_env())
    }

    /// 將來至於 env 的設定值覆蓋掉 json 上的設定值
    fn override_with_env(mut self) -> Self {
        if let Ok(url) = env::var(UPSTREAM_URL) {
            self.upstream.url = url;
        }

        if let Ok(secs) = env::var(UPSTREAM_TIMEOUT_SECS) {
            self.upstream.timeout_secs =
                u64::from_str(&secs).unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);
        }

        if let Ok(user_agent) = env::var(UPSTREAM_USER_AGENT) {
            self.upstream.user_agent = user_agent;
        }

        if let Ok(port) = env::var(SYSTEM_HTTP_PORT) {
            self.system.http_port = u16::from_str(&port).unwrap_or(DEFAULT_HTTP_PORT);
        }

        self
    }
}

/// 回傳設定檔的路徑
fn config_path() -> PathBuf {
    PathBuf::from(CONFIG_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let app = App::default();
        assert_eq!(app.upstream.url, DEFAULT_UPSTREAM_URL);
        assert_eq!(app.upstream.timeout(), Duration::from_secs(10));
        assert!(app.upstream.user_agent.starts_with("twse_realtime/"));
        assert_eq!(app.system.http_port, 8000);
    }

    #[test]
    fn test_partial_json() {
        let app: App = serde_json::from_str(r#"{"upstream":{"timeout_secs":3}}"#).unwrap();
        assert_eq!(app.upstream.timeout_secs, 3);
        assert_eq!(app.upstream.url, DEFAULT_UPSTREAM_URL);
        assert_eq!(app.system.http_port, 8000);

        let app: App = serde_json::from_str(r#"{"system":{"http_port":0}}"#).unwrap();
        assert_eq!(app.system.http_port, 0);
    }

    #[tokio::test]
    async fn test_init() {
        dotenv::dotenv().ok();
        logging::debug_file_async(format!("SETTINGS.upstream: {:#?}\r\n", SETTINGS.upstream));
        logging::debug_file_async(format!("SETTINGS.system: {:#?}\r\n", SETTINGS.system));
    }
}
