use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::{
    config::SETTINGS,
    crawler::{twse::realtime, RealtimeSource},
    declare::QuoteError,
    logging,
};

type Source = Arc<dyn RealtimeSource>;

/// 依設定的埠號啟動 HTTP 服務
pub async fn start(source: Source) -> Result<()> {
    start_on(SETTINGS.system.http_port, source).await?;
    Ok(())
}

/// 埠號為 0 時不啟動並回傳 `None`，否則回傳實際綁定的位址
pub async fn start_on(port: u16, source: Source) -> Result<Option<SocketAddr>> {
    if port == 0 {
        let msg = "HTTP 服務未啟用 (SYSTEM_HTTP_PORT=0)";
        logging::info_console(msg.to_string());
        logging::info_file_async(msg);
        return Ok(None);
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(why) = axum::serve(listener, router(source)).await {
            logging::error_file_async(format!("HTTP 伺服器錯誤: {:?}", why));
        }
    });

    logging::info_file_async(format!("啟動 HTTP({:?}) 服務", local_addr));

    Ok(Some(local_addr))
}

pub fn router(source: Source) -> Router {
    Router::new()
        .route("/stock/{symbol}", get(stock_price))
        .route("/index", get(market_index))
        .with_state(source)
}

async fn stock_price(State(source): State<Source>, Path(symbol): Path<String>) -> Response {
    match realtime::get_stock_price_from(source.as_ref(), &symbol).await {
        Ok(quote) => Json(quote).into_response(),
        Err(why) => why.into_response(),
    }
}

async fn market_index(State(source): State<Source>) -> Response {
    match realtime::get_market_index_from(source.as_ref()).await {
        Ok(indices) => Json(indices).into_response(),
        Err(why) => why.into_response(),
    }
}

impl IntoResponse for QuoteError {
    fn into_response(self) -> Response {
        let status = match self {
            QuoteError::NotFound { .. } => StatusCode::NOT_FOUND,
            QuoteError::Unavailable { .. } => StatusCode::BAD_GATEWAY,
            QuoteError::InvalidSymbol => StatusCode::BAD_REQUEST,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::Value;

    use crate::crawler::twse::realtime::{RawQuote, RealtimeResponse};

    use super::*;

    /// 只有 tse_2330.tw 與指數有資料
    struct FixedSource;

    #[async_trait]
    impl RealtimeSource for FixedSource {
        async fn fetch(&self, ex_ch: &str) -> Result<RealtimeResponse> {
            let code = match ex_ch {
                "tse_2330.tw" => "2330",
                "tse_t00.tw|otc_o00.tw" => "t00",
                _ => return Err(anyhow!("connection refused")),
            };

            Ok(RealtimeResponse {
                msg_array: Some(vec![RawQuote {
                    code: Some(code.to_string()),
                    price: Some("186.50".to_string()),
                    previous_close: Some("185.00".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            })
        }
    }

    fn source() -> Source {
        Arc::new(FixedSource)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_start_disabled_port() {
        assert_eq!(start_on(0, source()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_start_binds_port() {
        let port = {
            let free = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            free.local_addr().unwrap().port()
        };
        let addr = start_on(port, source()).await.unwrap().unwrap();
        assert_eq!(addr.port(), port);
    }

    #[tokio::test]
    async fn test_stock_price_ok() {
        let response = stock_price(State(source()), Path("2330".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["symbol"], "2330");
        assert_eq!(body["change"], "1.50");
        assert_eq!(body["change_percent"], "0.81%");
        assert_eq!(body["ex_ch"], "tse_2330.tw");
    }

    #[tokio::test]
    async fn test_stock_price_not_found() {
        let response = stock_price(State(source()), Path("9999".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("9999"));
    }

    #[tokio::test]
    async fn test_stock_price_blank() {
        let response = stock_price(State(source()), Path(" ".to_string())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_market_index() {
        let response = market_index(State(source())).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["TAIEX"]["symbol"], "t00");
        assert!(body.get("OTC_Index").is_none());
    }
}
