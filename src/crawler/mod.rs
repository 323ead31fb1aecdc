use anyhow::Result;
use async_trait::async_trait;

use crate::crawler::twse::realtime::RealtimeResponse;

/// 台灣證券交易所
pub mod twse;

/// 即時報價來源
///
/// `ex_ch` 為一個或多個以 `|` 分隔的市場代號，例如 `tse_2330.tw` 或 `tse_t00.tw|otc_o00.tw`。
#[async_trait]
pub trait RealtimeSource: Send + Sync {
    async fn fetch(&self, ex_ch: &str) -> Result<RealtimeResponse>;
}
