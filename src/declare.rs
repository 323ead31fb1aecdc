use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 上游以此字元表示「無資料」
pub const NO_DATA: &str = "-";

/// 交易所
#[derive(PartialEq, Debug, Copy, Clone)]
pub enum StockExchange {
    /// 臺灣證券交易所
    TWSE,
    /// 證券櫃檯買賣市場
    TPEx,
}

impl StockExchange {
    /// 即時報價 ex_ch 使用的市場前綴
    pub fn channel_prefix(&self) -> &'static str {
        match self {
            StockExchange::TWSE => "tse",
            StockExchange::TPEx => "otc",
        }
    }

    /// 該市場的綜合指數代號
    pub fn composite_index(&self) -> &'static str {
        match self {
            StockExchange::TWSE => "t00",
            StockExchange::TPEx => "o00",
        }
    }

    /// 綜合指數對外顯示的名稱
    pub fn composite_index_name(&self) -> &'static str {
        match self {
            StockExchange::TWSE => "TAIEX",
            StockExchange::TPEx => "OTC_Index",
        }
    }

    /// 查詢順序：上市優先，其次上櫃
    pub fn iterator() -> impl Iterator<Item = Self> {
        [Self::TWSE, Self::TPEx].iter().copied()
    }
}

/// 即時報價（已正規化）
///
/// 每個欄位都一定存在，上游缺值時以 [`NO_DATA`] 代替。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RealtimeQuote {
    pub symbol: String,
    pub name: String,
    pub full_name: String,
    /// 目前價格，無成交時以最佳買價代替
    pub price: String,
    /// 漲跌
    pub change: String,
    /// 漲跌幅，含 %
    pub change_percent: String,
    pub open: String,
    pub high: String,
    pub low: String,
    /// 累積成交量（張）
    pub volume: String,
    /// 最近成交時間
    pub time: String,
    /// 交易日 YYYYMMDD
    pub date: String,
    pub best_bid_price: String,
    pub best_ask_price: String,
    /// 昨收
    pub previous_close: String,
    /// 實際取得資料的 ex_ch，例如 tse_2330.tw
    pub ex_ch: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuoteError {
    #[error("Stock symbol {symbol} not found in TSE or OTC: no data available on either market")]
    NotFound { symbol: String },

    #[error("Quote service unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Stock symbol must not be empty")]
    InvalidSymbol,
}
