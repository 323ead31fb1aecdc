use std::{collections::BTreeMap, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Local;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde_derive::Deserialize;

use crate::{
    config::SETTINGS,
    crawler::{
        twse::symbol::{resolve, CandidateKey},
        RealtimeSource,
    },
    declare::{QuoteError, RealtimeQuote, StockExchange, NO_DATA},
    logging,
    util::{
        self,
        text::{non_sentinel, parse_optional_decimal},
    },
};

/// 基本市況報導 getStockInfo.jsp 的回應
#[derive(Deserialize, Debug, Default, Clone)]
pub struct RealtimeResponse {
    #[serde(rename = "msgArray")]
    pub msg_array: Option<Vec<RawQuote>>,
    pub rtcode: Option<String>,
    pub rtmessage: Option<String>,
}

/// msgArray 中單一商品的原始欄位，任何欄位都可能缺漏或為 `-`
#[derive(Deserialize, Debug, Default, Clone)]
pub struct RawQuote {
    /// 代號
    #[serde(rename = "c")]
    pub code: Option<String>,
    /// 市場 tse / otc
    #[serde(rename = "ex")]
    pub exchange: Option<String>,
    /// 2330.tw
    #[serde(rename = "ch")]
    pub channel: Option<String>,
    /// 簡稱
    #[serde(rename = "n")]
    pub name: Option<String>,
    /// 全名
    #[serde(rename = "nf")]
    pub full_name: Option<String>,
    /// 最近成交價
    #[serde(rename = "z")]
    pub price: Option<String>,
    #[serde(rename = "o")]
    pub open: Option<String>,
    #[serde(rename = "h")]
    pub high: Option<String>,
    #[serde(rename = "l")]
    pub low: Option<String>,
    /// 累積成交量
    #[serde(rename = "v")]
    pub volume: Option<String>,
    /// 最近成交時刻 HH:MM:SS
    #[serde(rename = "t")]
    pub time: Option<String>,
    /// 交易日 YYYYMMDD
    #[serde(rename = "d")]
    pub date: Option<String>,
    /// 最佳五檔買價，以 `_` 分隔
    #[serde(rename = "b")]
    pub bid_prices: Option<String>,
    /// 最佳五檔賣價，以 `_` 分隔
    #[serde(rename = "a")]
    pub ask_prices: Option<String>,
    /// 昨收
    #[serde(rename = "y")]
    pub previous_close: Option<String>,
}

/// 證交所基本市況報導
pub struct MisTwse {
    url: String,
    timeout: Duration,
}

impl MisTwse {
    pub fn new(url: String, timeout: Duration) -> Self {
        MisTwse { url, timeout }
    }

    fn build_url(&self, ex_ch: &str) -> String {
        // 多檔查詢以 `|` 串接，各段分別編碼
        let ex_ch = ex_ch
            .split('|')
            .map(|key| urlencoding::encode(key).into_owned())
            .collect::<Vec<_>>()
            .join("|");

        format!(
            "{}?ex_ch={}&json=1&delay=0&_={}",
            self.url,
            ex_ch,
            Local::now().timestamp_millis()
        )
    }
}

impl Default for MisTwse {
    fn default() -> Self {
        MisTwse::new(SETTINGS.upstream.url.clone(), SETTINGS.upstream.timeout())
    }
}

#[async_trait]
impl RealtimeSource for MisTwse {
    async fn fetch(&self, ex_ch: &str) -> Result<RealtimeResponse> {
        let url = self.build_url(ex_ch);
        util::http::get_json::<RealtimeResponse>(&url, self.timeout).await
    }
}

/// 取得個股（或指數）即時報價
pub async fn get_stock_price(symbol: &str) -> Result<RealtimeQuote, QuoteError> {
    get_stock_price_from(&MisTwse::default(), symbol).await
}

/// 取得加權指數與櫃買指數，key 為 `TAIEX` 及 `OTC_Index`
pub async fn get_market_index() -> Result<BTreeMap<String, RealtimeQuote>, QuoteError> {
    get_market_index_from(&MisTwse::default()).await
}

pub async fn get_stock_price_from<S>(
    source: &S,
    symbol: &str,
) -> Result<RealtimeQuote, QuoteError>
where
    S: RealtimeSource + ?Sized,
{
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(QuoteError::InvalidSymbol);
    }

    let candidates = resolve(symbol);
    fetch_quote(source, symbol, &candidates).await
}

/// 依序嘗試每個候選 ex_ch，第一個有資料的即為結果
///
/// 單一候選請求失敗或回傳空的 msgArray 時只記錄並換下一個，全部落空才回傳 `NotFound`。
pub async fn fetch_quote<S>(
    source: &S,
    symbol: &str,
    candidates: &[CandidateKey],
) -> Result<RealtimeQuote, QuoteError>
where
    S: RealtimeSource + ?Sized,
{
    for candidate in candidates {
        match source.fetch(candidate.as_str()).await {
            Ok(response) => {
                if let Some(raw) = response.msg_array.and_then(|items| items.into_iter().next()) {
                    return Ok(normalize(&raw, candidate));
                }

                logging::warn_file_async(format!(
                    "{} has no data. rtcode:{:?} rtmessage:{:?}",
                    candidate, response.rtcode, response.rtmessage
                ));
            }
            Err(why) => {
                logging::warn_file_async(format!(
                    "Failed to fetch {} because {:?}",
                    candidate, why
                ));
            }
        }
    }

    Err(QuoteError::NotFound {
        symbol: symbol.to_string(),
    })
}

pub async fn get_market_index_from<S>(
    source: &S,
) -> Result<BTreeMap<String, RealtimeQuote>, QuoteError>
where
    S: RealtimeSource + ?Sized,
{
    let indices: Vec<(StockExchange, CandidateKey)> = StockExchange::iterator()
        .map(|exchange| (exchange, CandidateKey::new(exchange, exchange.composite_index())))
        .collect();
    let ex_ch = indices
        .iter()
        .map(|(_, key)| key.as_str())
        .collect::<Vec<_>>()
        .join("|");

    let response = source.fetch(&ex_ch).await.map_err(|why| {
        logging::error_file_async(format!("Failed to fetch {} because {:?}", ex_ch, why));
        QuoteError::Unavailable {
            reason: why.to_string(),
        }
    })?;

    let mut results = BTreeMap::new();
    for raw in response.msg_array.unwrap_or_default() {
        let matched = indices
            .iter()
            .find(|(exchange, _)| raw.code.as_deref() == Some(exchange.composite_index()));

        if let Some((exchange, key)) = matched {
            results.insert(
                exchange.composite_index_name().to_string(),
                normalize(&raw, key),
            );
        }
    }

    if results.is_empty() {
        return Err(QuoteError::NotFound { symbol: ex_ch });
    }

    Ok(results)
}

/// 將原始報價轉為固定欄位的 [`RealtimeQuote`]
pub fn normalize(raw: &RawQuote, ex_ch: &CandidateKey) -> RealtimeQuote {
    let price = resolve_price(raw);
    let (change, change_percent) = calculate_change(price, raw.previous_close.as_deref());

    RealtimeQuote {
        symbol: non_sentinel(raw.code.as_deref())
            .unwrap_or(ex_ch.code())
            .to_string(),
        name: or_no_data(&raw.name),
        full_name: or_no_data(&raw.full_name),
        price: price.unwrap_or(NO_DATA).to_string(),
        change,
        change_percent,
        open: or_no_data(&raw.open),
        high: or_no_data(&raw.high),
        low: or_no_data(&raw.low),
        volume: or_no_data(&raw.volume),
        time: or_no_data(&raw.time),
        date: or_no_data(&raw.date),
        best_bid_price: first_depth_price(raw.bid_prices.as_deref())
            .unwrap_or(NO_DATA)
            .to_string(),
        best_ask_price: first_depth_price(raw.ask_prices.as_deref())
            .unwrap_or(NO_DATA)
            .to_string(),
        previous_close: or_no_data(&raw.previous_close),
        ex_ch: ex_ch.to_string(),
    }
}

fn or_no_data(field: &Option<String>) -> String {
    non_sentinel(field.as_deref()).unwrap_or(NO_DATA).to_string()
}

/// 最近成交價，盤中尚未成交（`z` 為 `-`）時改用最佳買價
fn resolve_price(raw: &RawQuote) -> Option<&str> {
    non_sentinel(raw.price.as_deref()).or_else(|| first_depth_price(raw.bid_prices.as_deref()))
}

/// 取五檔價格字串的第一檔
///
/// 上游的 `b` / `a` 欄位形如 `186.00_186.50_187.00_`，部分回應以 `|` 分隔。
pub fn first_depth_price(depth: Option<&str>) -> Option<&str> {
    let first = non_sentinel(depth)?.split(['_', '|']).next();
    non_sentinel(first)
}

/// 計算漲跌與漲跌幅，任一數值無法解析或運算溢位時兩者皆為 `-`
///
/// 漲跌 = 現價 - 昨收，漲跌幅 = 漲跌 / 昨收 * 100%
pub fn calculate_change(price: Option<&str>, previous_close: Option<&str>) -> (String, String) {
    match checked_change(price, previous_close) {
        Some((change, change_percent)) => (
            format!("{:.2}", round(change)),
            format!("{:.2}%", round(change_percent)),
        ),
        None => (NO_DATA.to_string(), NO_DATA.to_string()),
    }
}

/// 昨收為 0 時 checked_div 回傳 None
fn checked_change(price: Option<&str>, previous_close: Option<&str>) -> Option<(Decimal, Decimal)> {
    let price = parse_optional_decimal(price)?;
    let previous_close = parse_optional_decimal(previous_close)?;
    let change = price.checked_sub(previous_close)?;
    let change_percent = change.checked_div(previous_close)?.checked_mul(dec!(100))?;

    Some((change, change_percent))
}

fn round(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
