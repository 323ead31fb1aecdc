use std::fmt;

use concat_string::concat_string;

use crate::declare::StockExchange;

/// ex_ch 中市場前綴與代號之間的分隔字元
const QUALIFIER_DELIMITER: char = '_';
const QUALIFIER_DELIMITER_STR: &str = "_";
const CHANNEL_SUFFIX: &str = ".tw";

/// 視為大盤（加權指數）的別名，比對時不分大小寫
const INDEX_ALIASES: [&str; 3] = ["taiex", "tse", "大盤"];

/// 即時報價查詢用的市場代號，例如 `tse_2330.tw`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateKey(String);

impl CandidateKey {
    pub fn new(exchange: StockExchange, code: &str) -> Self {
        CandidateKey(concat_string!(
            exchange.channel_prefix(),
            QUALIFIER_DELIMITER_STR,
            code,
            CHANNEL_SUFFIX
        ))
    }

    /// 呼叫端已提供完整的 ex_ch，原樣保留
    pub fn qualified(ex_ch: &str) -> Self {
        CandidateKey(ex_ch.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 去掉市場前綴與後綴後的代號，`tse_2330.tw` => `2330`
    pub fn code(&self) -> &str {
        let code = self
            .0
            .split_once(QUALIFIER_DELIMITER)
            .map_or(self.0.as_str(), |(_, rest)| rest);

        code.strip_suffix(CHANNEL_SUFFIX).unwrap_or(code)
    }
}

impl fmt::Display for CandidateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_index_alias(code: &str) -> bool {
    let lowered = code.trim().to_lowercase();
    INDEX_ALIASES.iter().any(|alias| *alias == lowered)
}

/// 將股票代號轉為依序嘗試的 ex_ch 清單
///
/// 已含市場前綴的代號只會有一個候選；其餘先查上市再查上櫃。
pub fn resolve(code: &str) -> Vec<CandidateKey> {
    if code.contains(QUALIFIER_DELIMITER) {
        return vec![CandidateKey::qualified(code)];
    }

    let code = if is_index_alias(code) {
        StockExchange::TWSE.composite_index()
    } else {
        code
    };

    StockExchange::iterator()
        .map(|exchange| CandidateKey::new(exchange, code))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(code: &str) -> Vec<String> {
        resolve(code).iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_resolve_plain_code() {
        assert_eq!(keys("2330"), vec!["tse_2330.tw", "otc_2330.tw"]);
        assert_eq!(keys("0050"), vec!["tse_0050.tw", "otc_0050.tw"]);
        assert_eq!(keys("6488"), vec!["tse_6488.tw", "otc_6488.tw"]);
    }

    #[test]
    fn test_resolve_qualified_pass_through() {
        for ex_ch in ["tse_2330.tw", "otc_6488.tw", "TSE_2330.TW", "otc_o00.tw"] {
            let candidates = resolve(ex_ch);
            assert_eq!(candidates.len(), 1);
            assert_eq!(candidates[0].as_str(), ex_ch);
        }
    }

    #[test]
    fn test_resolve_index_alias() {
        for alias in ["TAIEX", "taiex", "TaiEx", "TSE", "tse", " tse ", "大盤"] {
            assert_eq!(keys(alias), vec!["tse_t00.tw", "otc_t00.tw"], "alias: {}", alias);
        }
    }

    #[test]
    fn test_resolve_preserves_case() {
        assert_eq!(keys("00632R"), vec!["tse_00632R.tw", "otc_00632R.tw"]);
    }

    #[test]
    fn test_candidate_code() {
        assert_eq!(CandidateKey::new(StockExchange::TPEx, "6488").code(), "6488");
        assert_eq!(CandidateKey::qualified("tse_t00.tw").code(), "t00");
        assert_eq!(CandidateKey::qualified("2330").code(), "2330");
    }
}
