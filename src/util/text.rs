use std::str::FromStr;

use anyhow::*;
use rust_decimal::Decimal;

use crate::declare::NO_DATA;

/// 將上游的無資料標記轉為 `None`
///
/// 欄位不存在、空字串或為 [`NO_DATA`] 時皆視為無資料，其餘原樣回傳。
pub fn non_sentinel(s: Option<&str>) -> Option<&str> {
    s.map(str::trim)
        .filter(|v| !v.is_empty() && *v != NO_DATA)
}

/// Parses a decimal value from a given string.
///
/// Only surrounding whitespace is trimmed; any other non-numeric character makes
/// the value invalid instead of being silently dropped.
///
/// # Returns
///
/// * `Result<Decimal>`: The parsed `Decimal` value if successful, or an error
///   if the conversion fails.
pub fn parse_decimal(s: &str) -> Result<Decimal> {
    let trimmed = s.trim();
    Decimal::from_str(trimmed)
        .map_err(|why| anyhow!("Failed to parse '{}' as Decimal because {:?}", trimmed, why))
}

/// 解析可能為無資料標記的數值欄位
pub fn parse_optional_decimal(s: Option<&str>) -> Option<Decimal> {
    non_sentinel(s).and_then(|v| parse_decimal(v).ok())
}
