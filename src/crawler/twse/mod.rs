/// 基本市況報導即時報價
pub mod realtime;
/// 股票代號轉為 ex_ch
pub mod symbol;
