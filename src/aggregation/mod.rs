pub mod candles;
pub mod stats;
pub mod timeframe;

pub use candles::{merge_candle, CandleChange};
pub use stats::recompute_stats;
pub use timeframe::Timeframe;
