//! Price data: normalization, reconciliation, storage seams.

pub mod lookback;
pub mod normalize;
pub mod provider;
pub mod series;

pub use lookback::Lookback;
pub use normalize::{normalize, resample_to_daily, Cell, ColumnHeader, RawFrame, RawTimestamp};
pub use provider::{
    accept_latest_bar, bootstrap, HistoryFetcher, MemoryPriceStore, PriceHistoryProvider,
};
pub use series::{daily_close_from_raw, daily_price_series, patch_outliers, FillPolicy};
