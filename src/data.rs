//! # Market Data
//!
//! $$
//! P^{(i)} = \{(t_k, p^{(i)}_k)\}_{k=1}^{T_i},\quad t_1 < t_2 < \dots
//! $$
//!
//! Price series, the market-data provider seam and calendar alignment.

pub mod align;
pub mod provider;
pub mod types;
#[cfg(feature = "yahoo")]
pub mod yahoo;

pub use align::AlignedPrices;
pub use align::AlignmentMode;
pub use align::PriceSeriesAligner;
pub use provider::fetch_all;
pub use provider::FetchOutcome;
pub use provider::InMemoryProvider;
pub use provider::MarketDataProvider;
pub use provider::TickerError;
pub use types::AssetSeries;
pub use types::Interval;
pub use types::Period;
pub use types::PricePoint;
#[cfg(feature = "yahoo")]
pub use yahoo::YahooProvider;
