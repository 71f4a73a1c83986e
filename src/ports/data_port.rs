//! Data access port trait.

use crate::domain::bar::BarSeries;
use crate::domain::error::FastTradeError;

pub trait DataPort {
    /// The full prepared series for one symbol, time-ordered.
    fn fetch_bars(&self, symbol: &str) -> Result<BarSeries, FastTradeError>;

    fn list_symbols(&self) -> Result<Vec<String>, FastTradeError>;
}
