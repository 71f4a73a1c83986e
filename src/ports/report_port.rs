//! Report output port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::FastTradeError;

/// Port for persisting a finished run.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, symbol: &str) -> Result<(), FastTradeError>;

    /// Write every successful run of a batch; failed symbols are skipped.
    fn write_batch(
        &self,
        results: &[(String, Result<BacktestResult, FastTradeError>)],
    ) -> Result<usize, FastTradeError> {
        let mut written = 0;
        for (symbol, result) in results {
            if let Ok(result) = result {
                self.write(result, symbol)?;
                written += 1;
            }
        }
        Ok(written)
    }
}
