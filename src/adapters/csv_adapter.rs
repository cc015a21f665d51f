//! CSV candle file adapter. One file per symbol, `{symbol}.csv`, with
//! header `timestamp,open,high,low,close,volume` and RFC 3339 timestamps.

use crate::domain::candle::{Candle, PriceSeries};
use crate::domain::error::CoinledgerError;
use crate::ports::data_port::MarketDataPort;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;

pub struct CsvCandleAdapter {
    base_path: PathBuf,
}

impl CsvCandleAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    fn field_f64(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, CoinledgerError> {
        record
            .get(index)
            .ok_or_else(|| CoinledgerError::Data {
                reason: format!("missing {} column", name),
            })?
            .parse()
            .map_err(|e| CoinledgerError::Data {
                reason: format!("invalid {} value: {}", name, e),
            })
    }
}

impl MarketDataPort for CsvCandleAdapter {
    fn fetch_candles(&self, symbol: &str) -> Result<PriceSeries, CoinledgerError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| CoinledgerError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| CoinledgerError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;

            let ts_str = record.get(0).ok_or_else(|| CoinledgerError::Data {
                reason: "missing timestamp column".into(),
            })?;
            let timestamp = DateTime::parse_from_rfc3339(ts_str)
                .map_err(|e| CoinledgerError::Data {
                    reason: format!("invalid timestamp '{}': {}", ts_str, e),
                })?
                .with_timezone(&Utc);

            candles.push(Candle {
                timestamp,
                open: Self::field_f64(&record, 1, "open")?,
                high: Self::field_f64(&record, 2, "high")?,
                low: Self::field_f64(&record, 3, "low")?,
                close: Self::field_f64(&record, 4, "close")?,
                volume: Self::field_f64(&record, 5, "volume")?,
            });
        }

        PriceSeries::normalize(symbol, candles)
    }

    fn list_symbols(&self) -> Result<Vec<String>, CoinledgerError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| CoinledgerError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CoinledgerError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(stem) = name_str.strip_suffix(".csv") {
                symbols.push(stem.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
