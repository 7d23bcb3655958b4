use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RegimeError, Result};

/// Names of the optional precomputed indicator columns the trend classifier
/// knows how to use. Lookups are case-insensitive.
pub mod columns {
    /// Directional-strength value (ADX style).
    pub const ADX: &str = "adx";
    pub const EMA_FAST: &str = "ema_20";
    pub const EMA_SLOW: &str = "ema_50";
    /// Average true range.
    pub const ATR: &str = "atr";

    pub const OPTIONAL: [&str; 4] = [ADX, EMA_FAST, EMA_SLOW, ATR];
}

const REQUIRED_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// One OHLCV time step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn change(&self) -> f64 {
        self.close - self.open
    }
}

/// Time-ordered sequence of bars. Construction rejects any timestamp that
/// does not strictly increase; bars are never re-sorted afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    bars: Vec<Bar>,
}

impl Series {
    pub fn new(bars: Vec<Bar>) -> Result<Self> {
        if let Some(pos) = bars
            .windows(2)
            .position(|pair| pair[1].timestamp <= pair[0].timestamp)
        {
            return Err(RegimeError::NonMonotonicTimestamps(pos + 1));
        }
        Ok(Self { bars })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }
}

/// A [`Series`] plus optional indicator columns aligned one-to-one with the
/// bars. Which columns are present decides the trend classifier's path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorFrame {
    series: Series,
    columns: BTreeMap<String, Vec<f64>>,
}

impl IndicatorFrame {
    pub fn new(series: Series) -> Self {
        Self {
            series,
            columns: BTreeMap::new(),
        }
    }

    /// Build a frame from raw tabular columns. Required OHLCV columns are
    /// matched case-insensitively; recognised indicator columns are kept,
    /// anything else is ignored.
    pub fn from_columns(
        timestamps: Vec<DateTime<Utc>>,
        raw: HashMap<String, Vec<f64>>,
    ) -> Result<Self> {
        let rows = timestamps.len();
        let lowered: HashMap<String, Vec<f64>> = raw
            .into_iter()
            .map(|(name, values)| (name.to_lowercase(), values))
            .collect();

        for name in REQUIRED_COLUMNS {
            match lowered.get(name) {
                None => return Err(RegimeError::MissingColumn(name.to_string())),
                Some(values) if values.len() != rows => {
                    return Err(RegimeError::ColumnLength {
                        column: name.to_string(),
                        expected: rows,
                        actual: values.len(),
                    })
                }
                Some(_) => {}
            }
        }

        let (open, high, low) = (&lowered["open"], &lowered["high"], &lowered["low"]);
        let (close, volume) = (&lowered["close"], &lowered["volume"]);
        let bars = timestamps
            .iter()
            .enumerate()
            .map(|(i, ts)| Bar {
                timestamp: *ts,
                open: open[i],
                high: high[i],
                low: low[i],
                close: close[i],
                volume: volume[i],
            })
            .collect();

        let mut frame = Self::new(Series::new(bars)?);
        for name in columns::OPTIONAL {
            if let Some(values) = lowered.get(name) {
                frame = frame.with_column(name, values.clone())?;
            }
        }
        Ok(frame)
    }

    /// Build a frame from deserialized row records.
    pub fn from_records(records: Vec<BarRecord>) -> Result<Self> {
        let bars = records.iter().map(BarRecord::bar).collect();
        let mut frame = Self::new(Series::new(bars)?);

        let optional: [(&str, fn(&BarRecord) -> Option<f64>); 4] = [
            (columns::ADX, |r| r.adx),
            (columns::EMA_FAST, |r| r.ema_20),
            (columns::EMA_SLOW, |r| r.ema_50),
            (columns::ATR, |r| r.atr),
        ];
        for (name, getter) in optional {
            if records.iter().any(|r| getter(r).is_some()) {
                let values = records
                    .iter()
                    .map(|r| getter(r).unwrap_or(f64::NAN))
                    .collect();
                frame = frame.with_column(name, values)?;
            }
        }
        Ok(frame)
    }

    /// Attach (or replace) an indicator column.
    pub fn with_column(mut self, name: &str, values: Vec<f64>) -> Result<Self> {
        if values.len() != self.series.len() {
            return Err(RegimeError::ColumnLength {
                column: name.to_string(),
                expected: self.series.len(),
                actual: values.len(),
            });
        }
        self.columns.insert(name.to_lowercase(), values);
        Ok(self)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(&name.to_lowercase()).map(Vec::as_slice)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(&name.to_lowercase())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl From<Series> for IndicatorFrame {
    fn from(series: Series) -> Self {
        Self::new(series)
    }
}

/// Row-oriented input schema. Capitalised field names are accepted as
/// aliases (`Close`, `CLOSE`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarRecord {
    #[serde(alias = "Timestamp", alias = "TIMESTAMP", alias = "time", alias = "Time")]
    pub timestamp: DateTime<Utc>,
    #[serde(alias = "Open", alias = "OPEN")]
    pub open: f64,
    #[serde(alias = "High", alias = "HIGH")]
    pub high: f64,
    #[serde(alias = "Low", alias = "LOW")]
    pub low: f64,
    #[serde(alias = "Close", alias = "CLOSE")]
    pub close: f64,
    #[serde(alias = "Volume", alias = "VOLUME")]
    pub volume: f64,
    #[serde(default, alias = "ADX", skip_serializing_if = "Option::is_none")]
    pub adx: Option<f64>,
    #[serde(default, alias = "EMA_20", skip_serializing_if = "Option::is_none")]
    pub ema_20: Option<f64>,
    #[serde(default, alias = "EMA_50", skip_serializing_if = "Option::is_none")]
    pub ema_50: Option<f64>,
    #[serde(default, alias = "ATR", skip_serializing_if = "Option::is_none")]
    pub atr: Option<f64>,
}

impl BarRecord {
    pub fn bar(&self) -> Bar {
        Bar {
            timestamp: self.timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

impl From<&Bar> for BarRecord {
    fn from(bar: &Bar) -> Self {
        Self {
            timestamp: bar.timestamp,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            adx: None,
            ema_20: None,
            ema_50: None,
            atr: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i)
    }

    fn bar(i: i64, close: f64) -> Bar {
        Bar {
            timestamp: ts(i),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_series_rejects_unordered_timestamps() {
        let bars = vec![bar(0, 100.0), bar(2, 101.0), bar(1, 102.0)];
        match Series::new(bars) {
            Err(RegimeError::NonMonotonicTimestamps(row)) => assert_eq!(row, 2),
            other => panic!("expected ordering error, got {:?}", other),
        }

        let dup = vec![bar(0, 100.0), bar(0, 101.0)];
        assert!(Series::new(dup).is_err());
    }

    #[test]
    fn test_from_columns_is_case_insensitive() {
        let mut raw = HashMap::new();
        raw.insert("Open".to_string(), vec![1.0, 2.0]);
        raw.insert("HIGH".to_string(), vec![1.5, 2.5]);
        raw.insert("low".to_string(), vec![0.5, 1.5]);
        raw.insert("Close".to_string(), vec![1.2, 2.2]);
        raw.insert("Volume".to_string(), vec![10.0, 20.0]);
        raw.insert("ADX".to_string(), vec![30.0, 31.0]);
        raw.insert("unrelated".to_string(), vec![0.0, 0.0]);

        let frame = IndicatorFrame::from_columns(vec![ts(0), ts(1)], raw).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.series().closes(), vec![1.2, 2.2]);
        assert_eq!(frame.column("adx"), Some(&[30.0, 31.0][..]));
        assert_eq!(frame.column_names().collect::<Vec<_>>(), vec!["adx"]);
    }

    #[test]
    fn test_from_columns_missing_close() {
        let mut raw = HashMap::new();
        for name in ["open", "high", "low", "volume"] {
            raw.insert(name.to_string(), vec![1.0]);
        }
        match IndicatorFrame::from_columns(vec![ts(0)], raw) {
            Err(RegimeError::MissingColumn(name)) => assert_eq!(name, "close"),
            other => panic!("expected missing column, got {:?}", other),
        }
    }

    #[test]
    fn test_with_column_length_mismatch() {
        let series = Series::new(vec![bar(0, 1.0), bar(1, 2.0)]).unwrap();
        let result = IndicatorFrame::new(series).with_column("atr", vec![1.0]);
        assert!(matches!(result, Err(RegimeError::ColumnLength { .. })));
    }

    #[test]
    fn test_records_accept_capitalised_fields() {
        let json = r#"[
            {"Timestamp": "2024-01-01T00:00:00Z", "Open": 1.0, "High": 2.0, "Low": 0.5, "Close": 1.5, "Volume": 100.0},
            {"timestamp": "2024-01-01T01:00:00Z", "open": 1.5, "high": 2.5, "low": 1.0, "close": 2.0, "volume": 120.0, "adx": 28.0}
        ]"#;
        let records: Vec<BarRecord> = serde_json::from_str(json).unwrap();
        let frame = IndicatorFrame::from_records(records).unwrap();

        assert_eq!(frame.len(), 2);
        let adx = frame.column(columns::ADX).unwrap();
        assert!(adx[0].is_nan());
        assert_eq!(adx[1], 28.0);
        assert!(!frame.has_column(columns::ATR));
    }
}
