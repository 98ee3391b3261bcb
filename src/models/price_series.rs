use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AnalyticsError;

// A single observation for one instrument. Missing values are NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    #[serde(with = "nullable_f64")]
    pub close: f64,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self {
            timestamp,
            close,
            high: None,
            low: None,
            volume: None,
        }
    }

    pub fn with_range(mut self, high: f64, low: f64) -> Self {
        self.high = Some(high);
        self.low = Some(low);
        self
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }
}

/// Ordered price history for one instrument.
///
/// Timestamps are strictly increasing; this is checked on construction and
/// on deserialization through [`PriceSeries::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawPriceSeries")]
pub struct PriceSeries {
    pub symbol: String,
    points: Vec<PricePoint>,
}

#[derive(Deserialize)]
struct RawPriceSeries {
    symbol: String,
    points: Vec<PricePoint>,
}

impl TryFrom<RawPriceSeries> for PriceSeries {
    type Error = AnalyticsError;

    fn try_from(raw: RawPriceSeries) -> Result<Self, Self::Error> {
        PriceSeries::new(raw.symbol, raw.points)
    }
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Result<Self, AnalyticsError> {
        let symbol = symbol.into();
        if let Some(pos) = points
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(AnalyticsError::Validation(format!(
                "Timestamps for {} must be strictly increasing (violation at index {})",
                symbol,
                pos + 1
            )));
        }
        Ok(Self { symbol, points })
    }

    /// Build a daily series from bare closes, starting at `start`.
    pub fn from_closes(
        symbol: impl Into<String>,
        start: DateTime<Utc>,
        closes: &[f64],
    ) -> Result<Self, AnalyticsError> {
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint::new(start + chrono::Duration::days(i as i64), c))
            .collect();
        Self::new(symbol, points)
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    /// Highs with missing points as NaN; `None` when no point has a high.
    pub fn highs(&self) -> Option<Vec<f64>> {
        self.optional_field(|p| p.high)
    }

    pub fn lows(&self) -> Option<Vec<f64>> {
        self.optional_field(|p| p.low)
    }

    pub fn volumes(&self) -> Option<Vec<f64>> {
        self.optional_field(|p| p.volume)
    }

    fn optional_field(&self, field: impl Fn(&PricePoint) -> Option<f64>) -> Option<Vec<f64>> {
        if !self.points.is_empty() && self.points.iter().all(|p| field(p).is_none()) {
            return None;
        }
        Some(
            self.points
                .iter()
                .map(|p| field(p).unwrap_or(f64::NAN))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReturnKind {
    #[default]
    Simple,
    Log,
}

/// Period returns derived from a price series. `values.len() == prices - 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnSeries {
    #[serde(default)]
    pub kind: ReturnKind,
    #[serde(with = "nullable_f64_vec")]
    pub values: Vec<f64>,
}

impl ReturnSeries {
    pub fn from_values(values: Vec<f64>) -> Self {
        Self {
            kind: ReturnKind::Simple,
            values,
        }
    }

    /// A return touching a NaN price, or a non-positive base price, is NaN.
    pub fn from_prices(series: &PriceSeries, kind: ReturnKind) -> Self {
        let closes = series.closes();
        let values = closes
            .windows(2)
            .map(|w| {
                let (prev, cur) = (w[0], w[1]);
                if !prev.is_finite() || !cur.is_finite() || prev <= 0.0 {
                    return f64::NAN;
                }
                match kind {
                    ReturnKind::Simple => (cur - prev) / prev,
                    ReturnKind::Log if cur > 0.0 => (cur / prev).ln(),
                    ReturnKind::Log => f64::NAN,
                }
            })
            .collect();
        Self { kind, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// JSON has no NaN: missing values travel as `null`.
pub(crate) mod nullable_f64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

pub(crate) mod nullable_f64_vec {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for v in values {
            if v.is_finite() {
                seq.serialize_element(v)?;
            } else {
                seq.serialize_element(&Option::<f64>::None)?;
            }
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let raw = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_rejects_non_increasing_timestamps() {
        let t = start();
        let points = vec![PricePoint::new(t, 1.0), PricePoint::new(t, 2.0)];
        let result = PriceSeries::new("NG", points);
        assert!(matches!(result, Err(AnalyticsError::Validation(_))));
    }

    #[test]
    fn test_partial_range_marks_gaps_as_nan() {
        let t = start();
        let points = vec![
            PricePoint::new(t, 10.0).with_range(11.0, 9.0),
            PricePoint::new(t + chrono::Duration::days(1), 10.5),
            PricePoint::new(t + chrono::Duration::days(2), 10.2).with_range(10.8, 9.9),
        ];
        let series = PriceSeries::new("CL", points).unwrap();

        let highs = series.highs().unwrap();
        assert_eq!(highs[0], 11.0);
        assert!(highs[1].is_nan());
        assert!(series.volumes().is_none());
    }

    #[test]
    fn test_simple_returns_have_one_less_element() {
        let series = PriceSeries::from_closes("CL", start(), &[100.0, 110.0, 99.0]).unwrap();
        let returns = ReturnSeries::from_prices(&series, ReturnKind::Simple);

        assert_eq!(returns.len(), 2);
        assert!((returns.values[0] - 0.10).abs() < 1e-12);
        assert!((returns.values[1] + 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_nan_price_produces_nan_returns_around_it() {
        let series = PriceSeries::from_closes("CL", start(), &[100.0, f64::NAN, 100.0, 101.0]).unwrap();
        let returns = ReturnSeries::from_prices(&series, ReturnKind::Log);

        assert!(returns.values[0].is_nan());
        assert!(returns.values[1].is_nan());
        assert!((returns.values[2] - (1.01f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_nan_serializes_as_null() {
        let returns = ReturnSeries::from_values(vec![0.01, f64::NAN]);
        let json = serde_json::to_value(&returns).unwrap();
        assert_eq!(json["values"][1], serde_json::Value::Null);

        let back: ReturnSeries = serde_json::from_value(json).unwrap();
        assert!(back.values[1].is_nan());
    }

    #[test]
    fn test_deserialize_validates_ordering() {
        let json = serde_json::json!({
            "symbol": "HO",
            "points": [
                { "timestamp": "2024-01-02T00:00:00Z", "close": 1.0 },
                { "timestamp": "2024-01-01T00:00:00Z", "close": null }
            ]
        });
        assert!(serde_json::from_value::<PriceSeries>(json).is_err());
    }
}
