use serde::{Deserialize, Serialize};

/// OHLC (Open, High, Low, Close) data point as delivered by a series provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OhlcPoint {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

/// Parallel OHLCV arrays in ascending time order.
///
/// Index `len() - 1` is the most recent bar. Providers that omit volume get
/// an all-ones array of matching length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OhlcvSeries {
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl OhlcvSeries {
    /// Build a series from parallel arrays, substituting unit volume when absent.
    ///
    /// A supplied volume array is kept as-is; a length mismatch shows up in
    /// `is_aligned`.
    pub fn new(
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
        volume: Option<Vec<f64>>,
    ) -> Self {
        let volume = volume.unwrap_or_else(|| vec![1.0; close.len()]);
        Self {
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Convert provider bars into parallel arrays.
    pub fn from_points(points: &[OhlcPoint]) -> Self {
        let mut series = Self {
            open: Vec::with_capacity(points.len()),
            high: Vec::with_capacity(points.len()),
            low: Vec::with_capacity(points.len()),
            close: Vec::with_capacity(points.len()),
            volume: Vec::with_capacity(points.len()),
        };
        for p in points {
            series.open.push(p.open);
            series.high.push(p.high);
            series.low.push(p.low);
            series.close.push(p.close);
            series.volume.push(p.volume.unwrap_or(1.0));
        }
        series
    }

    /// Series built from closes only (open = high = low = close, unit volume).
    pub fn from_closes(closes: &[f64]) -> Self {
        Self::new(
            closes.to_vec(),
            closes.to_vec(),
            closes.to_vec(),
            closes.to_vec(),
            None,
        )
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    pub fn closes(&self) -> &[f64] {
        &self.close
    }

    pub fn last_close(&self) -> Option<f64> {
        self.close.last().copied()
    }

    /// True when all five arrays have the same length.
    pub fn is_aligned(&self) -> bool {
        let n = self.close.len();
        self.open.len() == n && self.high.len() == n && self.low.len() == n && self.volume.len() == n
    }

    /// Trailing window of at most `n` bars.
    pub fn tail(&self, n: usize) -> Self {
        let start = self.len().saturating_sub(n);
        Self {
            open: slice_from(&self.open, start),
            high: slice_from(&self.high, start),
            low: slice_from(&self.low, start),
            close: slice_from(&self.close, start),
            volume: slice_from(&self.volume, start),
        }
    }

    /// Append one bar.
    pub fn push(&mut self, open: f64, high: f64, low: f64, close: f64, volume: f64) {
        self.open.push(open);
        self.high.push(high);
        self.low.push(low);
        self.close.push(close);
        self.volume.push(volume);
    }

    /// Check that bar `i` satisfies the OHLC ordering invariant.
    pub fn is_consistent_at(&self, i: usize) -> bool {
        let (Some(&o), Some(&h), Some(&l), Some(&c)) = (
            self.open.get(i),
            self.high.get(i),
            self.low.get(i),
            self.close.get(i),
        ) else {
            return false;
        };
        h >= o.max(c) && l <= o.min(c) && h >= l
    }
}

fn slice_from(values: &[f64], start: usize) -> Vec<f64> {
    values.get(start..).map(<[f64]>::to_vec).unwrap_or_default()
}
