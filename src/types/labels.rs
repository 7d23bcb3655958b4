use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Short-vs-long realized volatility bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VolatilityRegime {
    Low = 0,
    Normal = 1,
    High = 2,
}

impl VolatilityRegime {
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Low),
            1 => Some(Self::Normal),
            2 => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl fmt::Display for VolatilityRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrendRegime {
    Ranging = 0,
    Trending = 1,
}

impl TrendRegime {
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Ranging),
            1 => Some(Self::Trending),
            _ => None,
        }
    }

    pub fn from_flag(trending: bool) -> Self {
        if trending {
            Self::Trending
        } else {
            Self::Ranging
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ranging => "ranging",
            Self::Trending => "trending",
        }
    }
}

impl fmt::Display for TrendRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Relative volume bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VolumeRegime {
    Dry = 0,
    Normal = 1,
    Surge = 2,
}

impl VolumeRegime {
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Dry),
            1 => Some(Self::Normal),
            2 => Some(Self::Surge),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dry => "dry",
            Self::Normal => "normal",
            Self::Surge => "surge",
        }
    }
}

impl fmt::Display for VolumeRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One value per input bar, produced by a single classifier. There are no
/// mutating methods: a label series is final once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LabelSeries<T> {
    values: Vec<T>,
}

impl<T> LabelSeries<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self { values }
    }

    pub fn filled(value: T, len: usize) -> Self
    where
        T: Clone,
    {
        Self {
            values: vec![value; len],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Most recent value.
    pub fn last(&self) -> Option<&T> {
        self.values.last()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.values.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.values.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }
}

impl<T: Ord + Clone> LabelSeries<T> {
    /// Count of bars per label.
    pub fn value_counts(&self) -> BTreeMap<T, usize> {
        let mut counts = BTreeMap::new();
        for value in &self.values {
            *counts.entry(value.clone()).or_insert(0) += 1;
        }
        counts
    }
}

impl<T> FromIterator<T> for LabelSeries<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a LabelSeries<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
