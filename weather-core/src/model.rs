use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Offset between the Celsius and Kelvin scales.
pub const CELSIUS_OFFSET: f64 = 273.15;

/// A temperature on the absolute scale.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kelvin(pub f64);

impl Kelvin {
    pub fn from_celsius(celsius: f64) -> Self {
        Self(celsius + CELSIUS_OFFSET)
    }

    pub fn to_celsius(self) -> f64 {
        self.0 - CELSIUS_OFFSET
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Kelvin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} K", self.0)
    }
}

/// One provider's normalized measurement for a single query.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub provider: String,
    pub value: Kelvin,
}

/// Combined answer for one city.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    pub city: String,
    pub temp: Kelvin,
    /// Wall-clock time from dispatch to the last collected result.
    pub took: Duration,
    /// Number of readings that went into `temp`.
    pub contributors: usize,
}

/// Arithmetic mean of the readings. The divisor is the number of values summed.
pub fn mean_of(readings: &[Reading]) -> Option<Kelvin> {
    if readings.is_empty() {
        return None;
    }

    let sum: f64 = readings.iter().map(|r| r.value.0).sum();
    Some(Kelvin(sum / readings.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(provider: &str, k: f64) -> Reading {
        Reading { provider: provider.to_string(), value: Kelvin(k) }
    }

    #[test]
    fn celsius_conversion_uses_fixed_offset() {
        assert!((Kelvin::from_celsius(20.0).value() - 293.15).abs() < 1e-9);
        assert!((Kelvin(300.0).to_celsius() - 26.85).abs() < 1e-9);
    }

    #[test]
    fn mean_divides_by_number_of_readings() {
        let mean = mean_of(&[reading("a", 290.0), reading("b", 300.0)]).unwrap();
        assert_eq!(mean, Kelvin(295.0));

        let single = mean_of(&[reading("a", 281.5)]).unwrap();
        assert_eq!(single, Kelvin(281.5));
    }

    #[test]
    fn mean_of_nothing_is_none() {
        assert_eq!(mean_of(&[]), None);
    }
}
