//! Units of measure and pure conversion helpers
//!
//! Canonical Observations always carry the metric's single canonical unit.
//! Adapters and callers speak a variety of unit spellings, which are parsed
//! into [`Unit`] and converted within one physical dimension.

use super::errors::MeridianError;
use super::result::Result;
use std::fmt;

/// Unit of measure understood by the interchange engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Celsius,
    Fahrenheit,
    BeatsPerMinute,
    Percent,
    /// Decimal fraction in `[0, 1]`
    Fraction,
    Steps,
    Minutes,
    Hours,
    Seconds,
    Kilocalories,
}

/// Physical dimension; conversions never cross dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Temperature,
    Frequency,
    Proportion,
    Count,
    Duration,
    Energy,
}

impl Unit {
    /// UCUM code
    pub fn ucum_code(&self) -> &'static str {
        match self {
            Unit::Celsius => "Cel",
            Unit::Fahrenheit => "[degF]",
            Unit::BeatsPerMinute => "/min",
            Unit::Percent => "%",
            Unit::Fraction => "1",
            Unit::Steps => "steps",
            Unit::Minutes => "min",
            Unit::Hours => "h",
            Unit::Seconds => "s",
            Unit::Kilocalories => "kcal",
        }
    }

    /// Human-readable unit text carried in `valueQuantity.unit`
    pub fn display(&self) -> &'static str {
        match self {
            Unit::Celsius => "Cel",
            Unit::Fahrenheit => "°F",
            Unit::BeatsPerMinute => "beats/min",
            Unit::Percent => "%",
            Unit::Fraction => "fraction",
            Unit::Steps => "steps",
            Unit::Minutes => "min",
            Unit::Hours => "h",
            Unit::Seconds => "s",
            Unit::Kilocalories => "kcal",
        }
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            Unit::Celsius | Unit::Fahrenheit => Dimension::Temperature,
            Unit::BeatsPerMinute => Dimension::Frequency,
            Unit::Percent | Unit::Fraction => Dimension::Proportion,
            Unit::Steps => Dimension::Count,
            Unit::Minutes | Unit::Hours | Unit::Seconds => Dimension::Duration,
            Unit::Kilocalories => Dimension::Energy,
        }
    }

    /// Parses the unit spellings used by platforms, UCUM and callers
    ///
    /// # Errors
    ///
    /// Returns `Conversion` for an unrecognized unit.
    pub fn parse(raw: &str) -> Result<Unit> {
        let unit = match raw.trim().to_lowercase().as_str() {
            "cel" | "°c" | "degc" | "c" | "celsius" => Unit::Celsius,
            "[degf]" | "°f" | "degf" | "f" | "fahrenheit" => Unit::Fahrenheit,
            "/min" | "beats/min" | "bpm" | "count/min" | "{beats}/min" => Unit::BeatsPerMinute,
            "%" | "percent" => Unit::Percent,
            "1" | "fraction" | "ratio" => Unit::Fraction,
            "steps" | "step" | "{steps}" | "count" => Unit::Steps,
            "min" | "mins" | "minute" | "minutes" => Unit::Minutes,
            "h" | "hr" | "hour" | "hours" => Unit::Hours,
            "s" | "sec" | "second" | "seconds" => Unit::Seconds,
            "kcal" | "cal" => Unit::Kilocalories,
            other => {
                return Err(MeridianError::Conversion(format!(
                    "unrecognized unit '{other}'"
                )))
            }
        };
        Ok(unit)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ucum_code())
    }
}

pub fn fahrenheit_to_celsius(value: f64) -> f64 {
    (value - 32.0) * 5.0 / 9.0
}

pub fn celsius_to_fahrenheit(value: f64) -> f64 {
    value * 9.0 / 5.0 + 32.0
}

pub fn fraction_to_percent(value: f64) -> f64 {
    value * 100.0
}

pub fn percent_to_fraction(value: f64) -> f64 {
    value / 100.0
}

pub fn hours_to_minutes(value: f64) -> f64 {
    value * 60.0
}

pub fn minutes_to_hours(value: f64) -> f64 {
    value / 60.0
}

/// Converts a value between two units of the same dimension
///
/// # Errors
///
/// Returns `Conversion` when the units measure different dimensions or the
/// value is not finite.
pub fn convert(value: f64, from: Unit, to: Unit) -> Result<f64> {
    if !value.is_finite() {
        return Err(MeridianError::Conversion(format!(
            "value {value} is not a finite number"
        )));
    }
    if from == to {
        return Ok(value);
    }
    if from.dimension() != to.dimension() {
        return Err(MeridianError::Conversion(format!(
            "cannot convert {from} to {to}"
        )));
    }

    let converted = match (from, to) {
        (Unit::Fahrenheit, Unit::Celsius) => fahrenheit_to_celsius(value),
        (Unit::Celsius, Unit::Fahrenheit) => celsius_to_fahrenheit(value),
        (Unit::Fraction, Unit::Percent) => fraction_to_percent(value),
        (Unit::Percent, Unit::Fraction) => percent_to_fraction(value),
        (Unit::Hours, Unit::Minutes) => hours_to_minutes(value),
        (Unit::Minutes, Unit::Hours) => minutes_to_hours(value),
        (Unit::Seconds, Unit::Minutes) => value / 60.0,
        (Unit::Minutes, Unit::Seconds) => value * 60.0,
        (Unit::Hours, Unit::Seconds) => value * 3600.0,
        (Unit::Seconds, Unit::Hours) => value / 3600.0,
        _ => {
            return Err(MeridianError::Conversion(format!(
                "no conversion from {from} to {to}"
            )))
        }
    };
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const EPSILON: f64 = 1e-9;

    #[test_case(98.6, Unit::Fahrenheit, Unit::Celsius, 37.0 ; "body temperature")]
    #[test_case(32.0, Unit::Fahrenheit, Unit::Celsius, 0.0 ; "freezing point")]
    #[test_case(100.0, Unit::Celsius, Unit::Fahrenheit, 212.0 ; "boiling point")]
    #[test_case(0.97, Unit::Fraction, Unit::Percent, 97.0 ; "spo2 fraction")]
    #[test_case(7.5, Unit::Hours, Unit::Minutes, 450.0 ; "sleep hours")]
    #[test_case(5400.0, Unit::Seconds, Unit::Minutes, 90.0 ; "seconds to minutes")]
    #[test_case(72.0, Unit::BeatsPerMinute, Unit::BeatsPerMinute, 72.0 ; "identity")]
    fn test_convert(value: f64, from: Unit, to: Unit, expected: f64) {
        let converted = convert(value, from, to).unwrap();
        assert!((converted - expected).abs() < 1e-6, "{converted} != {expected}");
    }

    #[test]
    fn test_convert_across_dimensions_fails() {
        let err = convert(10.0, Unit::Celsius, Unit::Minutes).unwrap_err();
        assert!(matches!(err, MeridianError::Conversion(_)));
    }

    #[test]
    fn test_convert_rejects_non_finite() {
        assert!(convert(f64::NAN, Unit::Celsius, Unit::Celsius).is_err());
        assert!(convert(f64::INFINITY, Unit::Hours, Unit::Minutes).is_err());
    }

    #[test]
    fn test_temperature_helpers_are_inverse() {
        for f in [95.0, 98.6, 104.2] {
            let back = celsius_to_fahrenheit(fahrenheit_to_celsius(f));
            assert!((back - f).abs() < EPSILON);
        }
    }

    #[test_case("degF", Unit::Fahrenheit)]
    #[test_case("[degF]", Unit::Fahrenheit)]
    #[test_case("count/min", Unit::BeatsPerMinute)]
    #[test_case("bpm", Unit::BeatsPerMinute)]
    #[test_case("Cel", Unit::Celsius)]
    #[test_case("count", Unit::Steps)]
    #[test_case("hours", Unit::Hours)]
    fn test_parse(raw: &str, expected: Unit) {
        assert_eq!(Unit::parse(raw).unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown() {
        assert!(matches!(
            Unit::parse("furlongs"),
            Err(MeridianError::Conversion(_))
        ));
    }
}
