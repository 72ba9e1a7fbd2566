use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use crate::core::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntRange {
    pub min: i64,
    pub max: i64,
}

impl IntRange {
    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealRange {
    pub min: f64,
    pub max: f64,
}

impl RealRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// String restricted by a pattern matched against the whole value.
#[derive(Debug, Clone)]
pub struct StringPattern {
    pub pattern: String,
    pub max_length: Option<usize>,
    anchored: Regex,
}

impl StringPattern {
    pub fn new(pattern: &str, max_length: Option<usize>) -> Result<Self> {
        Ok(StringPattern {
            pattern: pattern.to_string(),
            max_length,
            anchored: Regex::new(&format!("^(?:{})$", pattern))?,
        })
    }

    pub fn contains(&self, value: &str) -> bool {
        self.max_length.is_none_or(|max| value.chars().count() <= max) && self.anchored.is_match(value)
    }
}

impl PartialEq for StringPattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.max_length == other.max_length
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, value: NaiveDate) -> bool {
        (self.from..=self.to).contains(&value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: NaiveTime,
    pub to: NaiveTime,
}

impl TimeRange {
    pub fn contains(&self, value: NaiveTime) -> bool {
        (self.from..=self.to).contains(&value)
    }
}

/// Fixed-point decimal: at most `precision` digits, `scale` of them after the point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalSpec {
    pub precision: u32,
    pub scale: u32,
}

impl DecimalSpec {
    /// Whether a decimal literal such as `-123.45` fits.
    pub fn contains(&self, literal: &str) -> bool {
        let digits = literal.trim().trim_start_matches(['-', '+']);
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return false;
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return false;
        }

        let int_digits = int_part.trim_start_matches('0').len();
        let frac_digits = frac_part.trim_end_matches('0').len();
        frac_digits <= self.scale as usize && int_digits <= self.precision.saturating_sub(self.scale) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_matches_whole_value() {
        let code = StringPattern::new("[A-Z]{3}", Some(3)).unwrap();
        assert!(code.contains("GBP"));
        assert!(!code.contains("GBPX"));
        assert!(!code.contains("gbp"));
    }

    #[test]
    fn decimal_checks_digits_both_sides() {
        let money = DecimalSpec { precision: 5, scale: 2 };
        assert!(money.contains("123.45"));
        assert!(money.contains("-0.5"));
        assert!(money.contains("100.10"));
        assert!(!money.contains("1234.5"));
        assert!(!money.contains("1.234"));
        assert!(!money.contains("12a"));
    }

    #[test]
    fn ranges_are_inclusive() {
        let percent = IntRange { min: 0, max: 100 };
        assert!(percent.contains(0) && percent.contains(100));
        assert!(!percent.contains(101));

        let day = TimeRange {
            from: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            to: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        };
        assert!(day.contains(NaiveTime::from_hms_opt(12, 30, 0).unwrap()));
    }
}
