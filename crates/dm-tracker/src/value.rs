//! Tracker cell values.

use std::fmt;

/// One tracker cell: `NA`, `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrackerValue {
    #[default]
    Na,
    Zero,
    One,
}

impl TrackerValue {
    pub fn from_bool(value: bool) -> Self {
        if value { Self::One } else { Self::Zero }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Na => "NA",
            Self::Zero => "0",
            Self::One => "1",
        }
    }

    /// Parse a stored cell; anything unrecognised reads as `NA`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "1" | "1.0" => Self::One,
            "0" | "0.0" => Self::Zero,
            _ => Self::Na,
        }
    }

    /// Logical OR over the determined values: any `1` wins, otherwise any
    /// `0` gives `0`. Only all-`NA` (or no values) gives `NA`.
    pub fn any<I: IntoIterator<Item = Self>>(values: I) -> Self {
        let mut result = Self::Na;
        for value in values {
            match value {
                Self::One => return Self::One,
                Self::Zero => result = Self::Zero,
                Self::Na => {}
            }
        }
        result
    }

    /// Logical AND: any `0` wins, all `1` gives `1`, otherwise `NA`.
    pub fn all<I: IntoIterator<Item = Self>>(values: I) -> Self {
        let mut result = Self::One;
        let mut empty = true;
        for value in values {
            empty = false;
            match value {
                Self::Zero => return Self::Zero,
                Self::Na => result = Self::Na,
                Self::One => {}
            }
        }
        if empty { Self::Na } else { result }
    }
}

impl fmt::Display for TrackerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::TrackerValue::{Na, One, Zero};
    use super::*;

    #[test]
    fn or_and_and_with_missing_values() {
        assert_eq!(TrackerValue::any([Zero, One, Na]), One);
        assert_eq!(TrackerValue::any([Zero, Na]), Zero);
        assert_eq!(TrackerValue::any([Na, Zero]), Zero);
        assert_eq!(TrackerValue::any([Na, Na]), Na);
        assert_eq!(TrackerValue::any([]), Na);
        assert_eq!(TrackerValue::any([Zero, Zero]), Zero);
        assert_eq!(TrackerValue::all([One, Zero, Na]), Zero);
        assert_eq!(TrackerValue::all([One, Na]), Na);
        assert_eq!(TrackerValue::all([One, One]), One);
        assert_eq!(TrackerValue::all([]), Na);
    }

    #[test]
    fn parses_spreadsheet_cells() {
        assert_eq!(TrackerValue::parse(" 1.0"), One);
        assert_eq!(TrackerValue::parse("0"), Zero);
        assert_eq!(TrackerValue::parse(""), Na);
        assert_eq!(One.to_string(), "1");
    }
}
