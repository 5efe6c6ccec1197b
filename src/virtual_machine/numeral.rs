//! Tagged numeral tokens.
//!
//! Every operand, memory value and register value in a program image is a
//! [`Numeral`]. The surface marker decides how its digits are read:
//!
//! | Marker | Variant | Radix |
//! |---|---|---|
//! | `#` | [`Numeral::Immediate`] | 10, resolved when parsed |
//! | `&` | [`Numeral::Hex`] | 16, whatever the declared base |
//! | `B` | [`Numeral::Bin`] | 2, whatever the declared base |
//! | none | [`Numeral::Bare`] | the run's declared [`Base`] |

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const IMMEDIATE_MARKER: char = '#';
const HEX_MARKER: char = '&';
const BIN_MARKER: char = 'B';

/// Declared numeral base of a run, applied to bare numerals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Base {
    Binary,
    #[default]
    Decimal,
    Hex,
}

impl Base {
    pub const fn radix(self) -> u32 {
        match self {
            Base::Binary => 2,
            Base::Decimal => 10,
            Base::Hex => 16,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Base::Binary => "binary",
            Base::Decimal => "decimal",
            Base::Hex => "hex",
        }
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a token cannot be read as a numeral.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumeralError {
    #[error("unknown base '{0}' (expected bin, dec or hex)")]
    UnknownBase(String),
    #[error("'{token}' is not a valid base-{radix} numeral")]
    InvalidDigits { token: String, radix: u32 },
}

impl FromStr for Base {
    type Err = NumeralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bin" | "binary" | "2" => Ok(Base::Binary),
            "dec" | "decimal" | "10" => Ok(Base::Decimal),
            "hex" | "hexadecimal" | "16" => Ok(Base::Hex),
            _ => Err(NumeralError::UnknownBase(s.to_string())),
        }
    }
}

/// A tagged numeral token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Numeral {
    /// `#n`: a resolved decimal integer.
    Immediate(i64),
    /// `&digits`: hexadecimal literal, not yet decoded.
    Hex(String),
    /// `Bdigits`: binary literal, not yet decoded.
    Bin(String),
    /// Plain text read in the declared base. Also used for register names
    /// and, when empty, for uninitialised memory cells.
    Bare(String),
}

impl Numeral {
    /// Parses a surface token. Only Immediates are resolved here; the other
    /// variants keep their digit run until they are decoded.
    pub fn parse(token: &str) -> Result<Self, NumeralError> {
        if let Some(digits) = token.strip_prefix(IMMEDIATE_MARKER) {
            return digits
                .parse::<i64>()
                .map(Numeral::Immediate)
                .map_err(|_| NumeralError::InvalidDigits {
                    token: token.to_string(),
                    radix: 10,
                });
        }
        if let Some(digits) = token.strip_prefix(HEX_MARKER) {
            return Ok(Numeral::Hex(digits.to_string()));
        }
        if let Some(digits) = token.strip_prefix(BIN_MARKER) {
            return Ok(Numeral::Bin(digits.to_string()));
        }
        Ok(Numeral::Bare(token.to_string()))
    }

    /// An uninitialised memory cell.
    pub fn empty() -> Self {
        Numeral::Bare(String::new())
    }

    /// Returns true for `#`, `&` and `B` tokens.
    pub fn is_literal(&self) -> bool {
        !matches!(self, Numeral::Bare(_))
    }

    /// Decodes the numeral to an integer, reading bare digits in `base`.
    pub fn decode(&self, base: Base) -> Result<i64, NumeralError> {
        match self {
            Numeral::Immediate(value) => Ok(*value),
            Numeral::Hex(digits) => parse_radix(digits, 16, self),
            Numeral::Bin(digits) => parse_radix(digits, 2, self),
            Numeral::Bare(text) => parse_radix(text, base.radix(), self),
        }
    }
}

fn parse_radix(digits: &str, radix: u32, token: &Numeral) -> Result<i64, NumeralError> {
    i64::from_str_radix(digits, radix).map_err(|_| NumeralError::InvalidDigits {
        token: token.to_string(),
        radix,
    })
}

impl FromStr for Numeral {
    type Err = NumeralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Numeral::parse(s)
    }
}

impl From<i64> for Numeral {
    fn from(value: i64) -> Self {
        Numeral::Immediate(value)
    }
}

impl fmt::Display for Numeral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Numeral::Immediate(value) => write!(f, "{IMMEDIATE_MARKER}{value}"),
            Numeral::Hex(digits) => write!(f, "{HEX_MARKER}{digits}"),
            Numeral::Bin(digits) => write!(f, "{BIN_MARKER}{digits}"),
            Numeral::Bare(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_immediate() {
        assert_eq!(Numeral::parse("#5").unwrap(), Numeral::Immediate(5));
        assert_eq!(Numeral::parse("#-12").unwrap(), Numeral::Immediate(-12));
        assert_eq!(Numeral::parse("#0").unwrap(), Numeral::Immediate(0));
    }

    #[test]
    fn parse_immediate_rejects_non_decimal() {
        assert!(matches!(
            Numeral::parse("#1F"),
            Err(NumeralError::InvalidDigits { radix: 10, .. })
        ));
        assert!(Numeral::parse("#").is_err());
        assert!(Numeral::parse("# 4").is_err());
    }

    #[test]
    fn parse_tagged_literals_keep_digits() {
        assert_eq!(Numeral::parse("&1F").unwrap(), Numeral::Hex("1F".into()));
        assert_eq!(Numeral::parse("B101").unwrap(), Numeral::Bin("101".into()));
        assert_eq!(Numeral::parse("1010").unwrap(), Numeral::Bare("1010".into()));
        assert_eq!(Numeral::parse("ACC").unwrap(), Numeral::Bare("ACC".into()));
        assert_eq!(Numeral::parse("").unwrap(), Numeral::empty());
    }

    #[test]
    fn literals_ignore_declared_base() {
        let hex = Numeral::Hex("1F".into());
        let bin = Numeral::Bin("101".into());
        for base in [Base::Binary, Base::Decimal, Base::Hex] {
            assert_eq!(hex.decode(base).unwrap(), 31);
            assert_eq!(bin.decode(base).unwrap(), 5);
        }
    }

    #[test]
    fn bare_follows_declared_base() {
        let bare = Numeral::Bare("1010".into());
        assert_eq!(bare.decode(Base::Binary).unwrap(), 10);
        assert_eq!(bare.decode(Base::Decimal).unwrap(), 1010);
        assert_eq!(bare.decode(Base::Hex).unwrap(), 0x1010);
    }

    #[test]
    fn decode_rejects_bad_digits() {
        assert!(Numeral::Bin("102".into()).decode(Base::Decimal).is_err());
        assert!(Numeral::Hex("XYZ".into()).decode(Base::Decimal).is_err());
        assert!(Numeral::Bare("12".into()).decode(Base::Binary).is_err());
        assert!(Numeral::empty().decode(Base::Decimal).is_err());
        assert!(Numeral::Bin(String::new()).decode(Base::Decimal).is_err());
    }

    #[test]
    fn display_restores_markers() {
        assert_eq!(Numeral::Immediate(-3).to_string(), "#-3");
        assert_eq!(Numeral::Hex("0A".into()).to_string(), "&0A");
        assert_eq!(Numeral::Bin("11".into()).to_string(), "B11");
        assert_eq!(Numeral::Bare("42".into()).to_string(), "42");
    }

    #[test]
    fn base_from_str() {
        assert_eq!("bin".parse::<Base>().unwrap(), Base::Binary);
        assert_eq!("HEX".parse::<Base>().unwrap(), Base::Hex);
        assert_eq!("10".parse::<Base>().unwrap(), Base::Decimal);
        assert!(matches!(
            "octal".parse::<Base>(),
            Err(NumeralError::UnknownBase(_))
        ));
    }

    proptest! {
        #[test]
        fn immediate_round_trip(n in any::<i64>()) {
            let text = format!("#{n}");
            let parsed = Numeral::parse(&text).unwrap();
            prop_assert_eq!(parsed.decode(Base::Binary).unwrap(), n);
            prop_assert_eq!(parsed.to_string(), text);
        }
    }
}
