//! Parsing of Kubernetes quantities such as `2G` or `512Mi`.
//!
//! `k8s-openapi` only carries quantities as opaque strings. Image cache sizes have to be compared
//! (a cache volume can grow but never shrink), so they are parsed into a number and a suffix here.

use std::{cmp::Ordering, fmt::Display, num::ParseFloatError, str::FromStr};

use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use snafu::{ResultExt as _, Snafu, ensure};

#[derive(Debug, Eq, PartialEq, Snafu)]
pub enum ParseQuantityError {
    #[snafu(display("input is either empty or contains non-ascii characters"))]
    InvalidFormat,

    #[snafu(display("failed to parse floating point number"))]
    InvalidFloat { source: ParseFloatError },

    #[snafu(display("failed to parse suffix"))]
    InvalidSuffix { source: ParseSuffixError },
}

/// A parsed quantity, kept in the notation it was written in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quantity {
    value: f64,
    suffix: Option<Suffix>,
}

impl FromStr for Quantity {
    type Err = ParseQuantityError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        ensure!(!input.is_empty() && input.is_ascii(), InvalidFormatSnafu);

        match input.find(|c: char| c != '.' && c != '-' && c != '+' && !c.is_ascii_digit()) {
            Some(suffix_index) => {
                let (value, suffix) = input.split_at(suffix_index);
                let value = f64::from_str(value).context(InvalidFloatSnafu)?;
                let suffix = Suffix::from_str(suffix).context(InvalidSuffixSnafu)?;

                Ok(Self {
                    value,
                    suffix: Some(suffix),
                })
            }
            None => {
                let value = f64::from_str(input).context(InvalidFloatSnafu)?;
                Ok(Self { value, suffix: None })
            }
        }
    }
}

impl Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.suffix {
            Some(suffix) => write!(f, "{value}{suffix}", value = self.value),
            None => write!(f, "{value}", value = self.value),
        }
    }
}

impl From<Quantity> for K8sQuantity {
    fn from(value: Quantity) -> Self {
        K8sQuantity(value.to_string())
    }
}

impl TryFrom<&K8sQuantity> for Quantity {
    type Error = ParseQuantityError;

    fn try_from(value: &K8sQuantity) -> Result<Self, Self::Error> {
        Self::from_str(&value.0)
    }
}

impl PartialOrd for Quantity {
    /// Compares the amounts, regardless of the notation. `1Ki` is greater than `1k`.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.to_base().partial_cmp(&other.to_base())
    }
}

impl Quantity {
    /// The amount without suffix, e.g. `2000` for `2k`.
    pub fn to_base(&self) -> f64 {
        match &self.suffix {
            Some(suffix) => self.value * (suffix.base() as f64).powf(suffix.exponent()),
            None => self.value,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.to_base() > 0.0
    }
}

#[derive(Debug, Eq, PartialEq, Snafu)]
#[snafu(display("failed to parse {input:?} as quantity suffix"))]
pub struct ParseSuffixError {
    input: String,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Suffix {
    DecimalByteMultiple(DecimalByteMultiple),
    BinaryByteMultiple(BinaryByteMultiple),
    DecimalExponent(DecimalExponent),
}

impl FromStr for Suffix {
    type Err = ParseSuffixError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if let Ok(binary) = BinaryByteMultiple::from_str(input) {
            return Ok(Self::BinaryByteMultiple(binary));
        }

        if let Ok(decimal) = DecimalByteMultiple::from_str(input) {
            return Ok(Self::DecimalByteMultiple(decimal));
        }

        if let Some(exponent) = input.strip_prefix(['e', 'E'])
            && let Ok(exponent) = f64::from_str(exponent)
            && exponent.is_finite()
        {
            return Ok(Self::DecimalExponent(DecimalExponent(exponent)));
        }

        ParseSuffixSnafu { input }.fail()
    }
}

impl Display for Suffix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DecimalByteMultiple(decimal) => write!(f, "{decimal}"),
            Self::BinaryByteMultiple(binary) => write!(f, "{binary}"),
            Self::DecimalExponent(exponent) => write!(f, "e{}", exponent.0),
        }
    }
}

impl Suffix {
    pub fn exponent(&self) -> f64 {
        match self {
            Self::DecimalByteMultiple(s) => s.exponent(),
            Self::BinaryByteMultiple(s) => s.exponent(),
            Self::DecimalExponent(s) => s.exponent(),
        }
    }

    pub fn base(&self) -> usize {
        match self {
            Self::DecimalByteMultiple(_) => DecimalByteMultiple::BASE,
            Self::BinaryByteMultiple(_) => BinaryByteMultiple::BASE,
            Self::DecimalExponent(_) => DecimalExponent::BASE,
        }
    }
}

/// Gives a suffix multiple its base and the exponent for each unit variant.
pub trait SuffixMultiple {
    const BASE: usize;

    fn exponent(&self) -> f64;
}

/// Byte multiples based on powers of 2, as adopted by Kubernetes (`Ki`, `Mi`, ..., `Ei`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display, strum::EnumString)]
pub enum BinaryByteMultiple {
    #[strum(serialize = "Ki")]
    Kibi,

    #[strum(serialize = "Mi")]
    Mebi,

    #[strum(serialize = "Gi")]
    Gibi,

    #[strum(serialize = "Ti")]
    Tebi,

    #[strum(serialize = "Pi")]
    Pebi,

    #[strum(serialize = "Ei")]
    Exbi,
}

impl SuffixMultiple for BinaryByteMultiple {
    const BASE: usize = 2;

    fn exponent(&self) -> f64 {
        match self {
            Self::Kibi => 10.0,
            Self::Mebi => 20.0,
            Self::Gibi => 30.0,
            Self::Tebi => 40.0,
            Self::Pebi => 50.0,
            Self::Exbi => 60.0,
        }
    }
}

/// Byte multiples based on powers of 10. Kubernetes uses `k` for kilo and adds `m` for milli.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display, strum::EnumString)]
pub enum DecimalByteMultiple {
    #[strum(serialize = "m")]
    Milli,

    #[strum(serialize = "k")]
    Kilo,

    #[strum(serialize = "M")]
    Mega,

    #[strum(serialize = "G")]
    Giga,

    #[strum(serialize = "T")]
    Tera,

    #[strum(serialize = "P")]
    Peta,

    #[strum(serialize = "E")]
    Exa,
}

impl SuffixMultiple for DecimalByteMultiple {
    const BASE: usize = 10;

    fn exponent(&self) -> f64 {
        match self {
            Self::Milli => -3.0,
            Self::Kilo => 3.0,
            Self::Mega => 6.0,
            Self::Giga => 9.0,
            Self::Tera => 12.0,
            Self::Peta => 15.0,
            Self::Exa => 18.0,
        }
    }
}

/// Scientific notation, e.g. the `e3` in `1.5e3`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecimalExponent(f64);

impl SuffixMultiple for DecimalExponent {
    const BASE: usize = 10;

    fn exponent(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("2G", 2e9)]
    #[case("1.5Gi", 1.5 * 1024.0 * 1024.0 * 1024.0)]
    #[case("512Mi", 512.0 * 1024.0 * 1024.0)]
    #[case("100", 100.0)]
    #[case("1e3", 1000.0)]
    #[case("500m", 0.5)]
    fn parses_to_base(#[case] input: &str, #[case] expected: f64) {
        let parsed = Quantity::from_str(input).expect("valid quantity");

        assert!((parsed.to_base() - expected).abs() <= expected * 1e-9);
    }

    #[rstest]
    #[case("")]
    #[case("G")]
    #[case("2GB")]
    #[case("two")]
    #[case("2Xi")]
    #[case("1einf")]
    #[case("1e-infinity")]
    #[case("1eNaN")]
    fn rejects_invalid(#[case] input: &str) {
        assert!(Quantity::from_str(input).is_err());
    }

    #[rstest]
    #[case("2G", "3G", true)]
    #[case("2G", "2000M", false)]
    #[case("1G", "1Gi", true)]
    #[case("2Gi", "2G", false)]
    fn compares_across_suffixes(#[case] lower: &str, #[case] higher: &str, #[case] strict: bool) {
        let lower = Quantity::from_str(lower).expect("valid quantity");
        let higher = Quantity::from_str(higher).expect("valid quantity");

        assert_eq!(lower < higher, strict);
        assert!(higher >= lower || !strict);
    }

    #[rstest]
    #[case("0", false)]
    #[case("0Gi", false)]
    #[case("-1G", false)]
    #[case("1G", true)]
    fn positivity(#[case] input: &str, #[case] positive: bool) {
        let parsed = Quantity::from_str(input).expect("valid quantity");

        assert_eq!(parsed.is_positive(), positive);
    }

    #[rstest]
    #[case("256Ki")]
    #[case("1.5G")]
    #[case("8")]
    fn displays_in_original_notation(#[case] input: &str) {
        let parsed = Quantity::from_str(input).expect("valid quantity");

        assert_eq!(parsed.to_string(), input);
    }
}
