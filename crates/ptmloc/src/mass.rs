use serde::{Deserialize, Serialize};

use crate::Error;

/// Phosphoric acid, the neutral loss of phosphorylated residues
pub const H3PO4: f64 = 97.97690;

/// Monoisotopic residue mass (ExPASy). Terminal sites (`[`, `]`) and the
/// any-residue wildcard `*` carry no residue mass.
pub fn residue_mass(residue: char) -> Option<f64> {
    let mass = match residue {
        'A' => 71.03711,
        'R' => 156.10111,
        'N' => 114.04293,
        'D' => 115.02694,
        'C' => 103.00919,
        'E' => 129.04259,
        'Q' => 128.05858,
        'G' => 57.02146,
        'H' => 137.05891,
        'I' => 113.08406,
        'L' => 113.08406,
        'K' => 128.09496,
        'M' => 131.04049,
        'F' => 147.06841,
        'P' => 97.05276,
        'S' => 87.03203,
        'T' => 101.04768,
        'W' => 186.07931,
        'Y' => 163.06333,
        'V' => 99.06841,
        'U' => 150.953636,
        'O' => 237.147727,
        '[' | ']' | '*' => 0.0,
        _ => return None,
    };
    Some(mass)
}

/// Round to `digits` decimal places. Ties are broken to even on the exact
/// binary value, so `round_to(x, 5)` agrees with how the search engine and
/// the localization tool print their masses.
pub fn round_to(value: f64, digits: usize) -> f64 {
    format!("{:.*}", digits, value).parse().unwrap_or(value)
}

/// Rounded residue mass as reported in LuciPHOr2 peptides, e.g. `S[167]`
pub fn nominal(value: f64) -> i64 {
    value.round_ties_even() as i64
}

/// Delta mass in thousandths of a Dalton, the precision MS-GF+ reports
pub fn milli_dalton(value: f64) -> i64 {
    (round_to(value, 3) * 1000.0).round() as i64
}

/// Shortest decimal representation that parses back to the same value
pub fn format_mass(value: f64) -> String {
    ryu::Buffer::new().format(value).to_owned()
}

#[derive(Copy, Clone, Serialize, Deserialize, Debug, PartialEq, PartialOrd)]
#[serde(rename_all = "lowercase")]
pub enum Tolerance {
    Da(f64),
    Ppm(f64),
}

impl Tolerance {
    /// Build a fragment tolerance from a value and its unit designator,
    /// `Da` or `ppm`.
    pub fn new(value: f64, kind: &str) -> Result<Self, Error> {
        match kind {
            "Da" => Ok(Tolerance::Da(value)),
            "ppm" => Ok(Tolerance::Ppm(value)),
            _ => Err(Error::InvalidTolerance(kind.into())),
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            Tolerance::Da(v) | Tolerance::Ppm(v) => *v,
        }
    }

    /// LuciPHOr2 encodes absolute tolerances as 0, relative ones as 1
    pub fn kind_code(&self) -> u8 {
        match self {
            Tolerance::Da(_) => 0,
            Tolerance::Ppm(_) => 1,
        }
    }
}
