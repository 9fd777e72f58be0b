pub mod catalog;
pub mod lookup;
pub mod luciphor;
pub mod mass;
pub mod modification;
pub mod psm;

use modification::InvalidModification;

#[derive(Debug)]
pub enum Error {
    /// Two differently named modifications resolve to the same rounded mass
    AmbiguousMass {
        mass: f64,
        first: String,
        second: String,
    },
    /// A delta mass token in an MS-GF+ peptide has no catalog entry
    UnknownDelta { token: String, peptide: String },
    /// A `Residue[mass]` token in a LuciPHOr2 peptide has no catalog entry
    UnknownResidueMass { key: String, peptide: String },
    UnknownResidue(char),
    InvalidModification(InvalidModification),
    InvalidTolerance(String),
    InvalidScore(String),
    Io(std::io::Error),
    Template(minijinja::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AmbiguousMass {
                mass,
                first,
                second,
            } => write!(
                f,
                "cannot have two modifications of the same mass but different names: {} and {} at {}",
                first, second, mass
            ),
            Self::UnknownDelta { token, peptide } => write!(
                f,
                "no modification with mass {} in catalog (peptide {})",
                token, peptide
            ),
            Self::UnknownResidueMass { key, peptide } => write!(
                f,
                "no variable modification matching {} in catalog (peptide {})",
                key, peptide
            ),
            Self::UnknownResidue(c) => write!(f, "unrecognized residue '{}'", c),
            Self::InvalidModification(e) => e.fmt(f),
            Self::InvalidTolerance(s) => write!(
                f,
                "invalid fragment tolerance type `{}`, expected `Da` or `ppm`",
                s
            ),
            Self::InvalidScore(s) => write!(f, "invalid score `{}`", s),
            Self::Io(e) => e.fmt(f),
            Self::Template(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(residual: std::io::Error) -> Self {
        Self::Io(residual)
    }
}

impl From<minijinja::Error> for Error {
    fn from(residual: minijinja::Error) -> Self {
        Self::Template(residual)
    }
}

impl From<InvalidModification> for Error {
    fn from(residual: InvalidModification) -> Self {
        Self::InvalidModification(residual)
    }
}
