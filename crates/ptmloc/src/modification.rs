use std::{fmt::Display, str::FromStr};

use crate::mass::format_mass;

/// Where on a peptide a modification may sit, as written in MS-GF+ mod files
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Position {
    Any,
    NTerm,
    CTerm,
    ProteinNTerm,
    ProteinCTerm,
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Position::Any => "any",
            Position::NTerm => "N-term",
            Position::CTerm => "C-term",
            Position::ProteinNTerm => "Prot-N-term",
            Position::ProteinCTerm => "Prot-C-term",
        })
    }
}

impl FromStr for Position {
    type Err = InvalidModification;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "any" => Ok(Position::Any),
            "n-term" => Ok(Position::NTerm),
            "c-term" => Ok(Position::CTerm),
            "prot-n-term" => Ok(Position::ProteinNTerm),
            "prot-c-term" => Ok(Position::ProteinCTerm),
            _ => Err(InvalidModification::Position(s.into())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InvalidModification {
    FieldCount(String),
    Mass(String),
    Empty,
    Kind(String),
    Position(String),
}

impl Display for InvalidModification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidModification::FieldCount(s) => write!(
                f,
                "invalid modification line `{}`: expected mass,residues,fix|opt,position,name",
                s
            ),
            InvalidModification::Mass(s) => write!(f, "invalid modification mass `{}`", s),
            InvalidModification::Empty => f.write_str("modification applies to no residues"),
            InvalidModification::Kind(s) => {
                write!(f, "invalid modification type `{}`, expected fix or opt", s)
            }
            InvalidModification::Position(s) => {
                write!(f, "invalid modification position `{}`", s)
            }
        }
    }
}

impl std::error::Error for InvalidModification {}

/// A single row of an MS-GF+ mod file: `mass,residues,fix|opt,position,name`.
/// The same format is accepted for ad-hoc modifications given on the command line.
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogEntry {
    pub mass: f64,
    pub residues: Vec<char>,
    pub variable: bool,
    pub position: Position,
    pub name: String,
}

impl CatalogEntry {
    /// Does `s` look like an inline catalog row rather than a modification name?
    pub fn is_inline(s: &str) -> bool {
        s.split(',').count() == 5
    }

    /// One definition per residue this entry applies to
    pub fn definitions<'a>(
        &'a self,
        name_key: &'a str,
    ) -> impl Iterator<Item = ModificationDefinition> + 'a {
        self.residues.iter().map(move |&residue| ModificationDefinition {
            name: self.name.clone(),
            name_key: name_key.to_string(),
            mass: self.mass,
            residue,
            variable: self.variable,
            position: self.position,
            adjusted_mass: None,
        })
    }
}

impl FromStr for CatalogEntry {
    type Err = InvalidModification;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Trailing comments are allowed in MS-GF+ mod files
        let line = s.split('#').next().unwrap_or_default();
        let fields = line.split(',').map(str::trim).collect::<Vec<_>>();
        let [mass, residues, kind, position, name] = fields[..] else {
            return Err(InvalidModification::FieldCount(s.into()));
        };

        let mass = mass
            .parse::<f64>()
            .map_err(|_| InvalidModification::Mass(mass.into()))?;

        // Residues form a set, keep first occurrence order
        let mut unique = Vec::with_capacity(residues.len());
        for residue in residues.chars() {
            if !unique.contains(&residue) {
                unique.push(residue);
            }
        }
        if unique.is_empty() {
            return Err(InvalidModification::Empty);
        }

        let variable = match kind.to_ascii_lowercase().as_str() {
            "opt" => true,
            "fix" => false,
            _ => return Err(InvalidModification::Kind(kind.into())),
        };

        Ok(CatalogEntry {
            mass,
            residues: unique,
            variable,
            position: position.parse()?,
            name: name.into(),
        })
    }
}

/// A modification of one residue type, as requested for a search
#[derive(Clone, Debug, PartialEq)]
pub struct ModificationDefinition {
    /// Name as written in the catalog (UniMod naming)
    pub name: String,
    /// Lowercased name the modification was requested by, which can differ
    /// from `name` for aliased catalog entries (e.g. `tmt10plex` for `TMT6plex`)
    pub name_key: String,
    pub mass: f64,
    pub residue: char,
    pub variable: bool,
    pub position: Position,
    /// Delta mass once competing fixed modifications are accounted for. Only
    /// variable modifications carry one after catalog finalization.
    pub adjusted_mass: Option<f64>,
}

impl ModificationDefinition {
    pub fn effective_mass(&self) -> f64 {
        self.adjusted_mass.unwrap_or(self.mass)
    }

    /// LuciPHOr2 site token: `[` and `]` for terminal modifications
    pub fn site(&self) -> char {
        match self.position {
            Position::NTerm | Position::ProteinNTerm => '[',
            Position::CTerm | Position::ProteinCTerm => ']',
            Position::Any => self.residue,
        }
    }

    /// Modification line for the LuciPHOr2 configuration, e.g. `S 79.96633`
    pub fn luciphor_line(&self) -> String {
        format!("{} {}", self.site(), format_mass(self.effective_mass()))
    }
}
