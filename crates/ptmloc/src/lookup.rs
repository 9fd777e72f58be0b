use fnv::FnvHashMap;

use crate::catalog::ModificationCatalog;
use crate::mass::{milli_dalton, nominal, residue_mass};
use crate::modification::ModificationDefinition;
use crate::Error;

/// Resolves MS-GF+ delta masses, which are printed with three decimals
#[derive(Clone, Debug, Default)]
pub struct MsgfLookup {
    masses: FnvHashMap<i64, Vec<ModificationDefinition>>,
}

impl MsgfLookup {
    /// Index every definition in the catalog by its rounded effective mass.
    /// Definitions sharing a rounded mass must share a name.
    pub fn new(catalog: &ModificationCatalog) -> Result<Self, Error> {
        let mut masses: FnvHashMap<i64, Vec<ModificationDefinition>> = FnvHashMap::default();
        for def in catalog.definitions() {
            let key = milli_dalton(def.effective_mass());
            let group = masses.entry(key).or_default();
            if let Some(first) = group.first() {
                if first.name != def.name {
                    return Err(Error::AmbiguousMass {
                        mass: key as f64 / 1000.0,
                        first: first.name.clone(),
                        second: def.name.clone(),
                    });
                }
            }
            group.push(def.clone());
        }
        Ok(Self { masses })
    }

    /// First definition recorded at this delta mass. All definitions at a
    /// rounded mass share a name, so any of them identifies the modification.
    pub fn get(&self, delta: f64) -> Option<&ModificationDefinition> {
        self.masses
            .get(&milli_dalton(delta))
            .and_then(|group| group.first())
    }

    pub fn len(&self) -> usize {
        self.masses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masses.is_empty()
    }
}

/// Resolves LuciPHOr2 `Residue[mass]` tokens, where the mass is the nominal
/// mass of residue plus modification
#[derive(Clone, Debug, Default)]
pub struct LuciphorLookup {
    residues: FnvHashMap<(char, i64), ModificationDefinition>,
}

impl LuciphorLookup {
    /// Index the variable modifications of the catalog. Terminal modifications
    /// are keyed by `[` or `]` with no residue mass.
    pub fn new(catalog: &ModificationCatalog) -> Result<Self, Error> {
        let mut residues = FnvHashMap::default();
        for def in catalog.variable() {
            let site = def.site();
            let base = residue_mass(site).ok_or(Error::UnknownResidue(site))?;
            let key = (site, nominal(base + def.effective_mass()));
            if let Some(previous) = residues.insert(key, def.clone()) {
                if previous.name != def.name {
                    log::warn!(
                        "{}{} resolves to both {} and {}, using {}",
                        key.0,
                        key.1,
                        previous.name,
                        def.name,
                        def.name
                    );
                }
            }
        }
        Ok(Self { residues })
    }

    pub fn get(&self, residue: char, mass: i64) -> Option<&ModificationDefinition> {
        self.residues.get(&(residue, mass))
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }
}
