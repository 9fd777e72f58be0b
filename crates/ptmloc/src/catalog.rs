use std::path::Path;

use fnv::FnvHashMap;

use crate::mass::{format_mass, round_to};
use crate::modification::{CatalogEntry, ModificationDefinition};
use crate::Error;

/// Fixed modifications that leave a residue available to a variable
/// modification, keyed by the variable modification's name. Any other fixed
/// modification on the same residue blocks it.
const NON_BLOCKING: &[(&str, &[&str])] = &[(
    "GG",
    &["TMTpro", "TMT6plex", "iTRAQ8plex", "iTRAQ4plex"],
)];

/// Catalog entries that also satisfy a request for a differently named
/// modification: (catalog name, requested name), both lowercase.
/// TMT 10-plex reagents carry the same UniMod entry as TMT 6-plex.
const ALIASES: &[(&str, &str)] = &[("tmt6plex", "tmt10plex")];

pub fn non_blocking(variable_name: &str) -> &'static [&'static str] {
    NON_BLOCKING
        .iter()
        .find(|(name, _)| *name == variable_name)
        .map(|(_, fixed)| *fixed)
        .unwrap_or_default()
}

/// Find the requested name a catalog entry answers to, if any
fn requested_key(catalog_name: &str, requested: &[String]) -> Option<String> {
    let lower = catalog_name.to_lowercase();
    for (name, alias) in ALIASES {
        if lower == *name && requested.iter().any(|r| r == alias) {
            return Some(alias.to_string());
        }
    }
    requested.contains(&lower).then_some(lower)
}

/// The set of modifications used in a search, one definition per residue
#[derive(Clone, Debug, Default)]
pub struct ModificationCatalog {
    definitions: Vec<ModificationDefinition>,
    competing_residues: bool,
}

impl ModificationCatalog {
    /// Read an MS-GF+ mod file and keep the modifications named in
    /// `requested` (case-insensitive). Requests written as inline catalog rows
    /// are added as-is.
    pub fn load<P: AsRef<Path>, S: AsRef<str>>(path: P, requested: &[S]) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents, requested)
    }

    pub fn parse<S: AsRef<str>>(contents: &str, requested: &[S]) -> Result<Self, Error> {
        let keys = requested
            .iter()
            .map(|s| s.as_ref().to_lowercase())
            .collect::<Vec<_>>();

        let mut definitions = Vec::new();
        for line in contents.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty()
                || line.trim_start().starts_with('#')
                || line.contains("NumMods")
            {
                continue;
            }
            let entry = line.parse::<CatalogEntry>()?;
            if let Some(key) = requested_key(&entry.name, &keys) {
                definitions.extend(entry.definitions(&key));
            }
        }

        for request in requested.iter().map(|s| s.as_ref()) {
            if CatalogEntry::is_inline(request) {
                let entry = request.parse::<CatalogEntry>()?;
                let key = entry.name.to_lowercase();
                log::trace!("adding user-defined modification {}", entry.name);
                definitions.extend(entry.definitions(&key));
            }
        }

        Ok(Self::from_definitions(definitions))
    }

    /// Finalize a set of definitions: compute the adjusted mass of every
    /// variable modification.
    pub fn from_definitions(mut definitions: Vec<ModificationDefinition>) -> Self {
        let mut fixed: FnvHashMap<char, Vec<(String, f64)>> = FnvHashMap::default();
        for def in definitions.iter().filter(|d| !d.variable) {
            fixed
                .entry(def.residue)
                .or_default()
                .push((def.name.clone(), def.mass));
        }

        let mut competing_residues = false;
        for def in definitions.iter_mut().filter(|d| d.variable) {
            let unblocked = non_blocking(&def.name);
            let mut adjustment = 0.0_f64;
            if let Some(fixed) = fixed.get(&def.residue) {
                competing_residues = true;
                adjustment = fixed
                    .iter()
                    .filter(|(name, _)| !unblocked.contains(&name.as_str()))
                    .map(|(_, mass)| mass)
                    .sum::<f64>();
            }
            def.adjusted_mass = Some(round_to(def.mass - adjustment, 5));
        }

        Self {
            definitions,
            competing_residues,
        }
    }

    pub fn definitions(&self) -> &[ModificationDefinition] {
        &self.definitions
    }

    pub fn fixed(&self) -> impl Iterator<Item = &ModificationDefinition> {
        self.definitions.iter().filter(|d| !d.variable)
    }

    pub fn variable(&self) -> impl Iterator<Item = &ModificationDefinition> {
        self.definitions.iter().filter(|d| d.variable)
    }

    /// Does any variable modification share a residue with a fixed one?
    pub fn has_competing_residues(&self) -> bool {
        self.competing_residues
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Render an MS-GF+ mod file body using effective masses, so the search
    /// engine reports the same deltas the lookup tables expect.
    pub fn msgf_mod_lines(&self) -> Result<Vec<String>, Error> {
        let mut grouped: Vec<(f64, Vec<&ModificationDefinition>)> = Vec::new();
        for def in &self.definitions {
            let mass = def.effective_mass();
            match grouped.iter_mut().find(|(m, _)| *m == mass) {
                Some((_, group)) => {
                    if group[0].name != def.name {
                        return Err(Error::AmbiguousMass {
                            mass,
                            first: group[0].name.clone(),
                            second: def.name.clone(),
                        });
                    }
                    group.push(def);
                }
                None => grouped.push((mass, vec![def])),
            }
        }

        let mut lines = Vec::new();
        for (mass, group) in grouped {
            let mut residues: Vec<((bool, _), String)> = Vec::new();
            for def in group.iter() {
                let id = (def.variable, def.position);
                match residues.iter_mut().find(|(k, _)| *k == id) {
                    Some((_, r)) => r.push(def.residue),
                    None => residues.push((id, def.residue.to_string())),
                }
            }
            for ((variable, position), residues) in residues {
                let kind = if variable { "opt" } else { "fix" };
                lines.push(format!(
                    "{},{},{},{},{}",
                    format_mass(mass),
                    residues,
                    kind,
                    position,
                    group[0].name
                ));
            }
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::modification::Position;

    const MODS: &str = "\
# MS-GF+ modification file
NumMods=3

229.16293,K,fix,any,TMT6plex
229.16293,*,fix,N-term,TMT6plex
57.02146,C,fix,any,Carbamidomethyl
15.99491,M,opt,any,Oxidation
79.96633,STY,opt,any,Phospho
114.04293,K,opt,any,GG
42.01057,K,opt,any,Acetyl
0.98402,NQ,opt,any,Deamidated
";

    fn find<'a>(
        catalog: &'a ModificationCatalog,
        name: &str,
        residue: char,
    ) -> &'a ModificationDefinition {
        catalog
            .definitions()
            .iter()
            .find(|d| d.name == name && d.residue == residue)
            .unwrap()
    }

    #[test]
    fn requested_only() {
        let catalog = ModificationCatalog::parse(MODS, &["PHOSPHO", "Oxidation"]).unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.fixed().count(), 0);
        assert!(!catalog.has_competing_residues());
        assert_eq!(find(&catalog, "Phospho", 'T').name_key, "phospho");
    }

    #[test]
    fn aliased_entry() {
        let catalog = ModificationCatalog::parse(MODS, &["tmt10plex"]).unwrap();
        assert_eq!(catalog.len(), 2);
        let tmt = find(&catalog, "TMT6plex", 'K');
        assert_eq!(tmt.name_key, "tmt10plex");
        assert_eq!(tmt.adjusted_mass, None);

        let catalog = ModificationCatalog::parse(MODS, &["TMT6plex"]).unwrap();
        assert_eq!(find(&catalog, "TMT6plex", 'K').name_key, "tmt6plex");
    }

    #[test]
    fn inline_definitions() {
        let catalog =
            ModificationCatalog::parse(MODS, &["Phospho", "203.07937,ST,opt,any,HexNAc"]).unwrap();
        assert_eq!(catalog.len(), 5);
        let hexnac = find(&catalog, "HexNAc", 'S');
        assert_eq!(hexnac.name_key, "hexnac");
        assert_eq!(hexnac.adjusted_mass, Some(203.07937));
    }

    #[test]
    fn malformed_line() {
        let err = ModificationCatalog::parse("57.02146,C,fix,Carbamidomethyl\n", &["carbamidomethyl"])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidModification(_)));
    }

    #[test]
    fn adjusted_masses() {
        let catalog = ModificationCatalog::parse(
            MODS,
            &["tmt10plex", "GG", "Acetyl", "Oxidation", "Carbamidomethyl"],
        )
        .unwrap();
        assert!(catalog.has_competing_residues());

        // TMT does not block GG on lysine
        assert_eq!(find(&catalog, "GG", 'K').adjusted_mass, Some(114.04293));
        // but does block acetylation
        assert_eq!(
            find(&catalog, "Acetyl", 'K').adjusted_mass,
            Some(round_to(42.01057 - 229.16293, 5))
        );
        assert_eq!(find(&catalog, "Acetyl", 'K').effective_mass(), -187.15236);
        assert_eq!(find(&catalog, "Oxidation", 'M').adjusted_mass, Some(15.99491));
        assert_eq!(find(&catalog, "Carbamidomethyl", 'C').adjusted_mass, None);
    }

    #[test]
    fn blocking_masses_add_up() {
        let defs = [
            "10.0,K,fix,any,Heavy",
            "5.5,K,fix,any,Label",
            "100.25,K,opt,any,Big",
            "114.04293,K,opt,any,GG",
            "1.0,K,fix,any,TMTpro",
        ]
        .iter()
        .flat_map(|line| {
            let entry = line.parse::<CatalogEntry>().unwrap();
            let key = entry.name.to_lowercase();
            entry.definitions(&key).collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
        let catalog = ModificationCatalog::from_definitions(defs);
        assert_eq!(find(&catalog, "Big", 'K').adjusted_mass, Some(83.75));
        assert_eq!(find(&catalog, "GG", 'K').adjusted_mass, Some(98.54293));
    }

    #[test]
    fn msgf_lines() {
        let catalog = ModificationCatalog::parse(MODS, &["tmt10plex", "Phospho", "Acetyl"]).unwrap();
        let lines = catalog.msgf_mod_lines().unwrap();
        assert_eq!(
            lines,
            vec![
                "229.16293,K,fix,any,TMT6plex",
                "229.16293,*,fix,N-term,TMT6plex",
                "79.96633,STY,opt,any,Phospho",
                "-187.15236,K,opt,any,Acetyl",
            ]
        );
        assert_eq!(find(&catalog, "Phospho", 'S').position, Position::Any);
    }

    #[test]
    fn ambiguous_mod_lines() {
        let catalog = ModificationCatalog::parse(
            "79.96633,S,opt,any,Phospho\n79.96633,T,opt,any,Sulfo\n",
            &["phospho", "sulfo"],
        )
        .unwrap();
        assert!(matches!(
            catalog.msgf_mod_lines(),
            Err(Error::AmbiguousMass { .. })
        ));
    }
}
