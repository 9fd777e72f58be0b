use std::path::Path;
use std::sync::OnceLock;

use fnv::FnvHashSet;
use regex::{Captures, Regex};

use crate::lookup::{LuciphorLookup, MsgfLookup};
use crate::mass::{format_mass, residue_mass};
use crate::modification::{CatalogEntry, ModificationDefinition};
use crate::Error;

/// Site index LuciPHOr2 uses for the protein N-terminus
pub const PROTEIN_N_TERM: i32 = -100;

fn msgf_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Z])?([0-9.+\-]+)").expect("valid regex"))
}

fn msgf_delta() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[+\-][0-9.]+").expect("valid regex"))
}

fn luciphor_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Z])?\[([0-9]+)\]").expect("valid regex"))
}

fn luciphor_residue() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Z])\[[0-9]+\]").expect("valid regex"))
}

/// How a modification takes part in localization
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModificationKind {
    Fixed,
    /// Variable modification whose site is scored
    Labile,
    /// Variable modification reported, but not scored
    Stable,
    Variable,
}

/// Case-insensitive sets of labile and stable modification names
#[derive(Clone, Debug, Default)]
pub struct PtmClasses {
    labile: FnvHashSet<String>,
    stable: FnvHashSet<String>,
}

impl PtmClasses {
    /// Names may also be given as inline catalog rows, in which case the
    /// modification name is the last field
    pub fn new<S: AsRef<str>>(labile: &[S], stable: &[S]) -> Self {
        fn keys<S: AsRef<str>>(names: &[S]) -> FnvHashSet<String> {
            names
                .iter()
                .map(|s| {
                    let s = s.as_ref();
                    match CatalogEntry::is_inline(s) {
                        true => s.rsplit(',').next().unwrap_or(s).trim().to_lowercase(),
                        false => s.to_lowercase(),
                    }
                })
                .collect()
        }
        Self {
            labile: keys(labile),
            stable: keys(stable),
        }
    }

    pub fn is_labile(&self, name_key: &str) -> bool {
        self.labile.contains(name_key)
    }

    pub fn classify(&self, def: &ModificationDefinition) -> ModificationKind {
        if !def.variable {
            ModificationKind::Fixed
        } else if self.labile.contains(&def.name_key) {
            ModificationKind::Labile
        } else if self.stable.contains(&def.name_key) {
            ModificationKind::Stable
        } else {
            ModificationKind::Variable
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModificationSite {
    /// Modified residue, `[` for the N-terminus
    pub residue: char,
    /// 0-based index into the bare sequence, or [`PROTEIN_N_TERM`]
    pub position: i32,
}

impl ModificationSite {
    pub fn protein_n_term() -> Self {
        Self {
            residue: '[',
            position: PROTEIN_N_TERM,
        }
    }

    /// Site on the last residue of a partially built bare sequence
    fn last_residue(sequence: &str) -> Self {
        match sequence.chars().last() {
            Some(residue) => Self {
                residue,
                position: sequence.chars().count() as i32 - 1,
            },
            None => Self::protein_n_term(),
        }
    }
}

/// A modification observed on a peptide, copied out of its definition
#[derive(Clone, Debug, PartialEq)]
pub struct ObservedModification {
    pub site: ModificationSite,
    pub kind: ModificationKind,
    pub mass: f64,
    pub name: String,
    pub name_key: String,
    pub adjusted_mass: Option<f64>,
}

impl ObservedModification {
    pub fn new(
        site: ModificationSite,
        kind: ModificationKind,
        def: &ModificationDefinition,
    ) -> Self {
        Self {
            site,
            kind,
            mass: def.mass,
            name: def.name.clone(),
            name_key: def.name_key.clone(),
            adjusted_mass: def.adjusted_mass,
        }
    }

    pub fn effective_mass(&self) -> f64 {
        self.adjusted_mass.unwrap_or(self.mass)
    }
}

/// One peptide-spectrum match, in either tool's notation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PeptideRecord {
    /// Unmodified amino acid sequence
    pub sequence: String,
    pub modifications: Vec<ObservedModification>,
    pub top_score: Option<f64>,
    pub top_flr: Option<f64>,
    /// LuciPHOr2 spectrum identifier
    pub spec_id: String,
    /// Predicted peptide with modified residues in lowercase, the format of
    /// LuciPHOr2 permutation scores
    pub score_permutation: String,
    /// Site groups of alternative localizations, e.g. `S3:12.5,T5:12.5`
    pub alternatives: Vec<String>,
}

impl PeptideRecord {
    /// Parse an MS-GF+ peptide, e.g. `+229.163AS+79.966PEK+229.163`. Deltas
    /// without a preceding residue belong to the protein N-terminus.
    pub fn from_msgf(
        peptide: &str,
        lookup: &MsgfLookup,
        classes: &PtmClasses,
    ) -> Result<Self, Error> {
        let mut sequence = String::with_capacity(peptide.len());
        let mut modifications = Vec::new();
        let mut start = 0;

        for caps in msgf_token().captures_iter(peptide) {
            let (Some(token), Some(deltas)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let site = match caps.get(1) {
                Some(residue) => {
                    sequence.push_str(&peptide[start..residue.end()]);
                    ModificationSite::last_residue(&sequence)
                }
                None => ModificationSite::protein_n_term(),
            };
            start = token.end();

            for delta in msgf_delta().find_iter(deltas.as_str()) {
                let def = delta
                    .as_str()
                    .parse::<f64>()
                    .ok()
                    .and_then(|mass| lookup.get(mass))
                    .ok_or_else(|| Error::UnknownDelta {
                        token: delta.as_str().into(),
                        peptide: peptide.into(),
                    })?;
                let kind = classes.classify(def);
                modifications.push(ObservedModification::new(site, kind, def));
            }
        }
        sequence.push_str(&peptide[start..]);

        Ok(Self {
            sequence,
            modifications,
            ..Default::default()
        })
    }

    /// Parse the predicted peptide of a LuciPHOr2 result, e.g. `AS[167]PEK`.
    /// Only labile modifications are recorded, the others had a fixed site
    /// in the input already.
    pub fn from_luciphor(
        spec_id: &str,
        peptide: &str,
        lookup: &LuciphorLookup,
        classes: &PtmClasses,
    ) -> Result<Self, Error> {
        let mut sequence = String::with_capacity(peptide.len());
        let mut modifications = Vec::new();
        let mut start = 0;

        for caps in luciphor_token().captures_iter(peptide) {
            let (Some(token), Some(mass)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let residue = match caps.get(1) {
                Some(residue) => {
                    sequence.push_str(&peptide[start..residue.end()]);
                    residue.as_str().chars().next().unwrap_or('[')
                }
                None => '[',
            };
            start = token.end();

            let key = format!("{}{}", residue, mass.as_str());
            let def = mass
                .as_str()
                .parse::<i64>()
                .ok()
                .and_then(|mass| lookup.get(residue, mass))
                .ok_or_else(|| Error::UnknownResidueMass {
                    key,
                    peptide: peptide.into(),
                })?;
            if classes.is_labile(&def.name_key) {
                let site = ModificationSite::last_residue(&sequence);
                let kind = classes.classify(def);
                modifications.push(ObservedModification::new(site, kind, def));
            }
        }
        sequence.push_str(&peptide[start..]);

        let score_permutation = luciphor_residue()
            .replace_all(peptide, |caps: &Captures| caps[1].to_lowercase())
            .into_owned();

        Ok(Self {
            sequence,
            modifications,
            spec_id: spec_id.into(),
            score_permutation,
            ..Default::default()
        })
    }

    pub fn with_scores(mut self, score: f64, flr: f64) -> Self {
        self.top_score = Some(score);
        self.top_flr = Some(flr);
        self
    }

    pub fn has_labile(&self) -> bool {
        self.modifications
            .iter()
            .any(|m| m.kind == ModificationKind::Labile)
    }

    pub fn has_stable(&self) -> bool {
        self.modifications
            .iter()
            .any(|m| m.kind == ModificationKind::Stable)
    }

    /// LuciPHOr2 `modSites` column: `site=residue mass` for every modification
    /// that is not fixed
    pub fn luciphor_input_sites(&self) -> Result<String, Error> {
        let mut sites = Vec::with_capacity(self.modifications.len());
        for m in &self.modifications {
            if m.kind == ModificationKind::Fixed {
                continue;
            }
            let base = residue_mass(m.site.residue)
                .ok_or(Error::UnknownResidue(m.site.residue))?;
            sites.push(format!(
                "{}={}",
                m.site.position,
                format_mass(base + m.effective_mass())
            ));
        }
        Ok(sites.join(","))
    }

    /// Record an alternative localization if `permutation` differs from the
    /// predicted one and scores above `min_score`. Returns whether it was kept.
    pub fn collect_alternative(
        &mut self,
        permutation: &str,
        score: &str,
        min_score: f64,
    ) -> Result<bool, Error> {
        if permutation == self.score_permutation {
            return Ok(false);
        }
        let value = score
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::InvalidScore(score.into()))?;
        // NaN never exceeds the threshold
        if value.is_nan() || value <= min_score {
            return Ok(false);
        }

        let group = permutation
            .char_indices()
            .filter(|(_, c)| c.is_ascii_lowercase())
            .map(|(ix, c)| format!("{}{}:{}", c, ix + 1, score.trim()))
            .collect::<Vec<_>>()
            .join(",")
            .to_uppercase();
        self.alternatives.push(group);
        Ok(true)
    }

    pub fn format_alternatives(&self) -> String {
        match self.alternatives.is_empty() {
            true => "NA".into(),
            false => self.alternatives.join(";"),
        }
    }

    /// Copy over modifications of the same spectrum from another record,
    /// unless a modification of that name is already present
    pub fn merge_modifications(&mut self, other: &PeptideRecord) {
        let existing = self
            .modifications
            .iter()
            .map(|m| m.name.clone())
            .collect::<FnvHashSet<_>>();
        self.modifications.extend(
            other
                .modifications
                .iter()
                .filter(|m| !existing.contains(&m.name))
                .cloned(),
        );
    }

    /// Labile and stable sites grouped by modification, e.g.
    /// `Phospho:S2,T5_Oxidation:M8`
    pub fn top_ptm_sites(&self) -> String {
        let mut groups: Vec<(&str, Vec<String>)> = Vec::new();
        for m in self.modifications.iter().filter(|m| {
            matches!(m.kind, ModificationKind::Labile | ModificationKind::Stable)
        }) {
            let site = format!("{}{}", m.site.residue, m.site.position + 1);
            match groups.iter_mut().find(|(name, _)| *name == m.name) {
                Some((_, sites)) => sites.push(site),
                None => groups.push((m.name.as_str(), vec![site])),
            }
        }
        if groups.is_empty() {
            return "NA".into();
        }
        groups
            .into_iter()
            .map(|(name, sites)| format!("{}:{}", name, sites.join(",")))
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// LuciPHOr2 spectrum identifier: `{file stem}.{scan}.{scan}.{charge}`
pub fn spectrum_id(src_file: &str, scan: &str, charge: &str) -> String {
    let stem = Path::new(src_file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(src_file);
    format!("{}.{}.{}.{}", stem, scan, scan, charge)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::catalog::ModificationCatalog;

    const MODS: &str = "\
229.16293,K,fix,any,TMT6plex
229.16293,*,fix,N-term,TMT6plex
57.02146,C,fix,any,Carbamidomethyl
15.99491,M,opt,any,Oxidation
79.96633,STY,opt,any,Phospho
114.04293,K,opt,any,GG
";

    fn setup() -> (ModificationCatalog, PtmClasses) {
        let labile = ["Phospho"];
        let stable = ["tmt10plex", "Carbamidomethyl", "GG"];
        let catalog = ModificationCatalog::parse(
            MODS,
            &labile.iter().chain(stable.iter()).collect::<Vec<_>>(),
        )
        .unwrap();
        (catalog, PtmClasses::new(&labile, &stable))
    }

    #[test]
    fn classify() {
        let (catalog, classes) = setup();
        let kinds = catalog
            .definitions()
            .iter()
            .map(|d| (d.name.as_str(), classes.classify(d)))
            .collect::<Vec<_>>();
        assert!(kinds.contains(&("TMT6plex", ModificationKind::Fixed)));
        assert!(kinds.contains(&("Phospho", ModificationKind::Labile)));
        assert!(kinds.contains(&("GG", ModificationKind::Stable)));

        let classes = PtmClasses::new(&["79.96633,STY,opt,any,Phospho"], &[]);
        assert!(classes.is_labile("phospho"));
    }

    #[test]
    fn parse_msgf() {
        let (catalog, classes) = setup();
        let lookup = MsgfLookup::new(&catalog).unwrap();
        let psm =
            PeptideRecord::from_msgf("+229.163TS+79.966PEK+229.163", &lookup, &classes).unwrap();
        assert_eq!(psm.sequence, "TSPEK");
        let sites = psm
            .modifications
            .iter()
            .map(|m| (m.site.residue, m.site.position, m.kind))
            .collect::<Vec<_>>();
        assert_eq!(
            sites,
            vec![
                ('[', PROTEIN_N_TERM, ModificationKind::Fixed),
                ('S', 1, ModificationKind::Labile),
                ('K', 4, ModificationKind::Fixed),
            ]
        );
        assert!(psm.has_labile());
        assert!(!psm.has_stable());
        assert_eq!(psm.luciphor_input_sites().unwrap(), "1=166.99836");
    }

    #[test]
    fn parse_msgf_stacked_deltas() {
        let (catalog, classes) = setup();
        let lookup = MsgfLookup::new(&catalog).unwrap();
        let psm =
            PeptideRecord::from_msgf("GGK+114.043+229.163TS+79.966R", &lookup, &classes).unwrap();
        assert_eq!(psm.sequence, "GGKTSR");
        assert_eq!(psm.modifications.len(), 3);
        assert_eq!(psm.modifications[0].name, "GG");
        assert_eq!(psm.modifications[1].name, "TMT6plex");
        assert_eq!(psm.modifications[1].site, psm.modifications[0].site);
        assert!(psm.has_stable());
        assert_eq!(
            psm.luciphor_input_sites().unwrap(),
            "2=242.13788999999997,4=166.99836"
        );
    }

    #[test]
    fn parse_msgf_unmodified() {
        let (catalog, classes) = setup();
        let lookup = MsgfLookup::new(&catalog).unwrap();
        let psm = PeptideRecord::from_msgf("PEPTIDER", &lookup, &classes).unwrap();
        assert_eq!(psm.sequence, "PEPTIDER");
        assert!(psm.modifications.is_empty());
        assert!(!psm.has_labile());
        assert_eq!(psm.luciphor_input_sites().unwrap(), "");
    }

    #[test]
    fn unknown_delta() {
        let (catalog, classes) = setup();
        let lookup = MsgfLookup::new(&catalog).unwrap();
        match PeptideRecord::from_msgf("PEPM+15.995K", &lookup, &classes) {
            Err(Error::UnknownDelta { token, peptide }) => {
                assert_eq!(token, "+15.995");
                assert_eq!(peptide, "PEPM+15.995K");
            }
            other => panic!("expected unknown delta, got {:?}", other),
        }
    }

    #[test]
    fn parse_luciphor() {
        let (catalog, classes) = setup();
        let lookup = LuciphorLookup::new(&catalog).unwrap();
        let psm = PeptideRecord::from_luciphor(
            "run1.1003.1003.3",
            "GGK[242]TS[167]R",
            &lookup,
            &classes,
        )
        .unwrap();
        assert_eq!(psm.sequence, "GGKTSR");
        assert_eq!(psm.spec_id, "run1.1003.1003.3");
        assert_eq!(psm.score_permutation, "GGkTsR");
        // GG is stable, its site is not subject to scoring
        assert_eq!(psm.modifications.len(), 1);
        assert_eq!(
            psm.modifications[0].site,
            ModificationSite {
                residue: 'S',
                position: 4
            }
        );
        assert_eq!(psm.modifications[0].kind, ModificationKind::Labile);

        assert!(matches!(
            PeptideRecord::from_luciphor("x", "AC[160]DE", &lookup, &classes),
            Err(Error::UnknownResidueMass { .. })
        ));
    }

    #[test]
    fn score_permutation() {
        let catalog = ModificationCatalog::parse("56.99,C,opt,any,Test\n", &["test"]).unwrap();
        let classes = PtmClasses::new(&["test"], &[]);
        let lookup = LuciphorLookup::new(&catalog).unwrap();
        let psm = PeptideRecord::from_luciphor("x", "AC[160]DE", &lookup, &classes).unwrap();
        assert_eq!(psm.score_permutation, "AcDE");
        assert_eq!(psm.sequence, "ACDE");
        assert_eq!(psm.modifications[0].site.position, 1);
    }

    #[test]
    fn luciphor_protein_n_term() {
        let catalog =
            ModificationCatalog::parse("42.01057,*,opt,N-term,Acetyl\n", &["acetyl"]).unwrap();
        let classes = PtmClasses::new(&["Acetyl"], &[]);
        let lookup = LuciphorLookup::new(&catalog).unwrap();
        let psm = PeptideRecord::from_luciphor("x", "[42]PEPSK", &lookup, &classes).unwrap();
        assert_eq!(psm.sequence, "PEPSK");
        assert_eq!(psm.score_permutation, "[42]PEPSK");
        assert_eq!(psm.modifications.len(), 1);
        assert_eq!(psm.modifications[0].site, ModificationSite::protein_n_term());
        assert_eq!(psm.modifications[0].name, "Acetyl");
    }

    #[test]
    fn sites_count_characters() {
        let (catalog, classes) = setup();
        let lookup = MsgfLookup::new(&catalog).unwrap();
        let psm = PeptideRecord::from_msgf("\u{c4}S+79.966K", &lookup, &classes).unwrap();
        assert_eq!(psm.sequence, "\u{c4}SK");
        assert_eq!(psm.modifications[0].site.position, 1);
    }

    #[test]
    fn alternative_localizations() {
        let mut psm = PeptideRecord {
            score_permutation: "acDE".into(),
            ..Default::default()
        };
        assert_eq!(psm.format_alternatives(), "NA");

        assert!(!psm.collect_alternative("acDE", "12.0", 0.5).unwrap());
        assert!(!psm.collect_alternative("aCdE", "0.4", 0.5).unwrap());
        assert!(!psm.collect_alternative("aCdE", "0.5", 0.5).unwrap());
        assert!(!psm.collect_alternative("aCdE", "NaN", 0.5).unwrap());
        assert_eq!(psm.format_alternatives(), "NA");

        assert!(psm.collect_alternative("aCdE", "0.9", 0.5).unwrap());
        assert_eq!(psm.format_alternatives(), "A1:0.9,D3:0.9");

        assert!(psm.collect_alternative("ACDe", "0.75", 0.5).unwrap());
        assert_eq!(psm.format_alternatives(), "A1:0.9,D3:0.9;E4:0.75");

        assert!(matches!(
            psm.collect_alternative("ACDE", "high", 0.5),
            Err(Error::InvalidScore(_))
        ));
    }

    #[test]
    fn merge_and_report() {
        let (catalog, classes) = setup();
        let msgf = MsgfLookup::new(&catalog).unwrap();
        let luci = LuciphorLookup::new(&catalog).unwrap();

        let searched =
            PeptideRecord::from_msgf("GGK+114.043+229.163TS+79.966R", &msgf, &classes).unwrap();
        let mut localized =
            PeptideRecord::from_luciphor("x", "GGK[242]T[181]SR", &luci, &classes).unwrap();
        assert_eq!(localized.top_ptm_sites(), "Phospho:T4");

        localized.merge_modifications(&searched);
        // Phospho is already localized, GG and TMT are carried over
        assert_eq!(localized.modifications.len(), 3);
        assert_eq!(localized.top_ptm_sites(), "Phospho:T4_GG:K3");

        assert_eq!(PeptideRecord::default().top_ptm_sites(), "NA");
    }

    #[test]
    fn spectrum_ids() {
        assert_eq!(spectrum_id("run1.mzML", "1001", "2"), "run1.1001.1001.2");
        assert_eq!(spectrum_id("/data/set_a.mzML", "7", "3"), "set_a.7.7.3");
    }
}
