//! LuciPHOr2 run configuration, rendered from a user supplied template

use minijinja::Environment;
use serde::Serialize;

use crate::catalog::ModificationCatalog;
use crate::mass::{format_mass, Tolerance, H3PO4};
use crate::psm::PtmClasses;
use crate::Error;

/// Template variables of a LuciPHOr2 configuration file. Modification blocks
/// hold one `site mass` line per residue.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Configuration {
    /// Path LuciPHOr2 writes its results to
    pub outfile: String,
    pub fixedmods: Vec<String>,
    /// Variable modifications that are not scored
    pub varmods: Vec<String>,
    /// Target modifications, those being localized
    pub ptms: Vec<String>,
    pub ms2tol: f64,
    pub ms2toltype: u8,
    /// Decoy masses, one per distinct target modification mass
    pub dmasses: Vec<String>,
    pub neutralloss: Vec<String>,
    pub decoy_nloss: Vec<String>,
}

impl Configuration {
    pub fn from_catalog(
        catalog: &ModificationCatalog,
        classes: &PtmClasses,
        outfile: &str,
        tolerance: Tolerance,
    ) -> Self {
        let fixedmods = catalog.fixed().map(|d| d.luciphor_line()).collect();

        let mut varmods = Vec::new();
        let mut ptms = Vec::new();
        let mut dmasses: Vec<String> = Vec::new();
        let mut phospho_residues = String::new();

        for def in catalog.variable() {
            if !classes.is_labile(&def.name_key) {
                varmods.push(def.luciphor_line());
                continue;
            }
            ptms.push(def.luciphor_line());
            let mass = format_mass(def.effective_mass());
            if !dmasses.contains(&mass) {
                dmasses.push(mass);
            }
            if def.name_key == "phospho" {
                phospho_residues.push(def.site().to_ascii_lowercase());
            }
        }

        let mut neutralloss = Vec::new();
        let mut decoy_nloss = Vec::new();
        if !phospho_residues.is_empty() {
            neutralloss.push(format!("{} -H3PO4 -{:.5}", phospho_residues, H3PO4));
            decoy_nloss.push(format!("X -H3PO4 -{:.5}", H3PO4));
        }

        Self {
            outfile: outfile.into(),
            fixedmods,
            varmods,
            ptms,
            ms2tol: tolerance.value(),
            ms2toltype: tolerance.kind_code(),
            dmasses,
            neutralloss,
            decoy_nloss,
        }
    }

    pub fn render(&self, template: &str) -> Result<String, Error> {
        let mut env = Environment::new();
        env.add_template("luciphor", template)?;
        let rendered = env.get_template("luciphor")?.render(self)?;
        Ok(rendered)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MODS: &str = "\
229.16293,K,fix,any,TMT6plex
229.16293,*,fix,N-term,TMT6plex
57.02146,C,fix,any,Carbamidomethyl
15.99491,M,opt,any,Oxidation
79.96633,STY,opt,any,Phospho
42.01057,K,opt,any,Acetyl
";

    fn configuration() -> Configuration {
        let labile = ["Phospho"];
        let stable = ["tmt10plex", "Carbamidomethyl", "Oxidation", "Acetyl"];
        let requested = labile.iter().chain(stable.iter()).collect::<Vec<_>>();
        let catalog = ModificationCatalog::parse(MODS, &requested).unwrap();
        let classes = PtmClasses::new(&labile, &stable);
        Configuration::from_catalog(&catalog, &classes, "luciphor_out.tsv", Tolerance::Da(0.02))
    }

    #[test]
    fn modification_blocks() {
        let config = configuration();
        assert_eq!(
            config.fixedmods,
            vec!["K 229.16293", "[ 229.16293", "C 57.02146"]
        );
        assert_eq!(config.varmods, vec!["M 15.99491", "K -187.15236"]);
        assert_eq!(
            config.ptms,
            vec!["S 79.96633", "T 79.96633", "Y 79.96633"]
        );
        assert_eq!(config.dmasses, vec!["79.96633"]);
        assert_eq!(config.neutralloss, vec!["sty -H3PO4 -97.97690"]);
        assert_eq!(config.decoy_nloss, vec!["X -H3PO4 -97.97690"]);
        assert_eq!(config.ms2tol, 0.02);
        assert_eq!(config.ms2toltype, 0);
    }

    #[test]
    fn no_neutral_loss_without_phospho() {
        let catalog =
            ModificationCatalog::parse("203.07937,ST,opt,any,HexNAc\n", &["hexnac"]).unwrap();
        let classes = PtmClasses::new(&["HexNAc"], &[]);
        let config =
            Configuration::from_catalog(&catalog, &classes, "out.tsv", Tolerance::Ppm(20.0));
        assert_eq!(config.ptms, vec!["S 203.07937", "T 203.07937"]);
        assert_eq!(config.dmasses, vec!["203.07937"]);
        assert!(config.neutralloss.is_empty());
        assert!(config.decoy_nloss.is_empty());
        assert_eq!(config.ms2toltype, 1);
    }

    #[test]
    fn render_template() {
        let template = "\
OUTPUT_FILE = {{ outfile }}
MS2_TOL = {{ ms2tol }}
MS2_TOL_UNITS = {{ ms2toltype }}
{% for mod in fixedmods %}FIXED_MOD = {{ mod }}
{% endfor %}{% for mod in ptms %}TARGET_MOD = {{ mod }}
{% endfor %}{% for mass in dmasses %}DECOY_MASS = {{ mass }}
{% endfor %}{% for loss in neutralloss %}NL = {{ loss }}
{% endfor %}";
        let rendered = configuration().render(template).unwrap();
        assert!(rendered.starts_with("OUTPUT_FILE = luciphor_out.tsv\nMS2_TOL = 0.02\n"));
        assert!(rendered.contains("MS2_TOL_UNITS = 0\n"));
        assert!(rendered.contains("FIXED_MOD = [ 229.16293\n"));
        assert!(rendered.contains("TARGET_MOD = Y 79.96633\n"));
        assert!(rendered.contains("DECOY_MASS = 79.96633\n"));
        assert!(rendered.contains("NL = sty -H3PO4 -97.97690\n"));
        assert!(!rendered.contains("M 15.99491"));
    }

    #[test]
    fn invalid_template() {
        assert!(matches!(
            configuration().render("{% for mod in ptms %}"),
            Err(Error::Template(_))
        ));
    }
}
