use anyhow::{ensure, Context};
use clap::ArgMatches;
use ptmloc_core::mass::Tolerance;
use serde::{Deserialize, Serialize};

/// Default path of the rendered LuciPHOr2 configuration
pub const CONFIG_OUT: &str = "luciphor_config.txt";

#[derive(Serialize, Clone, Debug, PartialEq)]
/// Modifications a run works with, split by how they are localized
pub struct Modifications {
    /// MS-GF+ mod file
    pub modfile: String,
    /// Names (or inline mod file rows) of the modifications to localize
    pub labile: Vec<String>,
    /// Other variable modifications, reported at their searched site
    pub stable: Vec<String>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
/// Settings of a `prepare` run, once overrides and defaults are applied
pub struct Prepare {
    pub mods: Modifications,
    pub psmfile: String,
    pub template: String,
    /// LuciPHOr2 output path, written into the configuration
    pub outfile: String,
    pub lucipsms: String,
    pub config_out: String,
    pub msgf_modfile: Option<String>,
    pub fragment_tol: Tolerance,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
/// Settings of an `annotate` run
pub struct Annotate {
    pub mods: Modifications,
    pub luciphor_results: String,
    pub luciphor_scores: Option<String>,
    pub psmfile: Option<String>,
    pub min_score: f64,
    pub output: String,
}

#[derive(Deserialize, Default, Debug)]
/// Parameters deserialized from an optional JSON file, then overridden from
/// the command line
pub struct Input {
    modfile: Option<String>,
    labileptms: Option<Vec<String>>,
    mods: Option<Vec<String>>,
    fragment_tol: Option<Tolerance>,

    psmfile: Option<String>,
    template: Option<String>,
    outfile: Option<String>,
    lucipsms: Option<String>,
    config_out: Option<String>,
    msgf_modfile: Option<String>,

    luciphor_results: Option<String>,
    luciphor_scores: Option<String>,
    min_score: Option<f64>,
    output: Option<String>,
}

fn string_arg(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.try_get_one::<String>(id).ok().flatten().cloned()
}

fn strings_arg(matches: &ArgMatches, id: &str) -> Option<Vec<String>> {
    matches
        .try_get_many::<String>(id)
        .ok()
        .flatten()
        .map(|values| values.cloned().collect())
}

/// Combine a tolerance value and unit designator, when both are known
pub fn fragment_tolerance(
    value: Option<f64>,
    kind: Option<String>,
) -> anyhow::Result<Option<Tolerance>> {
    match (value, kind) {
        (Some(value), Some(kind)) => Ok(Some(Tolerance::new(value, &kind)?)),
        (None, None) => Ok(None),
        (Some(_), None) => anyhow::bail!("fragment tolerance given without a unit (`Da` or `ppm`)"),
        (None, Some(_)) => anyhow::bail!("fragment tolerance unit given without a value"),
    }
}

impl Input {
    pub fn from_arguments(matches: &ArgMatches) -> anyhow::Result<Self> {
        let mut input = match string_arg(matches, "parameters") {
            Some(path) => Input::load(&path)
                .with_context(|| format!("Failed to read parameters from `{path}`"))?,
            None => Input::default(),
        };

        // Handle JSON configuration overrides
        macro_rules! set {
            ($field:ident, $id:expr) => {
                if let Some(value) = string_arg(matches, $id) {
                    log::trace!("overriding `{}` parameter.", stringify!($field));
                    input.$field = Some(value);
                }
            };
        }
        set!(modfile, "modfile");
        set!(psmfile, "psmfile");
        set!(template, "template");
        set!(outfile, "outfile");
        set!(lucipsms, "lucipsms");
        set!(config_out, "config-out");
        set!(msgf_modfile, "msgf-modfile");
        set!(luciphor_results, "luciphor-results");
        set!(luciphor_scores, "luciphor-scores");
        set!(output, "output");

        if let Some(labile) = strings_arg(matches, "labileptms") {
            log::trace!("overriding `labileptms` parameter.");
            input.labileptms = Some(labile);
        }
        if let Some(mods) = strings_arg(matches, "mods") {
            log::trace!("overriding `mods` parameter.");
            input.mods = Some(mods);
        }
        if let Ok(Some(min_score)) = matches.try_get_one::<f64>("min-score") {
            input.min_score = Some(*min_score);
        }

        // Fragment tolerance: command line, then environment, then file
        let value = match matches.try_get_one::<f64>("ms2-tolerance").ok().flatten() {
            Some(value) => Some(*value),
            None => match std::env::var("MS2TOLVALUE") {
                Ok(value) => Some(
                    value
                        .trim()
                        .parse::<f64>()
                        .with_context(|| format!("Invalid MS2TOLVALUE `{value}`"))?,
                ),
                Err(_) => None,
            },
        };
        let kind = string_arg(matches, "ms2-tolerance-type")
            .or_else(|| std::env::var("MS2TOLTYPE").ok());
        if let Some(tolerance) = fragment_tolerance(value, kind)? {
            input.fragment_tol = Some(tolerance);
        }

        Ok(input)
    }

    pub fn load<S: AsRef<str>>(path: S) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let input = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(input)
    }

    fn modifications(&mut self) -> anyhow::Result<Modifications> {
        ensure!(
            self.modfile.is_some(),
            "`modfile` must be set. For more information try '--help'"
        );
        let labile = self.labileptms.take().unwrap_or_default();
        if labile.is_empty() {
            log::warn!("no labile PTMs given, there is nothing to localize");
        }
        Ok(Modifications {
            modfile: self.modfile.take().unwrap_or_default(),
            labile,
            stable: self.mods.take().unwrap_or_default(),
        })
    }

    pub fn build_prepare(mut self) -> anyhow::Result<Prepare> {
        let mods = self.modifications()?;
        let (Some(psmfile), Some(template), Some(outfile), Some(lucipsms)) =
            (self.psmfile, self.template, self.outfile, self.lucipsms)
        else {
            anyhow::bail!(
                "`psmfile`, `template`, `outfile` and `lucipsms` must be set. \
                 For more information try '--help'"
            );
        };
        let Some(fragment_tol) = self.fragment_tol else {
            anyhow::bail!(
                "fragment tolerance must be set, either as `fragment_tol`, \
                 with --ms2-tolerance/--ms2-tolerance-type, or through \
                 MS2TOLVALUE/MS2TOLTYPE"
            );
        };
        if fragment_tol.value() <= 0.0 {
            log::warn!("fragment tolerance is not positive: {}", fragment_tol.value());
        }

        Ok(Prepare {
            mods,
            psmfile,
            template,
            outfile,
            lucipsms,
            config_out: self.config_out.unwrap_or_else(|| CONFIG_OUT.into()),
            msgf_modfile: self.msgf_modfile,
            fragment_tol,
        })
    }

    pub fn build_annotate(mut self) -> anyhow::Result<Annotate> {
        let mods = self.modifications()?;
        ensure!(
            self.luciphor_results.is_some(),
            "`luciphor_results` must be set. For more information try '--help'"
        );
        ensure!(
            self.output.is_some(),
            "`output` must be set. For more information try '--help'"
        );
        if self.luciphor_scores.is_none() {
            log::info!("no permutation scores given, alternative localizations are not reported");
        }

        Ok(Annotate {
            mods,
            luciphor_results: self.luciphor_results.unwrap_or_default(),
            luciphor_scores: self.luciphor_scores,
            psmfile: self.psmfile,
            min_score: self.min_score.unwrap_or(0.0),
            output: self.output.unwrap_or_default(),
        })
    }
}
