use crate::input::{Annotate, Modifications, Prepare};
use anyhow::Context;
use fnv::FnvHashMap;
use log::info;
use ptmloc_core::catalog::ModificationCatalog;
use ptmloc_core::lookup::{LuciphorLookup, MsgfLookup};
use ptmloc_core::luciphor::Configuration;
use ptmloc_core::psm::{spectrum_id, PeptideRecord, PtmClasses};
use ptmloc_core::Error;
use rayon::prelude::*;
use std::time::Instant;

/// Column indices of an MS-GF+ PSM table
pub(crate) struct PsmColumns {
    pub src_file: usize,
    pub scan: usize,
    pub charge: usize,
    pub score: usize,
    pub peptide: usize,
}

impl PsmColumns {
    fn new(headers: &csv::StringRecord) -> anyhow::Result<Self> {
        Ok(Self {
            src_file: column(headers, "SpectraFile")?,
            scan: column(headers, "ScanNum")?,
            charge: column(headers, "Charge")?,
            score: column(headers, "PSM q-value")?,
            peptide: column(headers, "Peptide")?,
        })
    }

    fn spectrum_id(&self, row: &csv::StringRecord) -> String {
        spectrum_id(&row[self.src_file], &row[self.scan], &row[self.charge])
    }
}

fn column(headers: &csv::StringRecord, name: &str) -> anyhow::Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .with_context(|| format!("Missing column `{}`", name))
}

fn reader(path: &str) -> anyhow::Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .from_path(path)
        .with_context(|| format!("Failed to open `{}`", path))
}

/// Read a whole tab-separated table
fn read_table(path: &str) -> anyhow::Result<(csv::StringRecord, Vec<csv::StringRecord>)> {
    let mut rdr = reader(path)?;
    let headers = rdr.headers()?.clone();
    let rows = rdr
        .records()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read `{}`", path))?;
    Ok((headers, rows))
}

pub struct Runner {
    catalog: ModificationCatalog,
    classes: PtmClasses,
    start: Instant,
}

impl Runner {
    pub fn new(mods: &Modifications) -> anyhow::Result<Self> {
        let start = Instant::now();
        let requested = mods
            .labile
            .iter()
            .chain(mods.stable.iter())
            .collect::<Vec<_>>();
        let catalog = ModificationCatalog::load(&mods.modfile, &requested)
            .with_context(|| format!("Failed to build modifications from `{}`", mods.modfile))?;

        info!(
            "loaded {} modification definitions ({} fixed) from {}",
            catalog.len(),
            catalog.fixed().count(),
            mods.modfile
        );
        if catalog.is_empty() {
            log::warn!("none of the requested modifications are in {}", mods.modfile);
        }
        if catalog.has_competing_residues() {
            log::warn!(
                "variable modifications share residues with fixed modifications, \
                 LuciPHOr2 skips such residues when scoring"
            );
        }

        Ok(Self {
            catalog,
            classes: PtmClasses::new(&mods.labile, &mods.stable),
            start,
        })
    }

    /// Parse every row of an MS-GF+ PSM table, keeping input order
    fn parse_msgf_table(
        &self,
        path: &str,
    ) -> anyhow::Result<(PsmColumns, Vec<(csv::StringRecord, PeptideRecord)>)> {
        let lookup = MsgfLookup::new(&self.catalog)?;
        let (headers, rows) = read_table(path)?;
        let columns = PsmColumns::new(&headers)
            .with_context(|| format!("`{}` is not an MS-GF+ PSM table", path))?;
        info!("read {} PSMs from {}", rows.len(), path);

        let psms = rows
            .into_par_iter()
            .map(|row| {
                let peptide = &row[columns.peptide];
                let psm = PeptideRecord::from_msgf(peptide, &lookup, &self.classes)?;
                Ok((row, psm))
            })
            .collect::<Result<Vec<_>, Error>>()
            .with_context(|| format!("Failed to parse peptides of `{}`", path))?;
        Ok((columns, psms))
    }

    /// Write LuciPHOr2 input: its configuration and the PSMs that carry a
    /// labile modification
    pub fn prepare(&self, settings: &Prepare) -> anyhow::Result<()> {
        let (columns, psms) = self.parse_msgf_table(&settings.psmfile)?;
        let records = psms
            .par_iter()
            .filter(|(_, psm)| psm.has_labile())
            .map(|(row, psm)| self.serialize_luciphor_input(row, &columns, psm))
            .collect::<Result<Vec<_>, Error>>()?;

        if let Some(path) = &settings.msgf_modfile {
            let mut lines = self.catalog.msgf_mod_lines()?;
            lines.push(String::new());
            std::fs::write(path, lines.join("\n"))
                .with_context(|| format!("Failed to write `{}`", path))?;
            info!("wrote adjusted MS-GF+ modifications to {}", path);
        }

        let template = std::fs::read_to_string(&settings.template)
            .with_context(|| format!("Failed to read template `{}`", settings.template))?;
        let config = Configuration::from_catalog(
            &self.catalog,
            &self.classes,
            &settings.outfile,
            settings.fragment_tol,
        );
        let rendered = config
            .render(&template)
            .with_context(|| format!("Failed to render template `{}`", settings.template))?;
        std::fs::write(&settings.config_out, rendered)
            .with_context(|| format!("Failed to write `{}`", settings.config_out))?;
        info!("wrote LuciPHOr2 configuration to {}", settings.config_out);

        self.write_luciphor_input(&settings.lucipsms, &records)?;
        info!(
            "wrote {} of {} PSMs with labile modifications to {}",
            records.len(),
            psms.len(),
            settings.lucipsms
        );
        info!("finished in {}ms", self.start.elapsed().as_millis());
        Ok(())
    }

    /// Translate LuciPHOr2 results back to named modification sites
    pub fn annotate(&self, settings: &Annotate) -> anyhow::Result<()> {
        let lookup = LuciphorLookup::new(&self.catalog)?;
        let (headers, rows) = read_table(&settings.luciphor_results)?;
        let spec_id = column(&headers, "specId")?;
        let peptide = column(&headers, "predictedPep1")?;
        let score = column(&headers, "pep1score")?;
        let flr = column(&headers, "globalFLR")?;

        let mut records = rows
            .par_iter()
            .map(|row| {
                let parse = |ix: usize| {
                    row[ix]
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| Error::InvalidScore(row[ix].to_string()))
                };
                let psm = PeptideRecord::from_luciphor(
                    &row[spec_id],
                    &row[peptide],
                    &lookup,
                    &self.classes,
                )?;
                Ok(psm.with_scores(parse(score)?, parse(flr)?))
            })
            .collect::<Result<Vec<_>, Error>>()
            .with_context(|| format!("Failed to parse `{}`", settings.luciphor_results))?;
        info!(
            "read {} localized PSMs from {}",
            records.len(),
            settings.luciphor_results
        );

        if let Some(path) = &settings.psmfile {
            let (columns, psms) = self.parse_msgf_table(path)?;
            let searched = psms
                .iter()
                .map(|(row, psm)| (columns.spectrum_id(row), psm))
                .collect::<FnvHashMap<_, _>>();
            let mut merged = 0;
            for record in records.iter_mut() {
                if let Some(psm) = searched.get(&record.spec_id) {
                    record.merge_modifications(psm);
                    merged += 1;
                }
            }
            info!("merged searched modifications into {} PSMs", merged);
        }

        if let Some(path) = &settings.luciphor_scores {
            let accepted = self.collect_alternatives(path, settings.min_score, &mut records)?;
            info!(
                "accepted {} alternative localizations scoring above {}",
                accepted, settings.min_score
            );
        }

        self.write_annotations(&settings.output, &records)?;
        info!("wrote {} annotated PSMs to {}", records.len(), settings.output);
        info!("finished in {}ms", self.start.elapsed().as_millis());
        Ok(())
    }

    /// Stream a LuciPHOr2 permutation score table through the collector
    fn collect_alternatives(
        &self,
        path: &str,
        min_score: f64,
        records: &mut [PeptideRecord],
    ) -> anyhow::Result<usize> {
        let index = records
            .iter()
            .enumerate()
            .map(|(ix, record)| (record.spec_id.clone(), ix))
            .collect::<FnvHashMap<_, _>>();

        let mut rdr = reader(path)?;
        let headers = rdr.headers()?.clone();
        let spec_id = column(&headers, "specId")?;
        let permutation = column(&headers, "curPermutation")?;
        let score = column(&headers, "score")?;

        let mut accepted = 0;
        for row in rdr.records() {
            let row = row.with_context(|| format!("Failed to read `{}`", path))?;
            let Some(&ix) = index.get(&row[spec_id]) else {
                log::trace!("skipping scores of unknown spectrum {}", &row[spec_id]);
                continue;
            };
            if records[ix].collect_alternative(&row[permutation], &row[score], min_score)? {
                accepted += 1;
            }
        }
        Ok(accepted)
    }
}
