use anyhow::Context;
use ptmloc_core::psm::PeptideRecord;
use ptmloc_core::Error;
use rayon::prelude::*;

use crate::runner::{PsmColumns, Runner};

fn write_tsv(path: &str, headers: &[&str], records: &[csv::ByteRecord]) -> anyhow::Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(vec![]);

    wtr.write_byte_record(&csv::ByteRecord::from(headers.to_vec()))?;
    for record in records {
        wtr.write_byte_record(record)?;
    }

    wtr.flush()?;
    let bytes = wtr.into_inner()?;
    std::fs::write(path, bytes).with_context(|| format!("Failed to write `{}`", path))?;
    Ok(())
}

fn format_score(score: Option<f64>) -> String {
    match score {
        Some(score) => ryu::Buffer::new().format(score).to_owned(),
        None => "NA".into(),
    }
}

impl Runner {
    /// One row of LuciPHOr2 input: the PSM as searched, with its unfixed
    /// modification sites
    pub(crate) fn serialize_luciphor_input(
        &self,
        row: &csv::StringRecord,
        columns: &PsmColumns,
        psm: &PeptideRecord,
    ) -> Result<csv::ByteRecord, Error> {
        let mut record = csv::ByteRecord::new();
        record.push_field(row[columns.src_file].as_bytes());
        record.push_field(row[columns.scan].as_bytes());
        record.push_field(row[columns.charge].as_bytes());
        record.push_field(row[columns.score].as_bytes());
        record.push_field(psm.sequence.as_bytes());
        record.push_field(psm.luciphor_input_sites()?.as_bytes());
        Ok(record)
    }

    pub fn write_luciphor_input(
        &self,
        path: &str,
        records: &[csv::ByteRecord],
    ) -> anyhow::Result<()> {
        let headers = ["srcFile", "scanNum", "charge", "PSMscore", "peptide", "modSites"];
        write_tsv(path, &headers, records)
    }

    pub fn serialize_annotation(&self, psm: &PeptideRecord) -> csv::ByteRecord {
        let mut record = csv::ByteRecord::new();
        record.push_field(psm.spec_id.as_bytes());
        record.push_field(psm.sequence.as_bytes());
        record.push_field(psm.top_ptm_sites().as_bytes());
        record.push_field(format_score(psm.top_score).as_bytes());
        record.push_field(format_score(psm.top_flr).as_bytes());
        record.push_field(psm.format_alternatives().as_bytes());
        record
    }

    pub fn write_annotations(&self, path: &str, psms: &[PeptideRecord]) -> anyhow::Result<()> {
        let headers = [
            "specId",
            "peptide",
            "topPTMs",
            "pep1score",
            "globalFLR",
            "altPTMlocations",
        ];
        let records = psms
            .par_iter()
            .map(|psm| self.serialize_annotation(psm))
            .collect::<Vec<_>>();
        write_tsv(path, &headers, &records)
    }
}
