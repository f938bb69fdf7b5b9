//! CSV export of per-unit pairwise statistics
//!
//! One row per parsed unit comparing job A against job B, for spreadsheet
//! analysis. Column order is fixed and the table can be read back with
//! [`CsvExport::parse`].

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use crate::loader::{ExperimentUnit, UnitJob};

/// Fixed column order of the export
pub const COLUMNS: [&str; 16] = [
    "filename",
    "job_a_id",
    "job_a_shots",
    "job_a_0",
    "job_a_1",
    "job_a_p0",
    "job_a_sigma",
    "job_b_id",
    "job_b_shots",
    "job_b_0",
    "job_b_1",
    "job_b_p0",
    "job_b_sigma",
    "delta",
    "sigma_total",
    "z_value",
];

/// Columns describing one job
#[derive(Debug, Clone, PartialEq)]
pub struct CsvJobColumns {
    pub id: String,
    pub shots: u64,
    pub zeros: u64,
    pub ones: u64,
    pub p0: f64,
    pub sigma: f64,
}

impl From<&UnitJob> for CsvJobColumns {
    fn from(job: &UnitJob) -> Self {
        Self {
            id: job.record.identifier().to_string(),
            shots: job.declared.shots,
            zeros: job.record.counts().get("0"),
            ones: job.record.counts().get("1"),
            p0: job.declared.p0,
            sigma: job.declared.sigma,
        }
    }
}

/// CSV record for a single unit
#[derive(Debug, Clone, PartialEq)]
pub struct CsvUnitRow {
    pub filename: String,
    pub job_a: CsvJobColumns,
    pub job_b: CsvJobColumns,
    pub delta: f64,
    pub sigma_total: f64,
    pub z_value: f64,
}

impl CsvUnitRow {
    /// A vs B row of a unit, from its declared estimates
    pub fn from_unit(unit: &ExperimentUnit) -> Self {
        let ab = unit.pair_ab();
        Self {
            filename: unit.name.clone(),
            job_a: (&unit.job_a).into(),
            job_b: (&unit.job_b).into(),
            delta: ab.delta,
            sigma_total: ab.sigma_total,
            z_value: ab.z,
        }
    }

    fn fields(&self) -> Vec<String> {
        let mut fields = vec![CsvExport::escape_field(&self.filename)];
        for job in [&self.job_a, &self.job_b] {
            fields.push(CsvExport::escape_field(&job.id));
            fields.push(job.shots.to_string());
            fields.push(job.zeros.to_string());
            fields.push(job.ones.to_string());
            fields.push(job.p0.to_string());
            fields.push(job.sigma.to_string());
        }
        fields.push(self.delta.to_string());
        fields.push(self.sigma_total.to_string());
        fields.push(self.z_value.to_string());
        fields
    }

    fn from_fields(fields: &[String]) -> Result<Self> {
        if fields.len() != COLUMNS.len() {
            bail!(
                "expected {} columns, found {}",
                COLUMNS.len(),
                fields.len()
            );
        }

        let job = |offset: usize| -> Result<CsvJobColumns> {
            Ok(CsvJobColumns {
                id: fields[offset].clone(),
                shots: parse_column(fields, offset + 1)?,
                zeros: parse_column(fields, offset + 2)?,
                ones: parse_column(fields, offset + 3)?,
                p0: parse_column(fields, offset + 4)?,
                sigma: parse_column(fields, offset + 5)?,
            })
        };

        Ok(Self {
            filename: fields[0].clone(),
            job_a: job(1)?,
            job_b: job(7)?,
            delta: parse_column(fields, 13)?,
            sigma_total: parse_column(fields, 14)?,
            z_value: parse_column(fields, 15)?,
        })
    }
}

fn parse_column<T>(fields: &[String], index: usize) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    fields[index]
        .parse()
        .with_context(|| format!("invalid value {:?} in column {}", fields[index], COLUMNS[index]))
}

/// CSV output formatter
#[derive(Debug, Default)]
pub struct CsvExport {
    rows: Vec<CsvUnitRow>,
}

impl CsvExport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row to the output
    pub fn add_row(&mut self, row: CsvUnitRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[CsvUnitRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn header() -> String {
        COLUMNS.join(",")
    }

    /// Escape CSV field (handle commas, quotes, newlines)
    fn escape_field(field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    /// Generate CSV output as string
    pub fn to_csv(&self) -> String {
        let mut output = String::new();

        output.push_str(&Self::header());
        output.push('\n');

        for row in &self.rows {
            output.push_str(&row.fields().join(","));
            output.push('\n');
        }

        output
    }

    /// Write the table; nothing is written when there are no rows
    ///
    /// Returns whether a file was written.
    pub fn write_to(&self, path: &Path) -> Result<bool> {
        if self.rows.is_empty() {
            return Ok(false);
        }
        fs::write(path, self.to_csv())
            .with_context(|| format!("Failed to write CSV to {}", path.display()))?;
        Ok(true)
    }

    /// Read a table produced by [`CsvExport::to_csv`]
    pub fn parse(text: &str) -> Result<Self> {
        let mut records = split_records(text)?.into_iter();

        let header = records.next().context("CSV is empty")?;
        if header != COLUMNS {
            bail!("unexpected CSV header: {}", header.join(","));
        }

        let mut export = Self::new();
        for (line, record) in records.enumerate() {
            let row = CsvUnitRow::from_fields(&record)
                .with_context(|| format!("invalid CSV row {}", line + 1))?;
            export.add_row(row);
        }
        Ok(export)
    }
}

/// Split CSV text into records, honoring quoted fields
fn split_records(text: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            _ => field.push(c),
        }
    }

    if in_quotes {
        bail!("unterminated quoted field");
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}
