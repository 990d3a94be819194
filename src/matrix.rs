//! # Expression Matrix I/O
//!
//! Every table the pipeline touches is a tab-separated file with a header row:
//! expression matrices (samples as rows, gene identifiers as columns, the first
//! column holding the sample index) and two-column sample label tables.
//!
//! - Verbatim identifiers: all cells are first read as text, so sample and gene
//!   identifiers survive exactly as written (`"001"` stays `"001"`). Gene columns
//!   are then cast to `f64` and validated.
//! - User-Centric Errors: failures are assumed to be user-input errors and name
//!   the offending column or sample.
//! - Output goes through the `csv` writer with a tab delimiter.

use ndarray::{Array2, ArrayView1, Axis};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// A samples × genes matrix of expression values.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    /// Header text of the index column, kept so derived tables can reuse it.
    pub index_label: String,
    /// Row keys, unique.
    pub samples: Vec<String>,
    /// Column keys, unique.
    pub genes: Vec<String>,
    /// Shape: [samples.len(), genes.len()].
    pub values: Array2<f64>,
}

/// Class label of each reference sample, keyed by sample id.
#[derive(Debug, Clone)]
pub struct SampleLabels {
    labels: HashMap<String, String>,
}

#[derive(Error, Debug)]
pub enum MatrixError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to write tab-separated output: {0}")]
    CsvError(#[from] csv::Error),
    #[error(
        "Missing or null values were found in column '{0}'. Expression matrices must be complete."
    )]
    MissingValuesFound(String),
    #[error(
        "Column '{column_name}' could not be read as numeric expression values. It contains non-numeric data."
    )]
    ColumnWrongType { column_name: String },
    #[error("Non-finite values (NaN or Infinity) were found in column '{0}'.")]
    NonFiniteValuesFound(String),
    #[error("Identifier '{0}' appears more than once in '{1}'.")]
    DuplicateIdentifier(String, String),
    #[error("'{0}' contains no {1}.")]
    EmptyMatrix(String, &'static str),
    #[error("Gene '{0}' is not a column of the expression matrix.")]
    UnknownGene(String),
    #[error("Value array of shape {found:?} does not match {samples} samples × {genes} genes.")]
    ShapeMismatch {
        found: Vec<usize>,
        samples: usize,
        genes: usize,
    },
    #[error("Malformed label table '{path}': {reason}")]
    MalformedLabelFile { path: String, reason: String },
    #[error("Training sample '{0}' has no label.")]
    UnlabeledSample(String),
}

impl ExpressionMatrix {
    pub fn new(
        index_label: String,
        samples: Vec<String>,
        genes: Vec<String>,
        values: Array2<f64>,
    ) -> Result<Self, MatrixError> {
        if values.dim() != (samples.len(), genes.len()) {
            return Err(MatrixError::ShapeMismatch {
                found: values.shape().to_vec(),
                samples: samples.len(),
                genes: genes.len(),
            });
        }
        check_unique(&samples, "sample index")?;
        check_unique(&genes, "gene header")?;
        Ok(Self {
            index_label,
            samples,
            genes,
            values,
        })
    }

    /// Loads a samples × genes matrix. Column 0 is the sample index.
    pub fn from_tsv(path: &Path) -> Result<Self, MatrixError> {
        let display = path.display().to_string();
        log::info!("Loading expression matrix from '{display}'");

        // Polars renames repeated header cells, so duplicates are caught on the raw header.
        let header = header_names(path)?;
        if let Some((_, raw_genes)) = header.split_first() {
            check_unique(raw_genes, &display)?;
        }

        let df = read_tsv(path, true)?;
        let columns = df.get_columns();
        let Some((index_column, gene_columns)) = columns.split_first() else {
            return Err(MatrixError::EmptyMatrix(display, "columns"));
        };
        if gene_columns.is_empty() {
            return Err(MatrixError::EmptyMatrix(display, "gene columns"));
        }
        if df.height() == 0 {
            return Err(MatrixError::EmptyMatrix(display, "samples"));
        }

        let index_label = index_column.name().to_string();
        let samples = text_values(index_column)?;

        let n_samples = samples.len();
        let mut genes = Vec::with_capacity(gene_columns.len());
        let mut values = Array2::<f64>::zeros((n_samples, gene_columns.len()));
        for (j, column) in gene_columns.iter().enumerate() {
            let name = column.name().to_string();
            let numeric = numeric_values(column, &name)?;
            values
                .column_mut(j)
                .assign(&ArrayView1::from(numeric.as_slice()));
            genes.push(name);
        }

        log::info!(
            "Loaded {} samples × {} genes from '{display}'",
            n_samples,
            genes.len()
        );
        check_unique(&samples, &display)?;
        check_unique(&genes, &display)?;
        Ok(Self {
            index_label,
            samples,
            genes,
            values,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    /// Column position of every gene.
    pub fn gene_index(&self) -> HashMap<&str, usize> {
        self.genes
            .iter()
            .enumerate()
            .map(|(j, g)| (g.as_str(), j))
            .collect()
    }

    /// Returns a matrix with exactly `genes` as columns, in that order.
    pub fn select_genes(&self, genes: &[String]) -> Result<Self, MatrixError> {
        let positions = self.gene_index();
        let indices = genes
            .iter()
            .map(|g| {
                positions
                    .get(g.as_str())
                    .copied()
                    .ok_or_else(|| MatrixError::UnknownGene(g.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            index_label: self.index_label.clone(),
            samples: self.samples.clone(),
            genes: genes.to_vec(),
            values: self.values.select(Axis(1), &indices),
        })
    }

    /// Same identifiers, new values (e.g. after scaling).
    pub fn with_values(&self, values: Array2<f64>) -> Result<Self, MatrixError> {
        if values.dim() != self.values.dim() {
            return Err(MatrixError::ShapeMismatch {
                found: values.shape().to_vec(),
                samples: self.n_samples(),
                genes: self.n_genes(),
            });
        }
        Ok(Self {
            index_label: self.index_label.clone(),
            samples: self.samples.clone(),
            genes: self.genes.clone(),
            values,
        })
    }

    /// Writes the matrix with `index_label` heading the sample column.
    pub fn write_tsv(&self, path: &Path, index_label: &str) -> Result<(), MatrixError> {
        let mut writer = tsv_writer(path)?;

        let mut header = Vec::with_capacity(self.n_genes() + 1);
        header.push(index_label);
        header.extend(self.genes.iter().map(String::as_str));
        writer.write_record(&header)?;

        for (sample, row) in self.samples.iter().zip(self.values.rows()) {
            writer.write_field(sample)?;
            for value in row {
                writer.write_field(value.to_string())?;
            }
            writer.write_record(None::<&[u8]>)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl SampleLabels {
    /// Reads a two-column (sample id, label) table with a header row.
    pub fn from_tsv(path: &Path) -> Result<Self, MatrixError> {
        let display = path.display().to_string();
        log::info!("Loading sample labels from '{display}'");

        let malformed = |reason: String| MatrixError::MalformedLabelFile {
            path: display.clone(),
            reason,
        };

        let df = read_tsv(path, true)?;
        let columns = df.get_columns();
        if columns.len() < 2 {
            return Err(malformed(format!(
                "expected a sample column and a label column, found {} column(s)",
                columns.len()
            )));
        }

        let samples = text_values(&columns[0])?;
        let labels = text_values(&columns[1])?;
        let mut map = HashMap::with_capacity(samples.len());
        for (sample, label) in samples.into_iter().zip(labels) {
            if label.trim().is_empty() {
                return Err(malformed(format!("sample '{sample}' has an empty label")));
            }
            if map.insert(sample.clone(), label).is_some() {
                return Err(malformed(format!("sample '{sample}' is labeled twice")));
            }
        }
        if map.is_empty() {
            return Err(malformed("no labeled samples".to_string()));
        }
        Ok(Self { labels: map })
    }

    pub fn from_pairs<I, S, L>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, L)>,
        S: Into<String>,
        L: Into<String>,
    {
        Self {
            labels: pairs
                .into_iter()
                .map(|(s, l)| (s.into(), l.into()))
                .collect(),
        }
    }

    /// Labels in the order of `samples`. Every sample must be labeled.
    pub fn labels_for(&self, samples: &[String]) -> Result<Vec<String>, MatrixError> {
        samples
            .iter()
            .map(|s| {
                self.labels
                    .get(s)
                    .cloned()
                    .ok_or_else(|| MatrixError::UnlabeledSample(s.clone()))
            })
            .collect()
    }
}

/// Tab-delimited writer shared by every output table.
pub(crate) fn tsv_writer(path: &Path) -> Result<csv::Writer<File>, MatrixError> {
    Ok(csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?)
}

/// Header cells exactly as written in the file.
fn header_names(path: &Path) -> Result<Vec<String>, MatrixError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)?;
    Ok(reader.headers()?.iter().map(str::to_string).collect())
}

/// Reads every cell as text; numeric columns are cast later.
pub(crate) fn read_tsv(path: &Path, has_header: bool) -> Result<DataFrame, MatrixError> {
    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(has_header)
                .with_infer_schema_length(Some(0))
                .with_parse_options(CsvParseOptions::default().with_separator(b'\t')),
        )
        .finish()?;
    Ok(df)
}

pub(crate) fn text_values(column: &Column) -> Result<Vec<String>, MatrixError> {
    let name = column.name().to_string();
    let casted = column.cast(&DataType::String)?;
    casted
        .str()?
        .into_iter()
        .map(|v| match v {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(MatrixError::MissingValuesFound(name.clone())),
        })
        .collect()
}

fn numeric_values(column: &Column, name: &str) -> Result<Vec<f64>, MatrixError> {
    if column.null_count() > 0 {
        return Err(MatrixError::MissingValuesFound(name.to_string()));
    }
    let casted = column
        .cast(&DataType::Float64)
        .map_err(|_| MatrixError::ColumnWrongType {
            column_name: name.to_string(),
        })?;
    if casted.null_count() > 0 {
        return Err(MatrixError::ColumnWrongType {
            column_name: name.to_string(),
        });
    }
    let values: Vec<f64> = casted.f64()?.into_no_null_iter().collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(MatrixError::NonFiniteValuesFound(name.to_string()));
    }
    Ok(values)
}

fn check_unique(ids: &[String], source: &str) -> Result<(), MatrixError> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(MatrixError::DuplicateIdentifier(
                id.clone(),
                source.to_string(),
            ));
        }
    }
    Ok(())
}
