//! Gene alignment: the shared, sorted column ordering used to subset the
//! training and testing matrices identically.

use crate::matrix::{self, MatrixError};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlignmentError {
    #[error("Failed to read gene list: {0}")]
    GeneList(#[from] MatrixError),
    #[error(
        "No genes are shared between {0}. Check that both matrices use the same gene identifiers."
    )]
    EmptyIntersection(String),
}

/// Optional restriction on the genes that participate in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneList {
    genes: BTreeSet<String>,
}

impl GeneList {
    /// Single column, no header. Blank lines are skipped, duplicates collapse.
    pub fn from_file(path: &Path) -> Result<Self, AlignmentError> {
        log::info!("Loading gene list from '{}'", path.display());
        let df = matrix::read_tsv(path, false)?;
        let genes = match df.get_columns().first() {
            Some(column) => column
                .str()
                .map_err(MatrixError::from)?
                .into_iter()
                .flatten()
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect(),
            None => BTreeSet::new(),
        };
        let list = Self { genes };
        log::info!("Gene list holds {} identifiers", list.len());
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn contains(&self, gene: &str) -> bool {
        self.genes.contains(gene)
    }
}

impl<S: Into<String>> FromIterator<S> for GeneList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            genes: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// `training ∩ testing`, further restricted to `gene_list` when given.
/// The result is sorted and never empty.
pub fn align_genes(
    training: &[String],
    testing: &[String],
    gene_list: Option<&GeneList>,
) -> Result<Vec<String>, AlignmentError> {
    let testing: BTreeSet<&str> = testing.iter().map(String::as_str).collect();
    let common: BTreeSet<&str> = training
        .iter()
        .map(String::as_str)
        .filter(|g| testing.contains(g))
        .filter(|g| gene_list.is_none_or(|list| list.contains(g)))
        .collect();

    if common.is_empty() {
        let what = if gene_list.is_some() {
            "the gene list, the training matrix and the testing matrix"
        } else {
            "the training and testing matrices"
        };
        return Err(AlignmentError::EmptyIntersection(what.to_string()));
    }

    log::info!(
        "{} genes shared between training ({}) and testing ({}){}",
        common.len(),
        training.len(),
        testing.len(),
        gene_list.map_or(String::new(), |l| format!(" within a gene list of {}", l.len()))
    );
    Ok(common.into_iter().map(str::to_string).collect())
}
