//! Loader for the per-store sales files.
//!
//! Reads each configured file as a delimited table, tags every row with the
//! store it came from, and concatenates everything into one [`SalesTable`].
//! A missing file is a recoverable skip, not an error.

use crate::config::{ColumnMap, Config, StoreSource};
use crate::models::{Record, SalesTable};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that end a load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed data in '{}': {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("column '{column}' not found in '{}'", .path.display())]
    MissingColumn { path: PathBuf, column: String },
    #[error("invalid value '{value}' for column '{column}' in '{}' at line {line}", .path.display())]
    InvalidNumber {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
    },
}

/// What happened to one configured source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// The file was read; `rows` records were tagged with `store`.
    Loaded {
        path: PathBuf,
        store: String,
        rows: usize,
    },
    /// The file does not exist and was skipped.
    Missing { path: PathBuf, store: String },
}

impl SourceOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, SourceOutcome::Loaded { .. })
    }
}

/// Result of loading every configured source.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// One outcome per configured source, in configuration order.
    pub outcomes: Vec<SourceOutcome>,
    /// Concatenation of every loaded source.
    pub table: SalesTable,
}

impl LoadReport {
    /// Number of sources that were read.
    pub fn loaded_sources(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_loaded()).count()
    }

    /// Sources that were skipped because their file is missing.
    pub fn missing(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.outcomes.iter().filter(|o| !o.is_loaded())
    }

    /// True when there is nothing to report on.
    pub fn is_empty(&self) -> bool {
        self.loaded_sources() == 0 || self.table.is_empty()
    }
}

/// Reads the configured store files.
pub struct Loader {
    data_dir: PathBuf,
    stores: Vec<StoreSource>,
    columns: ColumnMap,
    delimiter: u8,
}

impl Loader {
    /// Create a loader for explicit sources.
    pub fn new(data_dir: PathBuf, stores: Vec<StoreSource>, columns: ColumnMap, delimiter: u8) -> Self {
        Self {
            data_dir,
            stores,
            columns,
            delimiter,
        }
    }

    /// Create a loader from the pipeline configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.paths.data_dir.clone(),
            config.stores.clone(),
            config.columns.clone(),
            config.paths.delimiter as u8,
        )
    }

    /// Load every source in configuration order.
    pub fn load(&self) -> Result<LoadReport, LoadError> {
        let mut report = LoadReport::default();

        for source in &self.stores {
            let path = self.data_dir.join(&source.file);
            let outcome = match File::open(&path) {
                Ok(file) => {
                    let records =
                        read_source(file, &source.name, &self.columns, self.delimiter, &path)?;
                    debug!("Loaded {} rows from {}", records.len(), path.display());
                    let rows = records.len();
                    report.table.extend(records);
                    SourceOutcome::Loaded {
                        path,
                        store: source.name.clone(),
                        rows,
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!("Input file not found, skipping: {}", path.display());
                    SourceOutcome::Missing {
                        path,
                        store: source.name.clone(),
                    }
                }
                Err(source) => return Err(LoadError::Io { path, source }),
            };
            report.outcomes.push(outcome);
        }

        info!(
            "Loaded {} records from {}/{} sources",
            report.table.len(),
            report.loaded_sources(),
            self.stores.len()
        );

        Ok(report)
    }
}

/// Parse one delimited source and tag its rows with `store`.
///
/// `path` is only used for error messages.
pub fn read_source<R: Read>(
    reader: R,
    store: &str,
    columns: &ColumnMap,
    delimiter: u8,
    path: &Path,
) -> Result<Vec<Record>, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let csv_err = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let headers = csv_reader.headers().map_err(csv_err)?.clone();
    let position = |column: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}') == column)
            .ok_or_else(|| LoadError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            })
    };

    let price = position(&columns.price)?;
    let category = position(&columns.category)?;
    let rating = position(&columns.rating)?;
    let shipping = position(&columns.shipping)?;
    let product = position(&columns.product)?;

    let mut records = Vec::new();
    for result in csv_reader.records() {
        let row = result.map_err(csv_err)?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        let text = |index: usize| row.get(index).unwrap_or("").to_string();
        let number = |index: usize, column: &str| {
            let value = row.get(index).unwrap_or("");
            value.parse::<f64>().map_err(|_| LoadError::InvalidNumber {
                path: path.to_path_buf(),
                line,
                column: column.to_string(),
                value: value.to_string(),
            })
        };

        records.push(Record {
            price: number(price, &columns.price)?,
            category: text(category),
            rating: number(rating, &columns.rating)?,
            shipping: number(shipping, &columns.shipping)?,
            product: text(product),
            store: store.to_string(),
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const STORE_A: &str = "\
Produto,Categoria do Produto,Preço,Frete,Data da Compra,Avaliação da compra
Cadeira,moveis,10.0,1.5,01/01/2023,4
Bola,esporte e lazer,20.0,2.0,02/01/2023,5
";

    const STORE_B: &str = "\
Produto,Categoria do Produto,Preço,Frete,Data da Compra,Avaliação da compra
Cadeira,moveis,5.0,0.5,03/01/2023,3
";

    fn loader_for(dir: &Path, stores: Vec<StoreSource>) -> Loader {
        Loader::new(dir.to_path_buf(), stores, ColumnMap::default(), b',')
    }

    #[test]
    fn test_read_source_tags_rows() {
        let records = read_source(
            STORE_A.as_bytes(),
            "Store A",
            &ColumnMap::default(),
            b',',
            Path::new("a.csv"),
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].product, "Cadeira");
        assert_eq!(records[0].category, "moveis");
        assert_eq!(records[1].price, 20.0);
        assert_eq!(records[1].rating, 5.0);
        assert_eq!(records[0].shipping, 1.5);
        assert!(records.iter().all(|r| r.store == "Store A"));
    }

    #[test]
    fn test_read_source_missing_column() {
        let data = "Produto,Preço\nCadeira,10\n";
        let err = read_source(
            data.as_bytes(),
            "Store A",
            &ColumnMap::default(),
            b',',
            Path::new("a.csv"),
        )
        .unwrap_err();

        assert!(matches!(err, LoadError::MissingColumn { ref column, .. } if column == "Categoria do Produto"));
    }

    #[test]
    fn test_read_source_invalid_number() {
        let data = "\
Produto,Categoria do Produto,Preço,Frete,Avaliação da compra
Cadeira,moveis,abc,1.5,4
";
        let err = read_source(
            data.as_bytes(),
            "Store A",
            &ColumnMap::default(),
            b',',
            Path::new("a.csv"),
        )
        .unwrap_err();

        match err {
            LoadError::InvalidNumber { line, value, .. } => {
                assert_eq!(line, 2);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_source_custom_columns_and_delimiter() {
        let columns = ColumnMap {
            price: "price".to_string(),
            category: "category".to_string(),
            rating: "rating".to_string(),
            shipping: "shipping".to_string(),
            product: "product".to_string(),
        };
        let data = "product; category; price; shipping; rating\nLamp; home; 12.5; 1; 2\n";

        let records =
            read_source(data.as_bytes(), "North", &columns, b';', Path::new("n.csv")).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].product, "Lamp");
        assert_eq!(records[0].price, 12.5);
    }

    #[test]
    fn test_load_skips_missing_and_keeps_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.csv"), STORE_A).unwrap();
        fs::write(dir.path().join("b.csv"), STORE_B).unwrap();

        let loader = loader_for(
            dir.path(),
            vec![
                StoreSource::new("b.csv", "Store B"),
                StoreSource::new("missing.csv", "Store M"),
                StoreSource::new("a.csv", "Store A"),
            ],
        );
        let report = loader.load().unwrap();

        assert_eq!(report.loaded_sources(), 2);
        assert_eq!(report.missing().count(), 1);
        assert!(!report.is_empty());

        let tagged: Vec<_> = report
            .table
            .iter()
            .map(|r| (r.store.as_str(), r.price))
            .collect();
        assert_eq!(
            tagged,
            vec![("Store B", 5.0), ("Store A", 10.0), ("Store A", 20.0)]
        );
        assert!(matches!(
            report.outcomes[1],
            SourceOutcome::Missing { ref store, .. } if store == "Store M"
        ));
    }

    #[test]
    fn test_load_all_missing_is_empty_not_error() {
        let dir = TempDir::new().unwrap();
        let loader = loader_for(
            dir.path(),
            vec![
                StoreSource::new("a.csv", "Store A"),
                StoreSource::new("b.csv", "Store B"),
            ],
        );

        let report = loader.load().unwrap();
        assert!(report.is_empty());
        assert_eq!(report.loaded_sources(), 0);
        assert_eq!(report.outcomes.len(), 2);
    }

    #[test]
    fn test_load_header_only_file_is_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("a.csv"),
            "Produto,Categoria do Produto,Preço,Frete,Avaliação da compra\n",
        )
        .unwrap();
        let loader = loader_for(
            dir.path(),
            vec![
                StoreSource::new("a.csv", "Store A"),
                StoreSource::new("b.csv", "Store B"),
            ],
        );

        let report = loader.load().unwrap();
        assert_eq!(report.loaded_sources(), 1);
        assert!(report.table.is_empty());
        assert!(report.is_empty());
        assert_eq!(
            report.outcomes[0],
            SourceOutcome::Loaded {
                path: dir.path().join("a.csv"),
                store: "Store A".to_string(),
                rows: 0,
            }
        );
    }

    #[test]
    fn test_load_propagates_malformed_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.csv"), "Produto,Preço\nCadeira,10\n").unwrap();
        let loader = loader_for(dir.path(), vec![StoreSource::new("a.csv", "Store A")]);

        assert!(loader.load().is_err());
    }
}
