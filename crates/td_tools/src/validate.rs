//! Data validation utilities.
//!
//! Catalog files are RON lists of `BuildingData`; board config files are a
//! single `BoardConfig`. Every catalog found is also checked against every
//! board config found (or the default config when there is none), which
//! catches footprints that cannot fit their grid.

use std::path::{Path, PathBuf};

use thiserror::Error;

use td_core::board::Board;
use td_core::catalog::BuildingCatalog;
use td_core::config::BoardConfig;
use td_core::error::ConfigError;

/// Why validation failed.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// File or directory could not be read.
    #[error("{}: {source}", path.display())]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// File parsed but its content is invalid, or did not parse at all.
    #[error("{}: {source}", path.display())]
    Invalid {
        /// Offending path.
        path: PathBuf,
        /// What was wrong.
        source: ConfigError,
    },
    /// A catalog does not fit a board config.
    #[error("catalog {} does not fit board {}: {source}", catalog.display(), board.display())]
    Mismatch {
        /// Catalog file.
        catalog: PathBuf,
        /// Board config file, or `<default>`.
        board: PathBuf,
        /// What was wrong.
        source: ConfigError,
    },
    /// No RON files were found.
    #[error("no .ron files found in {}", .0.display())]
    Empty(PathBuf),
}

/// What a data file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    /// A list of building definitions.
    Catalog,
    /// A board config.
    Board,
}

/// Guess a file's kind from its first meaningful character.
#[must_use]
pub fn classify(contents: &str) -> DataKind {
    let first = contents
        .lines()
        .map(str::trim_start)
        .find(|line| !line.is_empty() && !line.starts_with("//"))
        .and_then(|line| line.chars().next());
    if first == Some('[') {
        DataKind::Catalog
    } else {
        DataKind::Board
    }
}

/// Files that passed validation.
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Catalog files with their type counts.
    pub catalogs: Vec<(PathBuf, usize)>,
    /// Board config files.
    pub boards: Vec<PathBuf>,
}

impl ValidationReport {
    /// Number of files validated.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.catalogs.len() + self.boards.len()
    }
}

fn read(path: &Path) -> Result<String, ValidationError> {
    std::fs::read_to_string(path).map_err(|source| ValidationError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn ron_files(dir: &Path) -> Result<Vec<PathBuf>, ValidationError> {
    let io = |source| ValidationError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io)? {
        let path = entry.map_err(io)?.path();
        if path.is_dir() {
            files.extend(ron_files(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "ron") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Validate a single file or every `.ron` file under a directory.
///
/// # Errors
///
/// Returns the first file that fails to read, parse or validate, or the
/// first catalog that does not fit a board config.
pub fn validate_path(path: &Path) -> Result<ValidationReport, ValidationError> {
    let files = if path.is_dir() {
        ron_files(path)?
    } else {
        vec![path.to_path_buf()]
    };
    if files.is_empty() {
        return Err(ValidationError::Empty(path.to_path_buf()));
    }

    let mut catalogs: Vec<(PathBuf, BuildingCatalog)> = Vec::new();
    let mut boards: Vec<(PathBuf, BoardConfig)> = Vec::new();

    for file in files {
        let contents = read(&file)?;
        let invalid = |source| ValidationError::Invalid {
            path: file.clone(),
            source,
        };
        match classify(&contents) {
            DataKind::Catalog => {
                let catalog = BuildingCatalog::from_ron_str(&contents).map_err(invalid)?;
                tracing::info!(path = %file.display(), types = catalog.len(), "Catalog valid");
                catalogs.push((file, catalog));
            }
            DataKind::Board => {
                let config = BoardConfig::from_ron_str(&contents).map_err(invalid)?;
                tracing::info!(path = %file.display(), "Board config valid");
                boards.push((file, config));
            }
        }
    }

    if boards.is_empty() && !catalogs.is_empty() {
        boards.push((PathBuf::from("<default>"), BoardConfig::default()));
    }
    for (catalog_path, catalog) in &catalogs {
        for (board_path, config) in &boards {
            Board::new(config.clone(), catalog.clone()).map_err(|source| ValidationError::Mismatch {
                catalog: catalog_path.clone(),
                board: board_path.clone(),
                source,
            })?;
        }
    }

    Ok(ValidationReport {
        catalogs: catalogs.into_iter().map(|(p, c)| (p, c.len())).collect(),
        boards: boards
            .into_iter()
            .map(|(p, _)| p)
            .filter(|p| p.as_os_str() != "<default>")
            .collect(),
    })
}
