//! Offline checks for a directory of JSON service definitions

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use wicket_registry::{find_conflict, parse_definition, ServiceDefinition};

/// Problem found in one definition file
#[derive(Debug, Clone)]
pub struct Problem {
    pub file: PathBuf,
    pub message: String,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file.display(), self.message)
    }
}

/// Result of checking a definitions directory
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub valid: Vec<ServiceDefinition>,
    pub problems: Vec<Problem>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Check every `*.json` file under `directory`.
///
/// Unlike a bootstrap load this does not stop at the first bad file, and it
/// also reports definitions that bootstrap would skip as overlapping an
/// earlier file.
pub fn validate_directory(directory: &Path) -> Result<ValidationReport> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)
        .with_context(|| format!("Failed to read definitions directory {:?}", directory))?
    {
        let path = entry?.path();
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json && path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    let mut report = ValidationReport::default();
    for file in files {
        let parsed = std::fs::read_to_string(&file)
            .map_err(|e| e.to_string())
            .and_then(|contents| parse_definition(&file, &contents).map_err(|e| e.to_string()));

        match parsed {
            Ok(definition) => {
                if let Some((dimension, existing)) = find_conflict(&report.valid, &definition) {
                    report.problems.push(Problem {
                        file,
                        message: format!(
                            "{} overlaps {} on {} and would be skipped",
                            definition.name, existing.name, dimension
                        ),
                    });
                } else {
                    report.valid.push(definition);
                }
            }
            Err(message) => report.problems.push(Problem { file, message }),
        }
    }

    Ok(report)
}
