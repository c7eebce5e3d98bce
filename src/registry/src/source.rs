//! Candidate service definitions supplied from outside the registry

use crate::error::{RegistryError, Result};
use crate::service::ServiceDefinition;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Producer of candidate definitions for bootstrap
#[async_trait]
pub trait ServiceSource: Send + Sync {
    /// Human-readable origin, used in logs
    fn describe(&self) -> String;

    /// All candidates, in the order they should be considered
    async fn load(&self) -> Result<Vec<ServiceDefinition>>;
}

/// Reads one definition per `*.json` file in a directory.
///
/// Files are visited in file-name order. A file that cannot be parsed, or
/// whose pattern does not compile, fails the whole load.
#[derive(Debug, Clone)]
pub struct JsonServiceSource {
    location: PathBuf,
}

impl JsonServiceSource {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    async fn definition_files(&self) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.location).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_json = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("json"))
                .unwrap_or(false);
            if is_json && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}

/// Parse and validate a single definition document
pub fn parse_definition(path: &Path, contents: &str) -> Result<ServiceDefinition> {
    let definition: ServiceDefinition = serde_json::from_str(contents).map_err(|e| {
        RegistryError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
    })?;
    definition.validate()?;
    Ok(definition)
}

#[async_trait]
impl ServiceSource for JsonServiceSource {
    fn describe(&self) -> String {
        format!("JSON definitions at {}", self.location.display())
    }

    async fn load(&self) -> Result<Vec<ServiceDefinition>> {
        let mut definitions = Vec::new();
        for path in self.definition_files().await? {
            let contents = tokio::fs::read_to_string(&path).await?;
            let definition = parse_definition(&path, &contents)?;
            debug!("Read service definition {} from {}", definition, path.display());
            definitions.push(definition);
        }
        Ok(definitions)
    }
}

/// Fixed list of definitions, mostly for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct StaticServiceSource {
    definitions: Vec<ServiceDefinition>,
}

impl StaticServiceSource {
    pub fn new(definitions: impl IntoIterator<Item = ServiceDefinition>) -> Self {
        Self {
            definitions: definitions.into_iter().collect(),
        }
    }
}

#[async_trait]
impl ServiceSource for StaticServiceSource {
    fn describe(&self) -> String {
        format!("{} static definitions", self.definitions.len())
    }

    async fn load(&self) -> Result<Vec<ServiceDefinition>> {
        Ok(self.definitions.clone())
    }
}
