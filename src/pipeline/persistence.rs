use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::config::PipelineConfig;
use crate::data::Pollutant;
use crate::error::{ForecastError, Result};
use crate::forecast::{PollutantForecaster, PollutantModel};
use crate::imputation::{ImputerColumn, KnnImputer};
use crate::models::ModelKind;
use crate::pipeline::registry::ModelSet;

/// Bumped whenever the artifact layout changes.
pub const SCHEMA_VERSION: u32 = 1;

/// On-disk form of one pollutant's share of a model set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema_version: u32,
    pub location: String,
    /// Shared by every artifact written from the same training run
    pub generation: DateTime<Utc>,
    pub knn_neighbors: usize,
    pub imputer: ImputerColumn,
    pub model: PollutantModel,
}

/// Directory of persisted model sets, one sub-directory per location.
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn location_dir(&self, location: &str) -> PathBuf {
        self.root.join(location)
    }

    pub fn artifact_path(&self, location: &str, pollutant: Pollutant, kind: ModelKind) -> PathBuf {
        self.location_dir(location)
            .join(format!("{}_{}.json", pollutant.code(), kind.as_str()))
    }

    /// Write all six artifacts, each replaced atomically.
    pub fn save(&self, set: &ModelSet) -> Result<()> {
        let dir = self.location_dir(set.location());
        fs::create_dir_all(&dir)?;

        for forecaster in set.forecasters() {
            let pollutant = forecaster.pollutant();
            let model = forecaster
                .model()
                .ok_or_else(|| ForecastError::persistence(format!("{} forecaster has no model", pollutant)))?;
            let imputer = set
                .imputer()
                .column(pollutant)
                .ok_or_else(|| ForecastError::persistence(format!("imputer has no {} column", pollutant)))?;

            let artifact = ModelArtifact {
                schema_version: SCHEMA_VERSION,
                location: set.location().to_string(),
                generation: set.generation(),
                knn_neighbors: set.imputer().neighbors(),
                imputer: imputer.clone(),
                model: model.clone(),
            };
            let path = self.artifact_path(set.location(), pollutant, set.kind());
            write_atomic(&dir, &path, &serde_json::to_vec(&artifact)?)?;
            debug!("Wrote {}", path.display());
        }

        info!(
            "Saved {} model set for '{}' to {}",
            set.kind(),
            set.location(),
            dir.display()
        );
        Ok(())
    }

    /// Read the location's model set of the given kind.
    ///
    /// Returns `Ok(None)` unless all six artifacts exist and come from one
    /// training run. Unreadable or incompatible artifacts are errors.
    pub fn load(&self, location: &str, kind: ModelKind, config: &PipelineConfig) -> Result<Option<ModelSet>> {
        let mut artifacts = Vec::with_capacity(Pollutant::COUNT);
        let mut missing = Vec::new();
        for pollutant in Pollutant::ALL {
            let path = self.artifact_path(location, pollutant, kind);
            if !path.is_file() {
                missing.push(pollutant.code());
                continue;
            }
            let artifact: ModelArtifact = serde_json::from_slice(&fs::read(&path)?)?;
            check_artifact(&artifact, location, pollutant, &path)?;
            artifacts.push(artifact);
        }

        if missing.len() == Pollutant::COUNT {
            debug!("No persisted {} models for '{}'", kind, location);
            return Ok(None);
        }
        if !missing.is_empty() {
            warn!(
                "Ignoring partial {} model set for '{}' (missing {})",
                kind,
                location,
                missing.join(", ")
            );
            return Ok(None);
        }

        let generation = artifacts[0].generation;
        if artifacts.iter().any(|a| a.generation != generation) {
            warn!("Ignoring {} model set for '{}': artifacts come from different runs", kind, location);
            return Ok(None);
        }

        let neighbors = artifacts[0].knn_neighbors;
        let mut columns = Vec::with_capacity(Pollutant::COUNT);
        let mut forecasters = Vec::with_capacity(Pollutant::COUNT);
        for artifact in artifacts {
            columns.push(artifact.imputer);
            forecasters.push(PollutantForecaster::from_model(artifact.model, config)?);
        }
        let imputer = KnnImputer::from_columns(neighbors, columns)?;
        let set = ModelSet::new(location, generation, imputer, forecasters)?;
        info!("Loaded {} model set for '{}' (generation {})", kind, location, generation);
        Ok(Some(set))
    }

    /// Delete every persisted artifact of a location.
    pub fn remove(&self, location: &str) -> Result<()> {
        let dir = self.location_dir(location);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }
}

fn check_artifact(artifact: &ModelArtifact, location: &str, pollutant: Pollutant, path: &Path) -> Result<()> {
    if artifact.schema_version != SCHEMA_VERSION {
        return Err(ForecastError::persistence(format!(
            "{} has schema version {}, expected {}",
            path.display(),
            artifact.schema_version,
            SCHEMA_VERSION
        )));
    }
    if artifact.location != location || artifact.model.pollutant != pollutant || artifact.imputer.pollutant != pollutant {
        return Err(ForecastError::persistence(format!(
            "{} does not hold the {} model of '{}'",
            path.display(),
            pollutant,
            location
        )));
    }
    Ok(())
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| ForecastError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_layout() {
        let store = ModelStore::new("/var/lib/aqi");
        let path = store.artifact_path("london-gb", Pollutant::Pm25, ModelKind::RandomForest);
        assert_eq!(path, PathBuf::from("/var/lib/aqi/london-gb/pm25_random_forest.json"));
    }

    #[test]
    fn test_empty_store_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let loaded = store.load("london-gb", ModelKind::Linear, &PipelineConfig::default()).unwrap();
        assert!(loaded.is_none());
        store.remove("london-gb").unwrap();
    }

    #[test]
    fn test_corrupt_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        fs::create_dir_all(store.location_dir("paris-fr")).unwrap();
        for pollutant in Pollutant::ALL {
            fs::write(store.artifact_path("paris-fr", pollutant, ModelKind::Svr), b"{not json").unwrap();
        }
        let result = store.load("paris-fr", ModelKind::Svr, &PipelineConfig::default());
        assert!(matches!(result, Err(ForecastError::Serialization(_))));
    }
}
