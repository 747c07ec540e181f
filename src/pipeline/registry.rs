use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use indexmap::IndexMap;
use log::{info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

use crate::data::Pollutant;
use crate::error::{ForecastError, Result};
use crate::forecast::{PollutantForecaster, TrainingMetrics};
use crate::imputation::KnnImputer;
use crate::models::ModelKind;

/// Lifecycle state of one location's models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    Untrained,
    Training,
    Ready,
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelState::Untrained => "untrained",
            ModelState::Training => "training",
            ModelState::Ready => "ready",
        };
        f.write_str(s)
    }
}

/// The complete, immutable set of fitted components for one location: the
/// imputer and one ready forecaster per pollutant, all from one training run.
#[derive(Debug)]
pub struct ModelSet {
    location: String,
    generation: DateTime<Utc>,
    kind: ModelKind,
    imputer: KnnImputer,
    forecasters: IndexMap<Pollutant, PollutantForecaster>,
}

impl ModelSet {
    /// Assemble a set, rejecting anything short of six ready forecasters of
    /// one kind and a fully fitted imputer.
    pub fn new<L, I>(location: L, generation: DateTime<Utc>, imputer: KnnImputer, forecasters: I) -> Result<Self>
    where
        L: Into<String>,
        I: IntoIterator<Item = PollutantForecaster>,
    {
        let location = location.into();
        if !imputer.is_fitted() {
            return Err(ForecastError::invalid_parameter(format!(
                "model set for '{}' has an unfitted imputer",
                location
            )));
        }

        let mut by_pollutant: IndexMap<Pollutant, PollutantForecaster> = IndexMap::with_capacity(Pollutant::COUNT);
        for forecaster in forecasters {
            if !forecaster.is_ready() {
                return Err(ForecastError::model_not_ready(location.clone(), ForecastError::NotFitted));
            }
            by_pollutant.insert(forecaster.pollutant(), forecaster);
        }
        let missing: Vec<&str> = Pollutant::ALL
            .iter()
            .filter(|p| !by_pollutant.contains_key(*p))
            .map(|p| p.code())
            .collect();
        if !missing.is_empty() {
            return Err(ForecastError::invalid_parameter(format!(
                "model set for '{}' lacks {}",
                location,
                missing.join(", ")
            )));
        }
        by_pollutant.sort_by(|a, _, b, _| a.index().cmp(&b.index()));

        let kind = by_pollutant[0].kind();
        if by_pollutant.values().any(|f| f.kind() != kind) {
            return Err(ForecastError::invalid_parameter(format!(
                "model set for '{}' mixes model kinds",
                location
            )));
        }

        Ok(Self { location, generation, kind, imputer, forecasters: by_pollutant })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn generation(&self) -> DateTime<Utc> {
        self.generation
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn imputer(&self) -> &KnnImputer {
        &self.imputer
    }

    pub fn forecaster(&self, pollutant: Pollutant) -> Option<&PollutantForecaster> {
        self.forecasters.get(&pollutant)
    }

    pub fn forecasters(&self) -> impl Iterator<Item = &PollutantForecaster> {
        self.forecasters.values()
    }

    pub fn metrics(&self) -> IndexMap<Pollutant, TrainingMetrics> {
        self.forecasters
            .iter()
            .filter_map(|(p, f)| f.model().map(|m| (*p, m.metrics.clone())))
            .collect()
    }
}

/// Registry entry for one location
#[derive(Debug, Clone)]
pub struct LocationSlot {
    pub state: ModelState,
    pub models: Option<Arc<ModelSet>>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl LocationSlot {
    fn untrained() -> Self {
        Self {
            state: ModelState::Untrained,
            models: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }
}

/// Per-location model sets and their lifecycle state.
///
/// Readers take an `Arc<ModelSet>` snapshot, so a retrain swapping in a new
/// set never changes a prediction already in flight. Training for a location
/// is serialized through its async lock from `training_lock`.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    slots: RwLock<HashMap<String, LocationSlot>>,
    train_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, location: &str) -> ModelState {
        self.slots
            .read()
            .get(location)
            .map(|slot| slot.state)
            .unwrap_or(ModelState::Untrained)
    }

    /// Current ready model set, if any. Still available while a retrain runs.
    pub fn models(&self, location: &str) -> Option<Arc<ModelSet>> {
        self.slots.read().get(location).and_then(|slot| slot.models.clone())
    }

    pub fn slot(&self, location: &str) -> Option<LocationSlot> {
        self.slots.read().get(location).cloned()
    }

    pub fn locations(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.slots.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Lock serializing training and loading for one location.
    pub fn training_lock(&self, location: &str) -> Arc<AsyncMutex<()>> {
        self.train_locks
            .lock()
            .entry(location.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub fn begin_training(&self, location: &str) {
        let mut slots = self.slots.write();
        let slot = slots.entry(location.to_string()).or_insert_with(LocationSlot::untrained);
        slot.state = ModelState::Training;
        slot.updated_at = Utc::now();
    }

    /// Swap in a new model set and mark the location ready.
    pub fn install(&self, set: Arc<ModelSet>) {
        let location = set.location().to_string();
        let generation = set.generation();
        let mut slots = self.slots.write();
        let slot = slots.entry(location.clone()).or_insert_with(LocationSlot::untrained);
        slot.models = Some(set);
        slot.state = ModelState::Ready;
        slot.last_error = None;
        slot.updated_at = Utc::now();
        info!("Installed model set for '{}' (generation {})", location, generation);
    }

    /// Record a failed training run. A previously installed set stays in
    /// place and keeps the location ready.
    pub fn fail_training(&self, location: &str, error: &ForecastError) -> ModelState {
        let mut slots = self.slots.write();
        let slot = slots.entry(location.to_string()).or_insert_with(LocationSlot::untrained);
        slot.state = if slot.models.is_some() {
            warn!("Training for '{}' failed, keeping previous model set: {}", location, error);
            ModelState::Ready
        } else {
            warn!("Training for '{}' failed: {}", location, error);
            ModelState::Untrained
        };
        slot.last_error = Some(error.to_string());
        slot.updated_at = Utc::now();
        slot.state
    }
}
