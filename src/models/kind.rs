use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ModelParams;
use crate::error::{ForecastError, Result};
use crate::models::forest::RandomForest;
use crate::models::linear::LinearRegression;
use crate::models::polynomial::PolynomialRidge;
use crate::models::svr::EpsilonSvr;
use crate::models::traits::Regressor;

/// Selectable regression strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Linear,
    Polynomial,
    Svr,
    #[default]
    RandomForest,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::Linear,
        ModelKind::Polynomial,
        ModelKind::Svr,
        ModelKind::RandomForest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Linear => "linear",
            ModelKind::Polynomial => "polynomial",
            ModelKind::Svr => "svr",
            ModelKind::RandomForest => "random_forest",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "linear" => Ok(ModelKind::Linear),
            "polynomial" | "poly" => Ok(ModelKind::Polynomial),
            "svr" | "svm" => Ok(ModelKind::Svr),
            "random_forest" | "rf" | "forest" | "ensemble" => Ok(ModelKind::RandomForest),
            other => Err(ForecastError::invalid_parameter(format!(
                "unknown model kind '{}' (expected linear, polynomial, svr or random_forest)",
                other
            ))),
        }
    }
}

/// A fitted or unfitted regressor of one of the closed set of strategies.
/// Serialized with its kind tag so an artifact knows how to load itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum RegressionModel {
    Linear(LinearRegression),
    Polynomial(PolynomialRidge),
    Svr(EpsilonSvr),
    RandomForest(RandomForest),
}

impl RegressionModel {
    pub fn new(kind: ModelKind, params: &ModelParams) -> Self {
        match kind {
            ModelKind::Linear => RegressionModel::Linear(LinearRegression::new(params.linear.clone())),
            ModelKind::Polynomial => RegressionModel::Polynomial(PolynomialRidge::new(params.polynomial.clone())),
            ModelKind::Svr => RegressionModel::Svr(EpsilonSvr::new(params.svr.clone())),
            ModelKind::RandomForest => RegressionModel::RandomForest(RandomForest::new(params.forest.clone())),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            RegressionModel::Linear(_) => ModelKind::Linear,
            RegressionModel::Polynomial(_) => ModelKind::Polynomial,
            RegressionModel::Svr(_) => ModelKind::Svr,
            RegressionModel::RandomForest(_) => ModelKind::RandomForest,
        }
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            RegressionModel::Linear(m) => m,
            RegressionModel::Polynomial(m) => m,
            RegressionModel::Svr(m) => m,
            RegressionModel::RandomForest(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            RegressionModel::Linear(m) => m,
            RegressionModel::Polynomial(m) => m,
            RegressionModel::Svr(m) => m,
            RegressionModel::RandomForest(m) => m,
        }
    }
}

impl Regressor for RegressionModel {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        self.inner().predict_row(row)
    }

    fn is_fitted(&self) -> bool {
        self.inner().is_fitted()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }
}
