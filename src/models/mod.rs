/// Regression strategies and their supporting machinery
///
/// This module provides:
/// - `StandardScaler` fitted on training rows only
/// - Four interchangeable strategies behind the `Regressor` trait: ordinary
///   least squares, degree-2 polynomial ridge, epsilon-SVR and a bagged
///   regression-tree forest
/// - `RegressionModel`, the closed tagged union persisted with each artifact
/// - Chronological cross-validation and RMSE / MAE / R² metrics

pub mod forest;
pub mod kind;
pub mod linalg;
pub mod linear;
pub mod metrics;
pub mod polynomial;
pub mod scaler;
pub mod svr;
pub mod traits;
pub mod validation;

pub use forest::{ForestParams, RandomForest, RegressionTree, TreeNode};
pub use kind::{ModelKind, RegressionModel};
pub use linear::{LinearParams, LinearRegression};
pub use metrics::{mae, r2, rmse, RegressionMetrics};
pub use polynomial::{PolynomialParams, PolynomialRidge};
pub use scaler::StandardScaler;
pub use svr::{EpsilonSvr, SvrParams};
pub use traits::Regressor;
pub use validation::{Fold, TimeSeriesSplit};
