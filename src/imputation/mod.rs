/// Level 1: gap filling and data-quality reporting
///
/// `KnnImputer` replaces every missing reading with a distance-weighted
/// average of the k most similar observed hours. `validate_frame` reports
/// missing counts and IQR outliers before and after imputation.

pub mod knn;
pub mod quality;

pub use knn::{Imputation, ImputationStats, ImputerColumn, KnnImputer};
pub use quality::{count_outliers_iqr, validate_frame, ImputationReport, PollutantQuality};
