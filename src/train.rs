use std::collections::BTreeMap;

use linfa::prelude::*;
use linfa_logistic::LogisticRegression;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::TrainError;
use crate::features::{FeatureFrame, FEATURES};
use crate::model::ModelArtifact;

pub const SEED: u64 = 42;
pub const HOLDOUT_FRACTION: f64 = 0.2;
pub const MAX_ITERATIONS: u64 = 2000;

#[derive(Debug)]
pub struct TrainedModel {
    pub artifact: ModelArtifact,
    pub holdout_accuracy: f64,
}

/// Deterministic stratified train/holdout index split: per class, shuffle
/// with the seeded RNG and carve off `test_fraction`. Same seed, same split,
/// every run.
pub fn stratified_split(
    labels: &Array1<i32>,
    test_fraction: f64,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    let mut by_class: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (i, y) in labels.iter().enumerate() {
        by_class.entry(*y).or_default().push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();
    for (_, mut indices) in by_class {
        indices.shuffle(&mut rng);
        let n_test = (indices.len() as f64 * test_fraction).round() as usize;
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

/// Fit the impute -> standardize -> logistic pipeline on an 80/20 stratified
/// split and score the holdout through the finished artifact, so evaluation
/// exercises the exact code path the server runs.
pub fn fit(x: &Array2<f64>, y: &Array1<i32>) -> Result<TrainedModel, TrainError> {
    let (train_idx, test_idx) = stratified_split(y, HOLDOUT_FRACTION, SEED);
    if train_idx.is_empty() || test_idx.is_empty() {
        return Err(TrainError::TrainingFailed(format!(
            "not enough rows to split: {} total",
            y.len()
        )));
    }

    let x_train = x.select(Axis(0), &train_idx);
    let y_train = y.select(Axis(0), &train_idx);
    let x_test = x.select(Axis(0), &test_idx);
    let y_test = y.select(Axis(0), &test_idx);

    // Imputer stage: per-column medians over the train split, NaN ignored.
    let mut medians = Vec::with_capacity(x_train.ncols());
    for (i, column) in x_train.columns().into_iter().enumerate() {
        medians.push(nan_median(column).ok_or_else(|| {
            TrainError::TrainingFailed(format!("column {} has no observed values", FEATURES[i]))
        })?);
    }
    let mut x_imputed = x_train.to_owned();
    impute(&mut x_imputed, &medians);

    // Scaler stage: population mean/std on the imputed train split.
    let (means, stds) = column_stats(&x_imputed);
    standardize(&mut x_imputed, &means, &stds);

    // Classifier stage is delegated wholesale to linfa.
    let dataset = Dataset::new(x_imputed, y_train);
    let fitted = LogisticRegression::default()
        .max_iterations(MAX_ITERATIONS)
        .fit(&dataset)
        .map_err(|e| TrainError::TrainingFailed(e.to_string()))?;

    let artifact = ModelArtifact {
        feature_names: FEATURES.iter().map(|s| s.to_string()).collect(),
        medians,
        means,
        stds,
        intercept: fitted.intercept(),
        weights: fitted.params().to_vec(),
    };

    let mut correct = 0usize;
    for (row, label) in x_test.outer_iter().zip(y_test.iter()) {
        let frame = frame_from_row(row);
        let (predicted, _) = artifact
            .predict(&frame)
            .map_err(|e| TrainError::TrainingFailed(e.to_string()))?;
        if predicted == *label {
            correct += 1;
        }
    }
    let holdout_accuracy = correct as f64 / test_idx.len() as f64;

    Ok(TrainedModel {
        artifact,
        holdout_accuracy,
    })
}

fn frame_from_row(row: ArrayView1<f64>) -> FeatureFrame {
    let mut values = [None; 8];
    for (slot, v) in values.iter_mut().zip(row.iter()) {
        if !v.is_nan() {
            *slot = Some(*v);
        }
    }
    FeatureFrame::from_values(values)
}

fn nan_median(column: ArrayView1<f64>) -> Option<f64> {
    let mut observed: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
    if observed.is_empty() {
        return None;
    }
    observed.sort_by(f64::total_cmp);
    let mid = observed.len() / 2;
    Some(if observed.len() % 2 == 0 {
        (observed[mid - 1] + observed[mid]) / 2.0
    } else {
        observed[mid]
    })
}

fn impute(x: &mut Array2<f64>, medians: &[f64]) {
    for ((_, j), value) in x.indexed_iter_mut() {
        if value.is_nan() {
            *value = medians[j];
        }
    }
}

fn column_stats(x: &Array2<f64>) -> (Vec<f64>, Vec<f64>) {
    let n = x.nrows() as f64;
    let mut means = Vec::with_capacity(x.ncols());
    let mut stds = Vec::with_capacity(x.ncols());
    for column in x.columns() {
        let mean = column.sum() / n;
        let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        means.push(mean);
        // Constant columns keep unit scale instead of dividing by zero.
        stds.push(if std == 0.0 { 1.0 } else { std });
    }
    (means, stds)
}

fn standardize(x: &mut Array2<f64>, means: &[f64], stds: &[f64]) {
    for ((_, j), value) in x.indexed_iter_mut() {
        *value = (*value - means[j]) / stds[j];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Separable synthetic table: class 1 has high glucose, class 0 low.
    fn synthetic_data(rows_per_class: usize) -> (Array2<f64>, Array1<i32>) {
        let mut flat = Vec::new();
        let mut labels = Vec::new();
        for i in 0..rows_per_class {
            let jitter = i as f64;
            flat.extend_from_slice(&[2.0, 85.0 + jitter, 66.0, 29.0, 90.0, 26.6, 0.35, 31.0]);
            labels.push(0);
            flat.extend_from_slice(&[6.0, 170.0 + jitter, 72.0, 35.0, 168.0, 33.6, 0.63, 50.0]);
            labels.push(1);
        }
        let x = Array2::from_shape_vec((rows_per_class * 2, 8), flat).unwrap();
        (x, Array1::from(labels))
    }

    #[test]
    fn split_is_reproducible_and_stratified() {
        let (_, y) = synthetic_data(25);
        let (train_a, test_a) = stratified_split(&y, 0.2, SEED);
        let (train_b, test_b) = stratified_split(&y, 0.2, SEED);
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);

        assert_eq!(test_a.len(), 10);
        assert_eq!(train_a.len(), 40);
        let positives_in_test = test_a.iter().filter(|&&i| y[i] == 1).count();
        assert_eq!(positives_in_test, 5, "each class contributes 20%");

        let (_, test_other_seed) = stratified_split(&y, 0.2, SEED + 1);
        assert_ne!(test_a, test_other_seed);
    }

    #[test]
    fn split_never_leaks_indices() {
        let (_, y) = synthetic_data(20);
        let (train, test) = stratified_split(&y, 0.2, SEED);
        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..y.len()).collect::<Vec<_>>());
    }

    #[test]
    fn fit_learns_a_separable_boundary() {
        let (x, y) = synthetic_data(25);
        let trained = fit(&x, &y).unwrap();
        assert!(
            trained.holdout_accuracy > 0.9,
            "holdout accuracy {} too low for separable data",
            trained.holdout_accuracy
        );
        assert_eq!(trained.artifact.feature_names.len(), 8);
        assert_eq!(trained.artifact.weights.len(), 8);
        // Glucose separates the classes, so its weight must be positive.
        assert!(trained.artifact.weights[1] > 0.0);
    }

    #[test]
    fn fit_imputes_zero_sentinel_glucose_instead_of_learning_it() {
        let (mut x, y) = synthetic_data(25);
        // Simulate the loader's sentinel cleaning on a few cells.
        x[[0, 1]] = f64::NAN;
        x[[1, 1]] = f64::NAN;
        let trained = fit(&x, &y).unwrap();
        let glucose_median = trained.artifact.medians[1];
        assert!(glucose_median > 50.0, "median {} reflects observed values only", glucose_median);

        // Repeated runs produce the identical artifact: same split, same fit.
        let again = fit(&x, &y).unwrap();
        assert_eq!(trained.artifact, again.artifact);
        assert_eq!(trained.holdout_accuracy, again.holdout_accuracy);
    }

    #[test]
    fn single_class_data_fails_training() {
        let x = array![
            [1.0, 100.0, 70.0, 20.0, 80.0, 25.0, 0.5, 30.0],
            [2.0, 110.0, 72.0, 22.0, 85.0, 26.0, 0.4, 35.0],
            [3.0, 120.0, 74.0, 24.0, 90.0, 27.0, 0.3, 40.0],
            [4.0, 130.0, 76.0, 26.0, 95.0, 28.0, 0.2, 45.0],
            [5.0, 140.0, 78.0, 28.0, 99.0, 29.0, 0.1, 50.0],
        ];
        let y = Array1::from(vec![1, 1, 1, 1, 1]);
        let err = fit(&x, &y).unwrap_err();
        assert!(matches!(err, TrainError::TrainingFailed(_)));
    }

    #[test]
    fn all_missing_column_fails_training() {
        let (mut x, y) = synthetic_data(10);
        x.column_mut(3).fill(f64::NAN);
        let err = fit(&x, &y).unwrap_err();
        assert!(err.to_string().contains("SkinThickness"));
    }
}
