use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array1, Array2};
use serde_json::{json, Map, Value};

use crate::error::TrainError;
use crate::features::FEATURES;

pub const DATA_FILE: &str = "diabetes_user.csv";
pub const LABEL: &str = "Outcome";

/// Zero is physiologically impossible for these columns; the dataset uses it
/// as a "not measured" sentinel, so it becomes a missing value before
/// imputation.
const ZERO_AS_MISSING: [&str; 5] = ["Glucose", "BloodPressure", "SkinThickness", "Insulin", "BMI"];

fn expected_columns() -> Vec<String> {
    FEATURES
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once(LABEL.to_string()))
        .collect()
}

/// Load the labeled training table. The header must be exactly the 8
/// features plus the label, in order; zero sentinels become NaN. Missing
/// values are carried as NaN into the fitting stage.
pub fn load_training_data(path: &Path) -> Result<(Array2<f64>, Array1<i32>), TrainError> {
    if !path.exists() {
        return Err(TrainError::DataNotFound(path.to_path_buf()));
    }
    let mut reader =
        csv::Reader::from_path(path).map_err(|e| TrainError::DataUnreadable(e.to_string()))?;

    let found: Vec<String> = reader
        .headers()
        .map_err(|e| TrainError::DataUnreadable(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();
    let expected = expected_columns();
    if found != expected {
        return Err(TrainError::SchemaMismatch { expected, found });
    }

    let sentinel_columns: Vec<usize> = FEATURES
        .iter()
        .enumerate()
        .filter(|(_, name)| ZERO_AS_MISSING.contains(name))
        .map(|(i, _)| i)
        .collect();

    let mut flat = Vec::new();
    let mut labels = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| TrainError::DataUnreadable(e.to_string()))?;
        for (i, name) in FEATURES.iter().enumerate() {
            let cell = record.get(i).unwrap_or("");
            let value: f64 = cell.trim().parse().map_err(|_| {
                TrainError::DataUnreadable(format!(
                    "row {}: bad value {:?} for {}",
                    row + 2,
                    cell,
                    name
                ))
            })?;
            if value == 0.0 && sentinel_columns.contains(&i) {
                flat.push(f64::NAN);
            } else {
                flat.push(value);
            }
        }
        let cell = record.get(FEATURES.len()).unwrap_or("");
        let outcome: f64 = cell.trim().parse().map_err(|_| {
            TrainError::DataUnreadable(format!("row {}: bad label {:?}", row + 2, cell))
        })?;
        labels.push(outcome as i32);
    }

    let n = labels.len();
    let x = Array2::from_shape_vec((n, FEATURES.len()), flat)
        .map_err(|e| TrainError::DataUnreadable(e.to_string()))?;
    Ok((x, Array1::from(labels)))
}

/// All rows of the dataset as JSON records, keyed by column name. Numeric
/// cells come back as numbers (integral values without a fraction), anything
/// else as the raw string.
pub fn read_records(path: &Path) -> Result<Vec<Map<String, Value>>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open dataset at {}", path.display()))?;
    let headers = reader.headers().context("failed to read CSV header")?.clone();

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.context("failed to read CSV row")?;
        let mut object = Map::new();
        for (name, cell) in headers.iter().zip(record.iter()) {
            object.insert(name.to_string(), cell_value(cell));
        }
        records.push(object);
    }
    Ok(records)
}

fn cell_value(cell: &str) -> Value {
    match cell.trim().parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => json!(v as i64),
        Ok(v) => json!(v),
        Err(_) => json!(cell),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str =
        "Pregnancies,Glucose,BloodPressure,SkinThickness,Insulin,BMI,DiabetesPedigreeFunction,Age,Outcome";

    fn write_csv(dir: &Path, lines: &[&str]) -> std::path::PathBuf {
        let path = dir.join("diabetes_user.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn missing_file_is_data_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_training_data(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, TrainError::DataNotFound(_)));
    }

    #[test]
    fn wrong_column_order_is_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            &[
                "Glucose,Pregnancies,BloodPressure,SkinThickness,Insulin,BMI,DiabetesPedigreeFunction,Age,Outcome",
                "148,6,72,35,0,33.6,0.627,50,1",
            ],
        );
        let err = load_training_data(&path).unwrap_err();
        assert!(matches!(err, TrainError::SchemaMismatch { .. }));
    }

    #[test]
    fn extra_column_is_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            &[&format!("{},Extra", HEADER), "6,148,72,35,0,33.6,0.627,50,1,9"],
        );
        let err = load_training_data(&path).unwrap_err();
        assert!(matches!(err, TrainError::SchemaMismatch { .. }));
    }

    #[test]
    fn zero_sentinels_become_missing_but_real_zeros_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            &[
                HEADER,
                // Pregnancies=0 is a legitimate value; Glucose=0 and Insulin=0 are not.
                "0,0,72,35,0,33.6,0.627,50,1",
            ],
        );
        let (x, y) = load_training_data(&path).unwrap();
        assert_eq!(x[[0, 0]], 0.0, "Pregnancies zero is a real measurement");
        assert!(x[[0, 1]].is_nan(), "Glucose zero is a sentinel");
        assert!(x[[0, 4]].is_nan(), "Insulin zero is a sentinel");
        assert_eq!(x[[0, 5]], 33.6);
        assert_eq!(y[0], 1);
    }

    #[test]
    fn unparsable_cell_is_reported_with_its_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), &[HEADER, "6,abc,72,35,0,33.6,0.627,50,1"]);
        let err = load_training_data(&path).unwrap_err();
        assert!(err.to_string().contains("row 2"));
        assert!(err.to_string().contains("Glucose"));
    }

    #[test]
    fn records_preserve_names_and_numeric_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            &[
                HEADER,
                "6,148,72,35,0,33.6,0.627,50,1",
                "1,85,66,29,0,26.6,0.351,31,0",
            ],
        );
        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Pregnancies"], json!(6));
        assert_eq!(records[0]["BMI"], json!(33.6));
        assert_eq!(records[1]["Outcome"], json!(0));
    }
}
