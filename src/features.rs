use serde_json::Value;

/// Authoritative input order; must match the order the model was trained on.
pub const FEATURES: [&str; 8] = [
    "Pregnancies",
    "Glucose",
    "BloodPressure",
    "SkinThickness",
    "Insulin",
    "BMI",
    "DiabetesPedigreeFunction",
    "Age",
];

/// One-row input frame carrying the column labels the model was trained with,
/// so the artifact can run its name-based column check before predicting.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    values: [Option<f64>; 8],
}

impl FeatureFrame {
    pub fn from_values(values: [Option<f64>; 8]) -> Self {
        Self { values }
    }

    pub fn columns() -> &'static [&'static str] {
        &FEATURES
    }

    pub fn values(&self) -> &[Option<f64>; 8] {
        &self.values
    }
}

/// Build a one-row frame from a loose key-value payload (form or JSON body).
/// Never fails: absent, empty, or unparsable fields become missing markers
/// and are imputed downstream. This leniency is kept for compatibility with
/// existing clients.
pub fn coerce(payload: &serde_json::Map<String, Value>) -> FeatureFrame {
    let mut values = [None; 8];
    for (slot, name) in values.iter_mut().zip(FEATURES) {
        *slot = coerce_value(payload.get(name));
    }
    FeatureFrame { values }
}

fn coerce_value(raw: Option<&Value>) -> Option<f64> {
    match raw {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => coerce_str(s),
        Some(_) => None,
    }
}

fn coerce_str(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    // Fallback: strip thousands-separator commas, e.g. "1,234.5". Strings
    // like "nan" and "inf" parse as non-finite floats; those are missing
    // measurements, not values the pipeline can scale.
    s.parse::<f64>()
        .ok()
        .or_else(|| s.replace(',', "").parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
