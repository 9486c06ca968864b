//! crates/lorelog_core/src/similarity.rs
//!
//! Cosine similarity and the stored embedding format (a JSON array of numbers
//! kept as text).

use serde_json::Value;

/// Cosine similarity over the shared prefix of `a` and `b`.
///
/// Returns 0.0 when either prefix has zero magnitude. Callers that care about
/// dimension mismatches must check lengths themselves.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

pub fn serialize_embedding(vector: &[f32]) -> String {
    // A slice of finite f32 always serializes; non-finite values become null
    // and are dropped again by `parse_embedding`.
    serde_json::to_string(vector).unwrap_or_else(|_| "[]".to_string())
}

/// Parses a stored embedding. Malformed, absent or empty input yields `None`,
/// which callers treat as "no embedding available".
pub fn parse_embedding(serialized: Option<&str>) -> Option<Vec<f32>> {
    let raw = serialized?.trim();
    if raw.is_empty() {
        return None;
    }

    let values: Vec<Value> = serde_json::from_str(raw).ok()?;
    let vector: Vec<f32> = values
        .iter()
        .filter_map(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
        .filter(|v| v.is_finite())
        .map(|v| v as f32)
        .collect();

    (!vector.is_empty()).then_some(vector)
}
