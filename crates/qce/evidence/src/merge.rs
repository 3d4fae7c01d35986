//! Merge strategies for derived evidence fields.

use qce_contracts::MergeStrategy;
use serde_json::Value;

/// Combine resolved source values with `strategy`.
///
/// Returns `default` when there is nothing to combine, including numeric
/// strategies over sources that hold no numbers. A numeric result that
/// overflows to a non-finite value is discarded with a warning and also
/// falls back to `default`.
pub fn merge_values(
    values: &[Value],
    strategy: MergeStrategy,
    weights: Option<&[f64]>,
    default: Option<&Value>,
) -> Option<Value> {
    let fallback = || default.cloned();
    if values.is_empty() {
        return fallback();
    }

    match strategy {
        MergeStrategy::First => values.first().cloned(),
        MergeStrategy::Last => values.last().cloned(),
        MergeStrategy::Concat => {
            let mut merged = Vec::new();
            for value in values {
                match value {
                    Value::Array(items) => merged.extend(items.iter().cloned()),
                    other => merged.push(other.clone()),
                }
            }
            Some(Value::Array(merged))
        }
        MergeStrategy::Majority => majority(values).cloned(),
        MergeStrategy::Mean | MergeStrategy::Max | MergeStrategy::Min | MergeStrategy::WeightedMean => {
            let numbers: Vec<f64> = values.iter().filter_map(as_number).collect();
            if numbers.is_empty() {
                return fallback();
            }
            let result = match strategy {
                MergeStrategy::Mean => numbers.iter().sum::<f64>() / numbers.len() as f64,
                MergeStrategy::Max => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                MergeStrategy::Min => numbers.iter().copied().fold(f64::INFINITY, f64::min),
                _ => weighted_mean(&numbers, weights),
            };
            if !result.is_finite() {
                tracing::warn!(
                    strategy = ?strategy,
                    sources = numbers.len(),
                    result = %result,
                    "Non-finite merge result discarded"
                );
                return fallback();
            }
            Some(Value::from(result))
        }
    }
}

/// Numbers, and strings that parse as finite numbers. Booleans are not
/// numbers.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|x| x.is_finite()),
        _ => None,
    }
}

/// Weights pair with values positionally; surplus values without a weight
/// are dropped, and missing or empty weights mean equal weighting.
fn weighted_mean(numbers: &[f64], weights: Option<&[f64]>) -> f64 {
    let weights: Vec<f64> = match weights {
        Some(w) if !w.is_empty() => w.iter().take(numbers.len()).copied().collect(),
        _ => vec![1.0; numbers.len()],
    };
    let total: f64 = weights.iter().sum();
    let total = if total == 0.0 { 1.0 } else { total };
    numbers.iter().zip(&weights).map(|(x, w)| x * w).sum::<f64>() / total
}

/// Most frequent value; ties go to the value seen first.
fn majority(values: &[Value]) -> Option<&Value> {
    let mut counts: Vec<(&Value, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }
    let mut best: Option<(&Value, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}
