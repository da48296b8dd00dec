use serde_json::Value;

fn dot(a: &[f64], b: &[f64]) -> f64 {
    // Positions past the shorter vector multiply against an implicit zero.
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn magnitude(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Cosine of the angle between `a` and `b`. Zero when either side has zero
/// magnitude (including empty vectors). Not clamped.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let denom = magnitude(a) * magnitude(b);
    if denom == 0.0 {
        return 0.0;
    }
    dot(a, b) / denom
}

/// Decode a stored `archetype_vector_json` column.
///
/// Anything that is not a JSON array decodes to an empty vector. Elements
/// are coerced to numbers (numeric strings parse, booleans are 0/1, null is
/// 0) and anything that does not land on a finite number is dropped, so a
/// corrupt row shortens rather than fails.
pub fn parse_feature_vector(raw: Option<&str>) -> Vec<f64> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    if raw.is_empty() {
        return Vec::new();
    }
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(coerce_number)
        .filter(|n| n.is_finite())
        .collect()
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Some(0.0)
            } else {
                s.parse::<f64>().ok()
            }
        }
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_and_orthogonal_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn zero_magnitude_scores_zero() {
        assert_eq!(cosine_similarity(&[], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn trailing_elements_still_count_toward_magnitude() {
        // dot = 1, |a| = 1, |b| = sqrt(2)
        let score = cosine_similarity(&[1.0], &[1.0, 1.0]);
        assert_eq!(round_to(score, 4), 0.7071);
        assert_eq!(score, cosine_similarity(&[1.0, 1.0], &[1.0]));
    }

    #[test]
    fn opposite_vectors_are_not_clamped() {
        assert_eq!(round_to(cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]), 4), -1.0);
    }

    #[test]
    fn parses_numeric_array_and_drops_junk() {
        assert_eq!(parse_feature_vector(Some(r#"[1,2,"x",3]"#)), vec![1.0, 2.0, 3.0]);
        assert_eq!(
            parse_feature_vector(Some(r#"[0.31, "0.64", true, null, {"a":1}, [2]]"#)),
            vec![0.31, 0.64, 1.0, 0.0]
        );
    }

    #[test]
    fn malformed_input_is_empty() {
        assert!(parse_feature_vector(None).is_empty());
        assert!(parse_feature_vector(Some("")).is_empty());
        assert!(parse_feature_vector(Some("not json")).is_empty());
        assert!(parse_feature_vector(Some(r#"{"v":[1,2]}"#)).is_empty());
        assert!(parse_feature_vector(Some("42")).is_empty());
    }

    #[test]
    fn round_half_away_from_zero() {
        assert_eq!(round_to(0.125, 2), 0.13);
        assert_eq!(round_to(-0.125, 2), -0.13);
        assert_eq!(round_to(0.375, 2), 0.38);
        assert_eq!(round_to(0.70710678, 4), 0.7071);
        assert_eq!(round_to(118.3, 2), 118.3);
    }
}
