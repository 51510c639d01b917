//! Confidence helpers shared by every stage.
//!
//! All scores in this crate live in `[0.0, 1.0]`. Stages clamp before they
//! publish a score so downstream arithmetic never has to re-check bounds.

/// Fixed confidence the intent recognizer reports for any non-empty question.
pub const INTENT_CONFIDENCE: f64 = 0.8;

/// Clamp a score into `[0.0, 1.0]`. NaN collapses to `0.0`.
pub fn clamp(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Arithmetic mean of the given scores, `0.0` for an empty input.
pub fn mean<I>(scores: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = scores
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), s| (sum + clamp(s), count + 1));
    if count == 0 {
        0.0
    } else {
        clamp(sum / count as f64)
    }
}

/// Final SQL confidence: mean of the entity average and the intent score.
pub fn combine(entity_average: f64, intent_confidence: f64) -> f64 {
    mean([entity_average, intent_confidence])
}
