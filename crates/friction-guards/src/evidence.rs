use crate::DiagnoserFailure;
use friction_core::{FrictionCategory, Modality, Signal};
use std::collections::BTreeSet;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Fraction of `hits` over `total`; zero when there is nothing to divide.
pub fn rate(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

pub fn numeric_values(signals: &[&Signal]) -> Vec<f64> {
    signals.iter().filter_map(|s| s.value.as_numeric()).collect()
}

pub fn modalities_of<'a>(signals: impl IntoIterator<Item = &'a Signal>) -> BTreeSet<Modality> {
    signals.into_iter().filter_map(Signal::modality).collect()
}

/// Rejects statistics that came out NaN or infinite.
pub fn finite(category: FrictionCategory, what: &str, value: f64) -> Result<f64, DiagnoserFailure> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DiagnoserFailure::new(
            category,
            format!("{what} evaluated to {value}"),
        ))
    }
}
