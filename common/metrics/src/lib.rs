//! Thin helpers over the `metrics` facade. Installing an exporter is left to
//! the binary embedding these crates.

use std::borrow::Cow;
use std::time::Instant;

pub type Labels = [(String, String)];

pub fn inc(name: &'static str, labels: &Labels, value: u64) {
    metrics::counter!(name, labels).increment(value);
}

pub fn histogram(name: &'static str, labels: &Labels, value: f64) {
    metrics::histogram!(name, labels).record(value);
}

/// Records the milliseconds between creation and drop into a histogram.
///
/// Labels are borrowed until [`TimingGuard::label`] adds one, so a guard that
/// is never relabelled does not allocate.
pub struct TimingGuard<'a> {
    name: &'static str,
    labels: Cow<'a, Labels>,
    start: Instant,
}

pub fn timing_guard<'a>(name: &'static str, labels: &'a Labels) -> TimingGuard<'a> {
    TimingGuard {
        name,
        labels: Cow::Borrowed(labels),
        start: Instant::now(),
    }
}

impl TimingGuard<'_> {
    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels
            .to_mut()
            .push((key.to_string(), value.to_string()));
        self
    }

    /// Report now instead of at the end of the scope
    pub fn fin(self) {}

    fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for TimingGuard<'_> {
    fn drop(&mut self) {
        histogram(self.name, &self.labels, self.elapsed_ms());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_stay_borrowed_until_extended() {
        let base = vec![("namespace".to_string(), "blog".to_string())];

        let guard = timing_guard("test_duration_ms", &base);
        assert!(matches!(guard.labels, Cow::Borrowed(_)));

        let guard = guard.label("outcome", "hit");
        assert!(matches!(guard.labels, Cow::Owned(_)));
        assert_eq!(
            guard.labels.as_ref(),
            &[
                ("namespace".to_string(), "blog".to_string()),
                ("outcome".to_string(), "hit".to_string()),
            ]
        );
        guard.fin();
    }

    #[test]
    fn test_elapsed_is_non_negative() {
        let guard = timing_guard("test_duration_ms", &[]);
        assert!(guard.elapsed_ms() >= 0.0);
        assert!(guard.labels.is_empty());
    }
}
