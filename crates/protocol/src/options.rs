//! Pipeline-global options
//!
//! Options apply to every stage of a pipeline and are distributed to
//! workers inside their stage details.

use std::time::Duration;

use serde::Deserialize;

/// How chatty the substrate's per-item tracing is
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    /// No per-item tracing
    Off,
    /// Lifecycle edges only: worker spawn/exit, EOI, handoff (default)
    #[default]
    Lifecycle,
    /// Lifecycle plus one event per item processed
    Verbose,
}

impl TraceLevel {
    /// Whether per-item events should be emitted
    #[inline]
    pub fn per_item(self) -> bool {
        matches!(self, Self::Verbose)
    }

    /// Whether lifecycle events should be emitted
    #[inline]
    pub fn lifecycle(self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// Pipeline-global options
///
/// # Example
///
/// ```toml
/// trace = "verbose"
/// queue_warn_depth = 5000
/// eoi_timeout_ms = 30000
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineOptions {
    /// Trace verbosity
    /// Default: lifecycle
    pub trace: TraceLevel,

    /// Work-queue depth at which a vnode starts warning about backpressure
    /// Default: 10_000
    pub queue_warn_depth: usize,

    /// Maximum time a stage control waits for its workers to drain after
    /// EOI before giving up on the stage. `None` (the default) waits
    /// forever, matching the protocol's barrier semantics.
    pub eoi_timeout_ms: Option<u64>,
}

impl PipelineOptions {
    /// The drain deadline as a `Duration`, if configured
    #[inline]
    pub fn eoi_timeout(&self) -> Option<Duration> {
        self.eoi_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            trace: TraceLevel::Lifecycle,
            queue_warn_depth: 10_000,
            eoi_timeout_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = PipelineOptions::default();
        assert_eq!(opts.trace, TraceLevel::Lifecycle);
        assert_eq!(opts.queue_warn_depth, 10_000);
        assert_eq!(opts.eoi_timeout(), None);
    }

    #[test]
    fn test_deserialize_empty() {
        let opts: PipelineOptions = toml::from_str("").unwrap();
        assert_eq!(opts, PipelineOptions::default());
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
trace = "verbose"
queue_warn_depth = 500
eoi_timeout_ms = 2500
"#;
        let opts: PipelineOptions = toml::from_str(toml).unwrap();
        assert_eq!(opts.trace, TraceLevel::Verbose);
        assert_eq!(opts.queue_warn_depth, 500);
        assert_eq!(opts.eoi_timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_deserialize_all_trace_levels() {
        for (s, expected) in [
            ("off", TraceLevel::Off),
            ("lifecycle", TraceLevel::Lifecycle),
            ("verbose", TraceLevel::Verbose),
        ] {
            let toml = format!("trace = \"{}\"", s);
            let opts: PipelineOptions = toml::from_str(&toml).unwrap();
            assert_eq!(opts.trace, expected);
        }
    }

    #[test]
    fn test_trace_level_predicates() {
        assert!(!TraceLevel::Off.lifecycle());
        assert!(!TraceLevel::Off.per_item());
        assert!(TraceLevel::Lifecycle.lifecycle());
        assert!(!TraceLevel::Lifecycle.per_item());
        assert!(TraceLevel::Verbose.per_item());
    }
}
