//! Scroll-driven presentation state.
//!
//! A [`ScrollMonitor`] compares the scroll offset with a set of thresholds
//! and toggles one class per threshold on a target element. Class changes
//! are edge-triggered: a class is added when its threshold is first met and
//! removed when it stops being met, never rewritten in between.
//!
//! Samples can arrive far more often than they need to be evaluated, so the
//! monitor keeps only the latest pending sample and evaluates it either once
//! per frame or at most once per interval.
//!
//! # Example
//!
//! ```rust
//! use std::time::Instant;
//! use marginalia_core::classify::ClassList;
//! use marginalia_core::scroll::{ClassChange, Coalesce, ScrollMonitor, ScrollSample, Threshold};
//!
//! let mut monitor = ScrollMonitor::new(
//!     vec![Threshold::pixels("sticky", 100, "is-sticky")],
//!     ClassList::new(),
//!     Coalesce::PerFrame,
//! );
//!
//! monitor.observe(ScrollSample::at(40), Instant::now());
//! monitor.observe(ScrollSample::at(150), Instant::now());
//! let changes = monitor.on_frame();
//!
//! assert_eq!(changes, vec![ClassChange::Added { threshold: "sticky".into(), class: "is-sticky".into() }]);
//! assert!(monitor.target().has("is-sticky"));
//! ```

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use lol_html::{Settings, element};
use serde::{Deserialize, Serialize};

use crate::classify::{ClassList, update_classes};
use crate::rewrite::{rewrite, validate_selector};
use crate::{MarginaliaError, Result};

/// Where a threshold sits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdOffset {
    /// Absolute offset from the top of the page.
    Pixels(i64),
    /// Fraction (0.0..=1.0) of the scrollable extent.
    Ratio(f64),
}

/// One configured boundary and the class it controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub id: String,
    pub offset: ThresholdOffset,
    pub class: String,
}

impl Threshold {
    pub fn pixels(id: &str, offset: i64, class: &str) -> Self {
        Self { id: id.to_string(), offset: ThresholdOffset::Pixels(offset), class: class.to_string() }
    }

    pub fn ratio(id: &str, ratio: f64, class: &str) -> Self {
        Self { id: id.to_string(), offset: ThresholdOffset::Ratio(ratio), class: class.to_string() }
    }

    /// True when `sample` is at or past this threshold.
    pub fn is_met(&self, sample: &ScrollSample) -> bool {
        match self.offset {
            ThresholdOffset::Pixels(px) => sample.offset >= px,
            ThresholdOffset::Ratio(ratio) => {
                let extent = sample.max_offset.max(0) as f64;
                extent > 0.0 && sample.offset as f64 >= ratio * extent
            }
        }
    }
}

/// One observed scroll position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollSample {
    /// Current offset from the top.
    pub offset: i64,
    /// Largest reachable offset (document height minus viewport height).
    pub max_offset: i64,
}

impl ScrollSample {
    /// A sample with an unknown scrollable extent; ratio thresholds never fire.
    pub fn at(offset: i64) -> Self {
        Self { offset, max_offset: 0 }
    }

    pub fn new(offset: i64, document_height: i64, viewport_height: i64) -> Self {
        Self { offset, max_offset: (document_height - viewport_height).max(0) }
    }
}

/// How often pending samples are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coalesce {
    /// Evaluate on [`ScrollMonitor::on_frame`].
    #[default]
    PerFrame,
    /// Evaluate on [`ScrollMonitor::observe`] when this much time has passed
    /// since the previous evaluation.
    MinInterval(Duration),
}

/// A class mutation produced by crossing a threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ClassChange {
    Added { threshold: String, class: String },
    Removed { threshold: String, class: String },
}

impl ClassChange {
    pub fn class(&self) -> &str {
        match self {
            Self::Added { class, .. } | Self::Removed { class, .. } => class,
        }
    }
}

/// Offset of the last evaluation and the thresholds it satisfied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrollState {
    pub current_offset: i64,
    pub active: BTreeSet<String>,
}

/// Configuration for the scroll monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Selector for the element receiving threshold classes (default: `body`).
    pub target: String,
    /// Minimum milliseconds between evaluations; `None` evaluates per frame.
    pub min_interval_ms: Option<u64>,
    pub thresholds: Vec<Threshold>,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            target: "body".to_string(),
            min_interval_ms: None,
            thresholds: vec![Threshold::pixels("sticky", 100, "is-sticky")],
        }
    }
}

impl ScrollConfig {
    pub fn coalesce(&self) -> Coalesce {
        match self.min_interval_ms {
            Some(ms) => Coalesce::MinInterval(Duration::from_millis(ms)),
            None => Coalesce::PerFrame,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_selector(&self.target)?;

        let mut ids = BTreeSet::new();
        for threshold in &self.thresholds {
            if !ids.insert(threshold.id.as_str()) {
                return Err(MarginaliaError::ConfigError(format!("duplicate threshold id `{}`", threshold.id)));
            }
            if threshold.class.trim().is_empty() || threshold.class.contains(char::is_whitespace) {
                return Err(MarginaliaError::ConfigError(format!(
                    "threshold `{}` needs a single class name",
                    threshold.id
                )));
            }
            if let ThresholdOffset::Ratio(ratio) = threshold.offset
                && !(ratio.is_finite() && (0.0..=1.0).contains(&ratio))
            {
                return Err(MarginaliaError::ConfigError(format!(
                    "threshold `{}` ratio {} is outside 0.0..=1.0",
                    threshold.id, ratio
                )));
            }
        }
        Ok(())
    }
}

/// Edge-triggered, coalescing threshold state machine.
#[derive(Debug, Clone)]
pub struct ScrollMonitor {
    thresholds: Vec<Threshold>,
    target: ClassList,
    coalesce: Coalesce,
    state: ScrollState,
    pending: Option<ScrollSample>,
    last_evaluated: Option<Instant>,
}

impl ScrollMonitor {
    /// Starts with offset zero and every threshold inactive.
    pub fn new(thresholds: Vec<Threshold>, target: ClassList, coalesce: Coalesce) -> Self {
        Self { thresholds, target, coalesce, state: ScrollState::default(), pending: None, last_evaluated: None }
    }

    pub fn from_config(config: &ScrollConfig, target: ClassList) -> Self {
        Self::new(config.thresholds.clone(), target, config.coalesce())
    }

    pub fn state(&self) -> &ScrollState {
        &self.state
    }

    /// Classes of the modeled target element.
    pub fn target(&self) -> &ClassList {
        &self.target
    }

    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    /// True if a sample is waiting for evaluation.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Records a scroll event.
    ///
    /// Replaces any sample still pending. Under [`Coalesce::MinInterval`]
    /// the sample is evaluated immediately when the interval has elapsed;
    /// otherwise it waits for [`on_frame`](Self::on_frame) or
    /// [`flush`](Self::flush).
    pub fn observe(&mut self, sample: ScrollSample, now: Instant) -> Vec<ClassChange> {
        self.pending = Some(sample);

        match self.coalesce {
            Coalesce::PerFrame => Vec::new(),
            Coalesce::MinInterval(interval) => {
                let due = self
                    .last_evaluated
                    .is_none_or(|last| now.saturating_duration_since(last) >= interval);
                if due {
                    self.last_evaluated = Some(now);
                    self.flush()
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Animation-frame tick: evaluates the pending sample, if any.
    pub fn on_frame(&mut self) -> Vec<ClassChange> {
        self.flush()
    }

    /// Evaluates the pending sample regardless of coalescing.
    ///
    /// Call this when scrolling stops so the final position is never lost.
    pub fn flush(&mut self) -> Vec<ClassChange> {
        match self.pending.take() {
            Some(sample) => self.evaluate(sample),
            None => Vec::new(),
        }
    }

    fn evaluate(&mut self, sample: ScrollSample) -> Vec<ClassChange> {
        self.state.current_offset = sample.offset;
        let mut changes = Vec::new();

        for threshold in &self.thresholds {
            let met = threshold.is_met(&sample);
            let active = self.state.active.contains(&threshold.id);

            if met && !active {
                self.state.active.insert(threshold.id.clone());
                changes.push(ClassChange::Added { threshold: threshold.id.clone(), class: threshold.class.clone() });
            } else if !met && active {
                self.state.active.remove(&threshold.id);
                changes.push(ClassChange::Removed { threshold: threshold.id.clone(), class: threshold.class.clone() });
            }
        }

        for change in &changes {
            let class = change.class();
            let present = self.class_active(class);
            self.target.set(class, present);
        }

        if !changes.is_empty() {
            tracing::debug!(offset = sample.offset, changes = changes.len(), "scroll thresholds crossed");
        }
        changes
    }

    /// True if any active threshold applies `class`. Thresholds may share
    /// a class; it stays on until the last of them deactivates.
    fn class_active(&self, class: &str) -> bool {
        self.thresholds.iter().any(|t| t.class == class && self.state.active.contains(&t.id))
    }

    /// Writes the active threshold classes onto every element matching
    /// `selector`, removing the classes of inactive thresholds.
    pub fn render(&self, html: &str, selector: &str) -> Result<String> {
        validate_selector(selector)?;
        if self.thresholds.is_empty() {
            return Ok(html.to_string());
        }

        let output = rewrite(
            html,
            Settings {
                element_content_handlers: vec![element!(selector, |el| {
                    update_classes(el, |list| {
                        for threshold in &self.thresholds {
                            list.set(&threshold.class, self.class_active(&threshold.class));
                        }
                    })?;
                    Ok(())
                })],
                ..Default::default()
            },
        );

        Ok(output)
    }
}
