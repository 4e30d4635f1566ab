//! Expand/collapse state for click-driven disclosures.
//!
//! Each controlled element has its own [`ToggleController`]; triggers point
//! at the element they control with `data-toggle="{id}"`. State changes go
//! through the pure [`transition`] table so behavior can be checked without
//! any event plumbing.

use std::collections::BTreeMap;

use lol_html::{Settings, element};
use serde::{Deserialize, Serialize};

use crate::classify::update_classes;
use crate::parse::Document;
use crate::rewrite::{rewrite, validate_selector};
use crate::{MarginaliaError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleState {
    #[default]
    Closed,
    Open,
}

impl ToggleState {
    pub fn is_open(self) -> bool {
        self == ToggleState::Open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleEvent {
    /// Click on the trigger.
    Activate,
    /// Click anywhere outside the trigger and the controlled element.
    DismissOutside,
    Escape,
    /// Explicit close control inside the controlled element.
    Close,
}

/// Next state for `event` in `state`.
pub fn transition(state: ToggleState, event: ToggleEvent) -> ToggleState {
    use ToggleEvent::*;
    use ToggleState::*;

    match (state, event) {
        (Closed, Activate) => Open,
        (Open, Activate) => Closed,
        (_, DismissOutside | Escape | Close) => Closed,
    }
}

/// DOM mutations implied by a state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleEffect {
    pub id: String,
    pub state: ToggleState,
    /// Class added to (open) or removed from (closed) the controlled element.
    pub class: String,
    /// Value for `aria-expanded` on the triggers, when enabled.
    pub aria_expanded: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToggleConfig {
    /// Attribute on triggers naming the controlled element's id.
    pub trigger_attr: String,
    pub open_class: String,
    /// Maintain `aria-expanded` on triggers.
    pub aria: bool,
}

impl Default for ToggleConfig {
    fn default() -> Self {
        Self { trigger_attr: "data-toggle".to_string(), open_class: "is-open".to_string(), aria: true }
    }
}

impl ToggleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.trigger_attr.trim().is_empty() || self.trigger_attr.contains(char::is_whitespace) {
            return Err(MarginaliaError::ConfigError("toggle trigger attribute must be a single name".to_string()));
        }
        if self.open_class.trim().is_empty() || self.open_class.contains(char::is_whitespace) {
            return Err(MarginaliaError::ConfigError("toggle open class must be a single class name".to_string()));
        }
        validate_selector(&self.trigger_selector())
    }

    pub fn trigger_selector(&self) -> String {
        format!("[{}]", self.trigger_attr)
    }
}

/// State for one controlled element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleController {
    id: String,
    state: ToggleState,
    open_class: String,
    aria: bool,
}

impl ToggleController {
    pub fn new(id: &str, open_class: &str, aria: bool) -> Self {
        Self { id: id.to_string(), state: ToggleState::Closed, open_class: open_class.to_string(), aria }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ToggleState {
        self.state
    }

    /// Applies `event`; returns the effect when the state changed.
    pub fn dispatch(&mut self, event: ToggleEvent) -> Option<ToggleEffect> {
        let next = transition(self.state, event);
        if next == self.state {
            return None;
        }

        tracing::debug!(id = %self.id, ?event, ?next, "toggle state changed");
        self.state = next;
        Some(ToggleEffect {
            id: self.id.clone(),
            state: next,
            class: self.open_class.clone(),
            aria_expanded: self.aria.then_some(next.is_open()),
        })
    }
}

/// Every toggle on a page, keyed by controlled element id.
#[derive(Debug, Clone)]
pub struct ToggleRegistry {
    controllers: BTreeMap<String, ToggleController>,
    config: ToggleConfig,
}

impl ToggleRegistry {
    pub fn new(config: ToggleConfig) -> Self {
        Self { controllers: BTreeMap::new(), config }
    }

    /// Discovers trigger/controlled pairs.
    ///
    /// Triggers whose id has no matching element are skipped; several
    /// triggers for the same id share one controller.
    pub fn from_document(doc: &Document, config: ToggleConfig) -> Result<Self> {
        let ids = doc.ids();
        let mut registry = Self::new(config);

        for trigger in doc.select(&registry.config.trigger_selector())? {
            let Some(id) = trigger.attr(&registry.config.trigger_attr).map(str::trim).filter(|v| !v.is_empty())
            else {
                continue;
            };

            if !ids.contains(id) {
                tracing::debug!(id, "toggle trigger has no controlled element");
                continue;
            }
            registry.register(id);
        }

        tracing::debug!(toggles = registry.len(), "discovered toggles");
        Ok(registry)
    }

    /// Adds a controller for `id` if none exists.
    pub fn register(&mut self, id: &str) -> &mut ToggleController {
        let config = &self.config;
        self.controllers
            .entry(id.to_string())
            .or_insert_with(|| ToggleController::new(id, &config.open_class, config.aria))
    }

    pub fn get(&self, id: &str) -> Option<&ToggleController> {
        self.controllers.get(id)
    }

    pub fn state(&self, id: &str) -> Option<ToggleState> {
        self.get(id).map(ToggleController::state)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToggleController> {
        self.controllers.values()
    }

    /// Routes `event` to the controller for `id`. Unknown ids are ignored.
    pub fn dispatch(&mut self, id: &str, event: ToggleEvent) -> Option<ToggleEffect> {
        self.controllers.get_mut(id)?.dispatch(event)
    }

    /// Sends a page-wide event (outside click, escape) to every controller.
    pub fn dismiss_all(&mut self, event: ToggleEvent) -> Vec<ToggleEffect> {
        self.controllers.values_mut().filter_map(|c| c.dispatch(event)).collect()
    }

    /// Writes the open class onto controlled elements and `aria-expanded`
    /// onto triggers.
    pub fn render(&self, html: &str) -> Result<String> {
        if self.controllers.is_empty() {
            return Ok(html.to_string());
        }

        let trigger_attr = self.config.trigger_attr.as_str();
        let open_class = self.config.open_class.as_str();
        let trigger_selector = self.config.trigger_selector();
        validate_selector(&trigger_selector)?;
        let aria = self.config.aria;

        let output = rewrite(
            html,
            Settings {
                element_content_handlers: vec![
                    element!("[id]", |el| {
                        if let Some(controller) = el.get_attribute("id").and_then(|id| self.controllers.get(id.trim()))
                        {
                            let open = controller.state.is_open();
                            update_classes(el, |list| {
                                list.set(open_class, open);
                            })?;
                        }
                        Ok(())
                    }),
                    element!(trigger_selector.as_str(), |el| {
                        if !aria {
                            return Ok(());
                        }
                        if let Some(controller) =
                            el.get_attribute(trigger_attr).and_then(|id| self.controllers.get(id.trim()))
                        {
                            let expanded = if controller.state.is_open() { "true" } else { "false" };
                            el.set_attribute("aria-expanded", expanded)?;
                        }
                        Ok(())
                    }),
                ],
                ..Default::default()
            },
        );

        Ok(output)
    }
}
