//! Class-name utility shared by every component.
//!
//! [`ClassList`] mirrors the browser's `classList`: an ordered, duplicate-free
//! set of class names parsed from (and written back to) a `class` attribute.

use std::fmt;

use lol_html::html_content::Element as RewriteElement;

/// An ordered set of class names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassList {
    classes: Vec<String>,
}

impl ClassList {
    /// Creates an empty class list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `class` attribute value, dropping duplicates.
    pub fn parse(value: &str) -> Self {
        let mut list = Self::new();
        for class in value.split_whitespace() {
            list.add(class);
        }
        list
    }

    /// True if `class` is present.
    pub fn has(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Adds `class`. Returns true if the list changed.
    pub fn add(&mut self, class: &str) -> bool {
        if class.is_empty() || self.has(class) {
            return false;
        }
        self.classes.push(class.to_string());
        true
    }

    /// Removes `class`. Returns true if the list changed.
    pub fn remove(&mut self, class: &str) -> bool {
        let before = self.classes.len();
        self.classes.retain(|c| c != class);
        self.classes.len() != before
    }

    /// Flips `class`. Returns true if it is present afterwards.
    pub fn toggle(&mut self, class: &str) -> bool {
        if self.remove(class) {
            false
        } else {
            self.add(class)
        }
    }

    /// Adds or removes `class` so that its presence equals `present`.
    /// Returns true if the list changed.
    pub fn set(&mut self, class: &str, present: bool) -> bool {
        if present { self.add(class) } else { self.remove(class) }
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }
}

impl fmt::Display for ClassList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.classes.join(" "))
    }
}

/// Applies `update` to a rewritten element's class list and writes it back.
///
/// The attribute is only touched when the list actually changes, and is
/// removed rather than left empty.
pub(crate) fn update_classes<F>(el: &mut RewriteElement<'_, '_>, update: F) -> Result<(), lol_html::errors::AttributeNameError>
where
    F: FnOnce(&mut ClassList),
{
    let original = el.get_attribute("class").unwrap_or_default();
    let mut list = ClassList::parse(&original);
    let before = list.clone();
    update(&mut list);

    if list == before {
        return Ok(());
    }

    if list.is_empty() {
        el.remove_attribute("class");
        Ok(())
    } else {
        el.set_attribute("class", &list.to_string())
    }
}
