use crate::text;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of an interactive element on a survey page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    TextInput,
    Radio,
    Checkbox,
    Select,
    Button,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::TextInput => "text-input",
            ElementKind::Radio => "radio",
            ElementKind::Checkbox => "checkbox",
            ElementKind::Select => "select",
            ElementKind::Button => "button",
        }
    }

    pub fn is_checkable(&self) -> bool {
        matches!(self, ElementKind::Radio | ElementKind::Checkbox)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ElementState {
    pub checked: bool,
    pub hidden: bool,
    pub disabled: bool,
    pub readonly: bool,
    /// Page marks the element as failing a requirement (aria-invalid, required marker).
    pub invalid: bool,
}

/// One interactive element as seen by the page driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotElement {
    /// Opaque token the page driver understands. Stable across snapshots of one page.
    pub locator: String,
    pub kind: ElementKind,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Radio group name, when the driver knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Option labels of a select element.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default)]
    pub state: ElementState,
}

impl SnapshotElement {
    pub fn new(locator: impl Into<String>, kind: ElementKind, label: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            kind,
            label: label.into(),
            value: None,
            group: None,
            options: Vec::new(),
            state: ElementState::default(),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn checked(mut self) -> Self {
        self.state.checked = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.state.hidden = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.state.disabled = true;
        self
    }

    pub fn is_visible(&self) -> bool {
        !self.state.hidden
    }

    /// Visible, enabled, and accepts input.
    pub fn is_interactable(&self) -> bool {
        let accepts_input = match self.kind {
            ElementKind::Select => !self.state.readonly && !self.options.is_empty(),
            ElementKind::TextInput => !self.state.readonly,
            _ => true,
        };
        self.is_visible() && !self.state.disabled && accepts_input
    }

    pub fn normalized_label(&self) -> String {
        text::normalize_label(&self.label)
    }

    /// Current answer carried by this element, if any.
    pub fn current_value(&self) -> Option<&str> {
        self.value.as_deref().filter(|v| !v.trim().is_empty())
    }
}

/// Immutable description of one rendered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QuestionSnapshot {
    pub text: String,
    #[serde(default)]
    pub elements: Vec<SnapshotElement>,
    /// Validation or error messages currently shown on the page.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl QuestionSnapshot {
    pub fn new(text: impl Into<String>, elements: Vec<SnapshotElement>) -> Self {
        Self {
            text: text.into(),
            elements,
            notices: Vec::new(),
            url: None,
        }
    }

    pub fn element(&self, locator: &str) -> Option<&SnapshotElement> {
        self.elements.iter().find(|e| e.locator == locator)
    }

    pub fn elements_of_kind(&self, kind: ElementKind) -> impl Iterator<Item = &SnapshotElement> {
        self.elements.iter().filter(move |e| e.kind == kind)
    }

    pub fn normalized_text(&self) -> String {
        text::normalize(&self.text)
    }

    /// Elements flagged by the page as failing a requirement.
    pub fn invalid_elements(&self) -> impl Iterator<Item = &SnapshotElement> {
        self.elements.iter().filter(|e| e.state.invalid)
    }
}

/// Handle returned by the page driver for a located element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    pub token: String,
}

impl ElementHandle {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

/// Interaction requested from the page driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PageAction {
    Click,
    Check { state: bool },
    Type {
        text: String,
        #[serde(default)]
        clear: bool,
    },
    Select { option: String },
}

impl fmt::Display for PageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageAction::Click => write!(f, "click"),
            PageAction::Check { state } => write!(f, "check({})", state),
            PageAction::Type { .. } => write!(f, "type"),
            PageAction::Select { option } => write!(f, "select({})", option),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interactable_requires_visible_enabled_writable() {
        let input = SnapshotElement::new("#age", ElementKind::TextInput, "Age");
        assert!(input.is_interactable());
        assert!(!input.clone().hidden().is_interactable());
        assert!(!input.clone().disabled().is_interactable());

        let mut readonly = input;
        readonly.state.readonly = true;
        assert!(!readonly.is_interactable());
    }

    #[test]
    fn empty_select_is_not_interactable() {
        let select = SnapshotElement::new("#income", ElementKind::Select, "Income");
        assert!(!select.is_interactable());
        assert!(select.with_options(["Under 50k", "50k+"]).is_interactable());
    }
}
