use super::{DriverError, PageDriver};
use crate::intervention::{InterventionPrompt, OperatorAborted, OperatorSignal};
use async_trait::async_trait;
use canvass_common::snapshot::{ElementHandle, ElementKind, PageAction, QuestionSnapshot};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A sequence of pages replayed without a browser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub pages: Vec<ScriptedPage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedPage {
    pub snapshot: QuestionSnapshot,
    /// Notices the page shows once anything has been done to it.
    #[serde(default)]
    pub notices_after_action: Vec<String>,
    /// What the operator does if this page is deferred.
    #[serde(default)]
    pub operator_edits: Vec<OperatorEdit>,
    /// Locators whose interaction fails.
    #[serde(default)]
    pub failing_locators: Vec<String>,
}

impl ScriptedPage {
    pub fn new(snapshot: QuestionSnapshot) -> Self {
        Self {
            snapshot,
            notices_after_action: Vec::new(),
            operator_edits: Vec::new(),
            failing_locators: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorEdit {
    pub locator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl OperatorEdit {
    pub fn check(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            checked: Some(true),
            value: None,
        }
    }

    pub fn enter(locator: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            checked: None,
            value: Some(value.into()),
        }
    }
}

/// Action performed by the engine, as logged by the scripted driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionLog {
    pub page: usize,
    pub locator: String,
    pub action: PageAction,
}

#[derive(Debug)]
struct ScriptState {
    pages: Vec<ScriptedPage>,
    current: usize,
    /// Live copy of the current page.
    live: Option<QuestionSnapshot>,
    acted: bool,
    actions: Vec<ActionLog>,
    prompts: Vec<InterventionPrompt>,
}

impl ScriptState {
    fn page(&self) -> Option<&ScriptedPage> {
        self.pages.get(self.current)
    }

    fn load_current(&mut self) {
        self.live = self.pages.get(self.current).map(|p| p.snapshot.clone());
        self.acted = false;
    }

    fn live_mut(&mut self) -> Result<&mut QuestionSnapshot, DriverError> {
        self.live
            .as_mut()
            .ok_or_else(|| DriverError::Snapshot("script exhausted".into()))
    }

    fn set_checked(&mut self, locator: &str, state: bool) -> Result<(), DriverError> {
        let live = self.live_mut()?;
        let (kind, group) = live
            .element(locator)
            .map(|e| (e.kind, e.group.clone()))
            .ok_or_else(|| DriverError::ElementNotFound {
                locator: locator.to_string(),
            })?;
        if !kind.is_checkable() {
            return Err(DriverError::ElementNotInteractable {
                locator: locator.to_string(),
                reason: format!("{} cannot be checked", kind),
            });
        }
        for element in live.elements.iter_mut() {
            if element.locator == locator {
                element.state.checked = state;
            } else if state
                && kind == ElementKind::Radio
                && element.kind == ElementKind::Radio
                && group.is_some()
                && element.group == group
            {
                element.state.checked = false;
            }
        }
        Ok(())
    }

    fn set_value(&mut self, locator: &str, value: String) -> Result<(), DriverError> {
        let element = self
            .live_mut()?
            .elements
            .iter_mut()
            .find(|e| e.locator == locator)
            .ok_or_else(|| DriverError::ElementNotFound {
                locator: locator.to_string(),
            })?;
        element.value = Some(value);
        Ok(())
    }
}

/// Page driver replaying a [`Script`].
///
/// Clones share the same page state, as does the [`ScriptedOperator`] handed
/// out by [`ScriptedDriver::operator`].
#[derive(Debug, Clone)]
pub struct ScriptedDriver {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedDriver {
    pub fn new(script: Script) -> Self {
        let mut state = ScriptState {
            pages: script.pages,
            current: 0,
            live: None,
            acted: false,
            actions: Vec::new(),
            prompts: Vec::new(),
        };
        state.load_current();
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn from_pages(pages: Vec<ScriptedPage>) -> Self {
        Self::new(Script { pages })
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let content = tokio::fs::read_to_string(path).await?;
        let script: Script = serde_json::from_str(&content)?;
        Ok(Self::new(script))
    }

    /// Operator that applies each page's scripted edits when resumed.
    pub fn operator(&self) -> ScriptedOperator {
        ScriptedOperator {
            state: Arc::clone(&self.state),
        }
    }

    pub fn actions(&self) -> Vec<ActionLog> {
        self.lock().actions.clone()
    }

    pub fn prompts(&self) -> Vec<InterventionPrompt> {
        self.lock().prompts.clone()
    }

    pub fn current_page(&self) -> usize {
        self.lock().current
    }

    /// Current live state of the page, including edits made so far.
    pub fn live_snapshot(&self) -> Option<QuestionSnapshot> {
        self.lock().live.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    async fn snapshot(&mut self) -> Result<QuestionSnapshot, DriverError> {
        let state = self.lock();
        let mut snapshot = state
            .live
            .clone()
            .ok_or_else(|| DriverError::Snapshot("script exhausted".into()))?;
        if state.acted {
            if let Some(page) = state.page() {
                snapshot
                    .notices
                    .extend(page.notices_after_action.iter().cloned());
            }
        }
        Ok(snapshot)
    }

    async fn locate(&mut self, token: &str) -> Result<ElementHandle, DriverError> {
        let state = self.lock();
        let live = state
            .live
            .as_ref()
            .ok_or_else(|| DriverError::Snapshot("script exhausted".into()))?;
        match live.element(token) {
            Some(e) if e.is_visible() => Ok(ElementHandle::new(token)),
            Some(_) => Err(DriverError::ElementNotInteractable {
                locator: token.to_string(),
                reason: "hidden".into(),
            }),
            None => Err(DriverError::ElementNotFound {
                locator: token.to_string(),
            }),
        }
    }

    async fn act(&mut self, handle: &ElementHandle, action: &PageAction) -> Result<(), DriverError> {
        let mut state = self.lock();
        let page = state.current;
        state.actions.push(ActionLog {
            page,
            locator: handle.token.clone(),
            action: action.clone(),
        });
        state.acted = true;

        if state
            .page()
            .is_some_and(|p| p.failing_locators.contains(&handle.token))
        {
            return Err(DriverError::Other(format!(
                "scripted failure on {}",
                handle.token
            )));
        }

        match action {
            PageAction::Click => Ok(()),
            PageAction::Check { state: checked } => state.set_checked(&handle.token, *checked),
            PageAction::Type { text, clear } => {
                let current = state
                    .live
                    .as_ref()
                    .and_then(|l| l.element(&handle.token))
                    .and_then(|e| e.value.clone())
                    .unwrap_or_default();
                let value = if *clear {
                    text.clone()
                } else {
                    current + text
                };
                state.set_value(&handle.token, value)
            }
            PageAction::Select { option } => {
                let known = state
                    .live
                    .as_ref()
                    .and_then(|l| l.element(&handle.token))
                    .is_some_and(|e| e.options.contains(option));
                if !known {
                    return Err(DriverError::OptionNotFound {
                        value: option.clone(),
                    });
                }
                state.set_value(&handle.token, option.clone())
            }
        }
    }

    async fn wait_settled(&mut self, _timeout_ms: u64) -> bool {
        true
    }

    async fn advance(&mut self) -> Result<bool, DriverError> {
        let mut state = self.lock();
        if state.current < state.pages.len() {
            state.current += 1;
        }
        state.load_current();
        Ok(state.current < state.pages.len())
    }
}

/// Operator that performs the current page's scripted edits and resumes at once.
#[derive(Debug, Clone)]
pub struct ScriptedOperator {
    state: Arc<Mutex<ScriptState>>,
}

#[async_trait]
impl OperatorSignal for ScriptedOperator {
    async fn resume(&mut self, prompt: &InterventionPrompt) -> Result<(), OperatorAborted> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.prompts.push(prompt.clone());
        let edits = state
            .page()
            .map(|p| p.operator_edits.clone())
            .unwrap_or_default();
        for edit in edits {
            let result = match (edit.checked, edit.value) {
                (Some(checked), _) => state.set_checked(&edit.locator, checked),
                (None, Some(value)) => state.set_value(&edit.locator, value),
                (None, None) => Ok(()),
            };
            if let Err(e) = result {
                tracing::warn!(locator = %edit.locator, error = %e, "Scripted operator edit failed");
            }
        }
        // The operator's correction clears the page's complaints.
        state.acted = false;
        Ok(())
    }
}
