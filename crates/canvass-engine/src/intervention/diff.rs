use canvass_common::knowledge::{CHECKED, UNCHECKED};
use canvass_common::snapshot::{ElementKind, QuestionSnapshot, SnapshotElement};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ChangeKind {
    Checked,
    Unchecked,
    Entered { value: String },
    Selected { value: String },
}

/// One element whose checked state or value differs between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementChange {
    pub locator: String,
    pub label: String,
    pub kind: ElementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(flatten)]
    pub change: ChangeKind,
}

/// Answer recovered from an operator's edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedAnswer {
    pub locator: String,
    pub label: String,
    pub kind: ElementKind,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UncapturedCause {
    NoChange,
    Ambiguous,
    SnapshotFailed,
}

/// Outcome of reading an intervention's diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaptureStatus {
    Resolved { answers: Vec<CapturedAnswer> },
    Uncaptured { cause: UncapturedCause },
}

impl CaptureStatus {
    pub fn is_resolved(&self) -> bool {
        matches!(self, CaptureStatus::Resolved { .. })
    }

    pub fn answers(&self) -> &[CapturedAnswer] {
        match self {
            CaptureStatus::Resolved { answers } => answers,
            CaptureStatus::Uncaptured { .. } => &[],
        }
    }
}

/// Elements of `before` whose checked state or value changed in `after`,
/// matched by locator. Elements that only appear on one side are ignored.
pub fn diff(before: &QuestionSnapshot, after: &QuestionSnapshot) -> Vec<ElementChange> {
    before
        .elements
        .iter()
        .filter_map(|old| {
            let new = after.element(&old.locator)?;
            element_change(old, new)
        })
        .collect()
}

fn element_change(old: &SnapshotElement, new: &SnapshotElement) -> Option<ElementChange> {
    let change = match new.kind {
        ElementKind::Radio | ElementKind::Checkbox => {
            match (old.state.checked, new.state.checked) {
                (false, true) => ChangeKind::Checked,
                (true, false) => ChangeKind::Unchecked,
                _ => return None,
            }
        }
        ElementKind::TextInput | ElementKind::Select => {
            let value = new.current_value().unwrap_or_default();
            if old.current_value().unwrap_or_default() == value {
                return None;
            }
            if new.kind == ElementKind::Select {
                ChangeKind::Selected {
                    value: value.to_string(),
                }
            } else {
                ChangeKind::Entered {
                    value: value.to_string(),
                }
            }
        }
        ElementKind::Button => return None,
    };
    Some(ElementChange {
        locator: new.locator.clone(),
        label: new.label.clone(),
        kind: new.kind,
        group: new.group.clone(),
        change,
    })
}

/// Turn a diff into captured answers, or an explicit uncaptured marker.
///
/// Radios cleared because a sibling in the same group was checked are implied
/// by that check and dropped first. What remains resolves when it is a single
/// change or consists only of checkbox changes; anything else is ambiguous.
pub fn resolve(changes: &[ElementChange]) -> CaptureStatus {
    let checked_groups: Vec<&str> = changes
        .iter()
        .filter(|c| c.kind == ElementKind::Radio && c.change == ChangeKind::Checked)
        .filter_map(|c| c.group.as_deref())
        .collect();
    let relevant: Vec<&ElementChange> = changes
        .iter()
        .filter(|c| {
            !(c.kind == ElementKind::Radio
                && c.change == ChangeKind::Unchecked
                && c.group
                    .as_deref()
                    .is_some_and(|g| checked_groups.contains(&g)))
        })
        .collect();

    if relevant.is_empty() {
        return CaptureStatus::Uncaptured {
            cause: UncapturedCause::NoChange,
        };
    }
    let unlabeled = relevant.iter().any(|c| c.label.trim().is_empty());
    let all_checkboxes = relevant.iter().all(|c| c.kind == ElementKind::Checkbox);
    if unlabeled || (relevant.len() > 1 && !all_checkboxes) {
        return CaptureStatus::Uncaptured {
            cause: UncapturedCause::Ambiguous,
        };
    }

    let answers = relevant
        .into_iter()
        .map(|c| CapturedAnswer {
            locator: c.locator.clone(),
            label: c.label.clone(),
            kind: c.kind,
            value: match &c.change {
                ChangeKind::Checked => CHECKED.to_string(),
                ChangeKind::Unchecked => UNCHECKED.to_string(),
                ChangeKind::Entered { value } | ChangeKind::Selected { value } => value.clone(),
            },
        })
        .collect();
    CaptureStatus::Resolved { answers }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn radios(checked: Option<usize>) -> QuestionSnapshot {
        let elements = ["Yes", "No"]
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let e = SnapshotElement::new(format!("#r{}", i), ElementKind::Radio, *label)
                    .with_group("q");
                if checked == Some(i) { e.checked() } else { e }
            })
            .collect();
        QuestionSnapshot::new("Do you own a car?", elements)
    }

    #[test]
    fn radio_switch_counts_as_one_answer() {
        let changes = diff(&radios(Some(0)), &radios(Some(1)));
        assert_eq!(changes.len(), 2);
        let status = resolve(&changes);
        assert_eq!(status.answers().len(), 1);
        assert_eq!(status.answers()[0].label, "No");
        assert_eq!(status.answers()[0].value, CHECKED);
    }

    #[test]
    fn empty_diff_is_no_change() {
        let changes = diff(&radios(None), &radios(None));
        assert_eq!(
            resolve(&changes),
            CaptureStatus::Uncaptured {
                cause: UncapturedCause::NoChange
            }
        );
    }

    #[test]
    fn text_and_radio_together_are_ambiguous() {
        let before = QuestionSnapshot::new(
            "Age?",
            vec![
                SnapshotElement::new("#age", ElementKind::TextInput, "Age"),
                SnapshotElement::new("#x", ElementKind::Radio, "Rather not say"),
            ],
        );
        let after = QuestionSnapshot::new(
            "Age?",
            vec![
                SnapshotElement::new("#age", ElementKind::TextInput, "Age").with_value("34"),
                SnapshotElement::new("#x", ElementKind::Radio, "Rather not say").checked(),
            ],
        );
        assert_eq!(
            resolve(&diff(&before, &after)),
            CaptureStatus::Uncaptured {
                cause: UncapturedCause::Ambiguous
            }
        );
    }
}
