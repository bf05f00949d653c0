//! Form control models
//!
//! Each [`Control`] models one submittable element of an HTML form and can
//! enumerate the name-value pairs it could contribute to a submission.
//! Multiple-choice controls enumerate every possible alternative; free-input
//! controls have infinitely many, so a small representative sample is used.
//!
//! Radio buttons and submit buttons are only meaningful in groups: the raw
//! [`RadioButton`] and [`SubmitButton`] structs collected while parsing a
//! form must be merged through [`Control::radio_group`] and
//! [`Control::submit_buttons`] before they can enumerate anything.

use crate::ControlGroupError;

/// One way a control can be submitted.
///
/// `None` represents the control not being part of the submission at all,
/// for example an unchecked checkbox.
pub type Alternative = Option<(String, String)>;

/// Sample text submitted for single-line free-input fields.
const TEXT_FIELD_SAMPLE: &str = "test input";

/// Sample text submitted for multi-line free-input fields.
const TEXT_AREA_SAMPLE: &str = "test input\nsecond line? yes!";

/// A single radio button, as found in the document.
///
/// All radio buttons sharing a name must be merged into a
/// [`Control::RadioGroup`] before use.
#[derive(Clone, Debug)]
pub struct RadioButton {
    pub name: String,
    pub value: String,
}

/// A single submit button, as found in the document.
///
/// All submit buttons of a form must be merged into a
/// [`Control::SubmitButtons`] before use.
#[derive(Clone, Debug)]
pub struct SubmitButton {
    pub name: String,
    pub value: String,
}

/// A submittable element of an HTML form.
#[derive(Clone, Debug)]
pub enum Control {
    /// Single-line text input. Submits one free-text value.
    TextField { name: String, value: String },

    /// Multi-line text input. Submits one free-text value.
    TextArea { name: String, value: String },

    /// Control that is not visible to the user; submits its fixed value.
    HiddenInput { name: String, value: String },

    /// File upload control. No real file is uploaded, so only the empty
    /// string is ever submitted.
    FileInput { name: String },

    /// Checkbox: submits its value (checked) or nothing (unchecked).
    Checkbox { name: String, value: String },

    /// Multiple-choice control merging one or more radio buttons that
    /// share a name. Exactly one of the values is submitted.
    RadioGroup { name: String, values: Vec<String> },

    /// Pseudo-control modeling the choice between a form's submit buttons.
    /// Exactly one button is used per submission.
    SubmitButtons { buttons: Vec<(String, String)> },

    /// `<select>` without `multiple`: one of the options, or none.
    SelectSingle { name: String, options: Vec<String> },

    /// Pseudo-control for one option of a `<select multiple>`:
    /// the option is either selected or not.
    SelectMultiple { name: String, value: String },
}

impl Control {
    /// Merges radio buttons that share a name into a single control.
    ///
    /// Fails if the sequence is empty or the buttons carry differing names.
    pub fn radio_group(buttons: Vec<RadioButton>) -> Result<Self, ControlGroupError> {
        let first = buttons.first().ok_or(ControlGroupError::Empty)?;
        let name = first.name.clone();
        let mut values = Vec::with_capacity(buttons.len());
        for button in &buttons {
            if button.name != name {
                return Err(ControlGroupError::MixedNames {
                    first: name,
                    other: button.name.clone(),
                });
            }
            values.push(button.value.clone());
        }
        Ok(Control::RadioGroup { name, values })
    }

    /// Merges a form's submit buttons into a single control.
    ///
    /// Fails if the sequence is empty.
    pub fn submit_buttons(buttons: Vec<SubmitButton>) -> Result<Self, ControlGroupError> {
        if buttons.is_empty() {
            return Err(ControlGroupError::Empty);
        }
        Ok(Control::SubmitButtons {
            buttons: buttons.into_iter().map(|b| (b.name, b.value)).collect(),
        })
    }

    /// The name under which this control is submitted.
    pub fn name(&self) -> &str {
        match self {
            Control::TextField { name, .. }
            | Control::TextArea { name, .. }
            | Control::HiddenInput { name, .. }
            | Control::FileInput { name }
            | Control::Checkbox { name, .. }
            | Control::RadioGroup { name, .. }
            | Control::SelectSingle { name, .. }
            | Control::SelectMultiple { name, .. } => name,
            Control::SubmitButtons { .. } => "",
        }
    }

    /// Returns `true` iff this control may be absent from a submission.
    pub fn maybe_omitted(&self) -> bool {
        matches!(
            self,
            Control::Checkbox { .. } | Control::SelectSingle { .. } | Control::SelectMultiple { .. }
        )
    }

    /// Returns `true` iff the given name-value pair could be submitted by
    /// this control.
    ///
    /// For free-input controls any value is possible, so only the name is
    /// checked; the pair need not appear in [`Control::alternatives`].
    pub fn has_alternative(&self, name: &str, value: &str) -> bool {
        match self {
            Control::TextField { name: n, .. }
            | Control::TextArea { name: n, .. }
            | Control::FileInput { name: n } => name == n,
            Control::HiddenInput { name: n, value: v }
            | Control::Checkbox { name: n, value: v }
            | Control::SelectMultiple { name: n, value: v } => name == n && value == v,
            Control::RadioGroup { name: n, values } => {
                name == n && values.iter().any(|v| v == value)
            }
            Control::SubmitButtons { buttons } => {
                buttons.iter().any(|(n, v)| n == name && v == value)
            }
            Control::SelectSingle { name: n, options } => {
                name == n && options.iter().any(|o| o == value)
            }
        }
    }

    /// Enumerates the alternative ways this control can be submitted.
    ///
    /// Every call produces a fresh, finite sequence. For multiple-choice
    /// controls all possible alternatives are included; for free-input
    /// controls a representative sample is picked.
    pub fn alternatives(&self) -> Vec<Alternative> {
        match self {
            Control::TextField { name, value } => {
                free_text_alternatives(name, value, TEXT_FIELD_SAMPLE)
            }
            Control::TextArea { name, value } => {
                free_text_alternatives(name, value, TEXT_AREA_SAMPLE)
            }
            Control::HiddenInput { name, value } => {
                vec![Some((name.clone(), value.clone()))]
            }
            // Browsers always present an empty file name field as a security
            // precaution, and we have no idea what kind of file would be
            // expected, so the empty string is the only alternative.
            Control::FileInput { name } => vec![Some((name.clone(), String::new()))],
            Control::Checkbox { name, value } => vec![
                None,                                // box unchecked
                Some((name.clone(), value.clone())), // box checked
            ],
            Control::RadioGroup { name, values } => values
                .iter()
                .map(|value| Some((name.clone(), value.clone())))
                .collect(),
            Control::SubmitButtons { buttons } => {
                buttons.iter().map(|pair| Some(pair.clone())).collect()
            }
            Control::SelectSingle { name, options } => {
                let mut alternatives = vec![None]; // nothing selected
                alternatives.extend(
                    options
                        .iter()
                        .map(|option| Some((name.clone(), option.clone()))),
                );
                alternatives
            }
            Control::SelectMultiple { name, value } => vec![
                None,                                // not selected
                Some((name.clone(), value.clone())), // selected
            ],
        }
    }
}

fn free_text_alternatives(name: &str, value: &str, sample: &str) -> Vec<Alternative> {
    let mut alternatives = Vec::new();
    if !value.is_empty() {
        alternatives.push(Some((name.to_string(), value.to_string()))); // default
    }
    alternatives.push(Some((name.to_string(), String::new()))); // empty
    alternatives.push(Some((name.to_string(), sample.to_string())));
    alternatives
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(control: &Control) -> Vec<Alternative> {
        control.alternatives()
    }

    #[test]
    fn test_text_field_with_default() {
        let control = Control::TextField {
            name: "q".into(),
            value: "start".into(),
        };
        let alts = pairs(&control);
        assert_eq!(alts.len(), 3);
        assert_eq!(alts[0], Some(("q".into(), "start".into())));
        assert_eq!(alts[1], Some(("q".into(), String::new())));
        assert!(control.has_alternative("q", "anything at all"));
        assert!(!control.has_alternative("other", "start"));
    }

    #[test]
    fn test_text_field_without_default() {
        let control = Control::TextField {
            name: "q".into(),
            value: String::new(),
        };
        // No separate default alternative when the default value is empty.
        assert_eq!(pairs(&control).len(), 2);
    }

    #[test]
    fn test_hidden_input_fixed_value() {
        let control = Control::HiddenInput {
            name: "token".into(),
            value: "abc".into(),
        };
        assert_eq!(pairs(&control), vec![Some(("token".into(), "abc".into()))]);
        assert!(control.has_alternative("token", "abc"));
        assert!(!control.has_alternative("token", "xyz"));
    }

    #[test]
    fn test_file_input_submits_empty_string() {
        let control = Control::FileInput { name: "upload".into() };
        assert_eq!(pairs(&control), vec![Some(("upload".into(), String::new()))]);
        assert!(control.has_alternative("upload", "whatever.txt"));
    }

    #[test]
    fn test_checkbox_omittable() {
        let control = Control::Checkbox {
            name: "agree".into(),
            value: "on".into(),
        };
        assert!(control.maybe_omitted());
        assert_eq!(
            pairs(&control),
            vec![None, Some(("agree".into(), "on".into()))]
        );
    }

    #[test]
    fn test_radio_group_construction() {
        let buttons = vec![
            RadioButton { name: "color".into(), value: "red".into() },
            RadioButton { name: "color".into(), value: "blue".into() },
        ];
        let control = Control::radio_group(buttons).unwrap();
        assert_eq!(
            pairs(&control),
            vec![
                Some(("color".into(), "red".into())),
                Some(("color".into(), "blue".into())),
            ]
        );
        assert!(control.has_alternative("color", "red"));
        assert!(!control.has_alternative("color", "green"));
    }

    #[test]
    fn test_radio_group_mixed_names_rejected() {
        let buttons = vec![
            RadioButton { name: "color".into(), value: "red".into() },
            RadioButton { name: "shade".into(), value: "blue".into() },
        ];
        assert!(matches!(
            Control::radio_group(buttons),
            Err(crate::ControlGroupError::MixedNames { .. })
        ));
    }

    #[test]
    fn test_radio_group_empty_rejected() {
        assert!(matches!(
            Control::radio_group(Vec::new()),
            Err(crate::ControlGroupError::Empty)
        ));
    }

    #[test]
    fn test_submit_buttons() {
        let buttons = vec![
            SubmitButton { name: "action".into(), value: "save".into() },
            SubmitButton { name: "action".into(), value: "delete".into() },
        ];
        let control = Control::submit_buttons(buttons).unwrap();
        assert_eq!(pairs(&control).len(), 2);
        assert!(control.has_alternative("action", "delete"));
        assert!(!control.has_alternative("action", "reset"));
    }

    #[test]
    fn test_select_single() {
        let control = Control::SelectSingle {
            name: "size".into(),
            options: vec!["s".into(), "m".into(), "l".into()],
        };
        assert!(control.maybe_omitted());
        let alts = pairs(&control);
        assert_eq!(alts.len(), 4);
        assert_eq!(alts[0], None);
        assert!(control.has_alternative("size", "m"));
        assert!(!control.has_alternative("size", "xl"));
    }

    #[test]
    fn test_select_multiple_option() {
        let control = Control::SelectMultiple {
            name: "topping".into(),
            value: "olives".into(),
        };
        assert!(control.maybe_omitted());
        assert_eq!(
            pairs(&control),
            vec![None, Some(("topping".into(), "olives".into()))]
        );
    }

    #[test]
    fn test_alternatives_are_restartable() {
        let control = Control::Checkbox {
            name: "x".into(),
            value: "1".into(),
        };
        assert_eq!(control.alternatives(), control.alternatives());
    }
}
