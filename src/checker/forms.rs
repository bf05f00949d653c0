//! Extracting form models from parsed documents

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::control::{Control, RadioButton, SubmitButton};
use crate::referrer::Form;

fn selector(source: &str) -> Selector {
    Selector::parse(source).expect("selector literal")
}

/// A control that is disabled should not be submitted and a nameless one
/// cannot be; both are skipped.
fn submittable_name(element: ElementRef<'_>) -> Option<&str> {
    if element.value().attr("disabled").is_some() {
        return None;
    }
    match element.value().attr("name") {
        Some(name) if !name.is_empty() => Some(name),
        _ => None,
    }
}

/// What an `<input>` element contributes to its form.
enum InputControl {
    Plain(Control),
    Radio(RadioButton),
    Submit(SubmitButton),
}

fn parse_input(element: ElementRef<'_>, name: &str) -> Option<InputControl> {
    let attr = |attr: &str, default: &str| {
        element.value().attr(attr).unwrap_or(default).to_string()
    };
    match element.value().attr("type").unwrap_or("text") {
        "text" | "password" => Some(InputControl::Plain(Control::TextField {
            name: name.to_string(),
            value: attr("value", ""),
        })),
        "checkbox" => Some(InputControl::Plain(Control::Checkbox {
            name: name.to_string(),
            value: attr("value", "on"),
        })),
        "radio" => Some(InputControl::Radio(RadioButton {
            name: name.to_string(),
            value: attr("value", "on"),
        })),
        "file" => Some(InputControl::Plain(Control::FileInput {
            name: name.to_string(),
        })),
        "hidden" => Some(InputControl::Plain(Control::HiddenInput {
            name: name.to_string(),
            value: attr("value", ""),
        })),
        "submit" | "image" => Some(InputControl::Submit(SubmitButton {
            name: name.to_string(),
            value: attr("value", ""),
        })),
        // Type "button" is used by JavaScript, "reset" by the browser,
        // and invalid types do not submit anything either.
        _ => None,
    }
}

fn parse_select(element: ElementRef<'_>, name: &str, controls: &mut Vec<Control>) {
    let mut options = Vec::new();
    for option in element.select(&selector("option")) {
        let value = match option.value().attr("value") {
            Some(value) => value.to_string(),
            None => option.text().collect(),
        };
        options.push(value);
    }
    if element.value().attr("multiple").is_some() {
        for option in options {
            controls.push(Control::SelectMultiple {
                name: name.to_string(),
                value: option,
            });
        }
    } else {
        controls.push(Control::SelectSingle {
            name: name.to_string(),
            options,
        });
    }
}

/// Finds the GET forms in a document and models their controls.
///
/// Forms that lack an `action` or `method` attribute and forms that are
/// not submitted with GET are skipped. An empty `action` submits to the
/// document's own path, with the query erased.
pub(super) fn find_forms(document: &Html, base_url: &Url) -> Vec<Form> {
    let mut forms = Vec::new();

    for form_element in document.select(&selector("form")) {
        let Some(action) = form_element.value().attr("action") else {
            continue;
        };
        let Some(method) = form_element.value().attr("method") else {
            continue;
        };
        let method = method.to_lowercase();
        if method != "get" {
            // TODO: Support POST submissions, behind a flag.
            continue;
        }
        let action = if action.is_empty() {
            base_url.path()
        } else {
            action
        };
        let Ok(submit_url) = base_url.join(action) else {
            continue;
        };

        let mut controls = Vec::new();
        // Radio buttons sharing a name form one control; group them in
        // document order.
        let mut radio_groups: Vec<(String, Vec<RadioButton>)> = Vec::new();
        let mut submit_buttons = Vec::new();

        for element in form_element.select(&selector("input")) {
            let Some(name) = submittable_name(element) else {
                continue;
            };
            match parse_input(element, name) {
                Some(InputControl::Plain(control)) => controls.push(control),
                Some(InputControl::Radio(button)) => {
                    match radio_groups.iter_mut().find(|(n, _)| *n == button.name) {
                        Some((_, group)) => group.push(button),
                        None => radio_groups.push((button.name.clone(), vec![button])),
                    }
                }
                Some(InputControl::Submit(button)) => submit_buttons.push(button),
                None => {}
            }
        }
        for element in form_element.select(&selector("select")) {
            if let Some(name) = submittable_name(element) {
                parse_select(element, name, &mut controls);
            }
        }
        for element in form_element.select(&selector("textarea")) {
            if let Some(name) = submittable_name(element) {
                controls.push(Control::TextArea {
                    name: name.to_string(),
                    value: element.text().collect(),
                });
            }
        }

        for (_, buttons) in radio_groups {
            if let Ok(control) = Control::radio_group(buttons) {
                controls.push(control);
            }
        }
        if let Ok(control) = Control::submit_buttons(submit_buttons) {
            controls.push(control);
        }
        // A form without submit buttons can still be submitted using
        // JavaScript, so it is kept.

        forms.push(Form::new(submit_url.to_string(), method, controls));
    }
    forms
}
