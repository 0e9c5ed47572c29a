use futures::FutureExt;
use futures::future::{self, BoxFuture};

use super::controller::{FormController, FormResult, PendingValidation};
use crate::path::{Path, get_in};
use crate::value::Value;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum InputKind {
    #[default]
    Text,
    Number,
    Range,
    Checkbox,
    Radio,
    Select,
    SelectMultiple,
}

/// What an input reports when it changes or loses focus.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputEvent {
    pub name: Option<String>,
    pub id: Option<String>,
    pub kind: InputKind,
    pub value: String,
    pub checked: bool,
    pub selected: Vec<String>,
}

impl InputEvent {
    pub fn new(kind: InputKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn selected<S: Into<String>>(mut self, selected: impl IntoIterator<Item = S>) -> Self {
        self.selected = selected.into_iter().map(Into::into).collect();
        self
    }

    fn field(&self) -> Option<Path> {
        self.name
            .as_deref()
            .or(self.id.as_deref())
            .map(Path::parse)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FormEvent {
    pub default_prevented: bool,
    pub propagation_stopped: bool,
}

impl FormEvent {
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldConfig {
    pub name: Path,
    pub kind: InputKind,
    pub value: Option<Value>,
}

impl FieldConfig {
    pub fn new(name: impl Into<Path>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: InputKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl From<&str> for FieldConfig {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<Path> for FieldConfig {
    fn from(name: Path) -> Self {
        Self::new(name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldInputProps {
    pub name: Path,
    pub value: Option<Value>,
    pub checked: Option<bool>,
    pub multiple: Option<bool>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldMeta {
    pub value: Option<Value>,
    pub error: Option<Value>,
    pub touched: bool,
    pub initial_value: Option<Value>,
    pub initial_touched: bool,
    pub initial_error: Option<Value>,
}

/// Setters bound to one field path.
#[derive(Clone, Debug)]
pub struct FieldHelpers {
    form: FormController,
    name: Path,
}

impl FieldHelpers {
    pub fn name(&self) -> &Path {
        &self.name
    }

    pub fn set_value(&self, value: impl Into<Value>, should_validate: Option<bool>) -> PendingValidation {
        self.form
            .set_field_value(self.name.clone(), value, should_validate)
    }

    pub fn set_touched(&self, touched: bool, should_validate: Option<bool>) -> PendingValidation {
        self.form
            .set_field_touched(self.name.clone(), touched, should_validate)
    }

    pub fn set_error(&self, error: Option<Value>) -> FormResult<()> {
        self.form.set_field_error(self.name.clone(), error)
    }
}

fn warn_missing_field(handler: &'static str) {
    if cfg!(debug_assertions) {
        tracing::warn!(
            handler,
            "input event carries neither a name nor an id, so no field can be updated"
        );
    }
}

/// `parseFloat`-style parse: the longest numeric prefix, `None` when there is
/// none.
fn parse_number_prefix(input: &str) -> Option<f64> {
    let trimmed = input.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let fraction_start = end + 1;
        let mut fraction_end = fraction_start;
        while fraction_end < bytes.len() && bytes[fraction_end].is_ascii_digit() {
            fraction_end += 1;
        }
        mantissa_digits += fraction_end - fraction_start;
        if mantissa_digits > 0 {
            end = fraction_end;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exponent_end = end + 1;
        if matches!(bytes.get(exponent_end), Some(b'+' | b'-')) {
            exponent_end += 1;
        }
        let exponent_digits_start = exponent_end;
        while exponent_end < bytes.len() && bytes[exponent_end].is_ascii_digit() {
            exponent_end += 1;
        }
        if exponent_end > exponent_digits_start {
            end = exponent_end;
        }
    }
    trimmed[..end].parse::<f64>().ok().filter(|number| number.is_finite())
}

/// Next value of a checkbox field: a boolean for single checkboxes, the
/// toggled list for grouped ones. A value already in the list is removed
/// whatever `checked` says.
fn checkbox_value(current: Option<&Value>, checked: bool, value: &str) -> Value {
    if let Some(Value::Bool(_)) = current {
        return Value::Bool(checked);
    }
    let mut items = match current {
        Some(Value::List(items)) => items.to_vec(),
        _ if value.is_empty() || value == "true" || value == "false" => {
            return Value::Bool(checked);
        }
        _ => Vec::new(),
    };
    match items.iter().position(|item| item.as_str() == Some(value)) {
        None if checked && !value.is_empty() => items.push(Value::from(value)),
        None => {}
        Some(index) => {
            items.remove(index);
        }
    }
    Value::from(items)
}

impl FormController {
    /// Parses an input event into a field value and writes it.
    pub fn handle_change(&self, event: &InputEvent) -> PendingValidation {
        match event.field() {
            Some(field) => self.handle_change_at(field, event),
            None => {
                warn_missing_field("handle_change");
                future::ready(Ok(None)).boxed()
            }
        }
    }

    pub fn handle_change_at(&self, field: impl Into<Path>, event: &InputEvent) -> PendingValidation {
        let field = field.into();
        let value = match event.kind {
            InputKind::Number | InputKind::Range => parse_number_prefix(&event.value)
                .map_or_else(|| Value::from(""), Value::from),
            InputKind::Checkbox => match self.state() {
                Ok(state) => checkbox_value(get_in(&state.values, &field), event.checked, &event.value),
                Err(error) => return future::ready(Err(error)).boxed(),
            },
            InputKind::SelectMultiple => Value::from_items(event.selected.iter().map(String::as_str)),
            InputKind::Text | InputKind::Radio | InputKind::Select => Value::from(event.value.as_str()),
        };
        self.set_field_value(field, value, None)
    }

    /// Writes a raw string, for callers that have no event.
    pub fn handle_change_text(&self, field: impl Into<Path>, text: impl Into<String>) -> PendingValidation {
        self.set_field_value(field, Value::String(text.into()), None)
    }

    pub fn handle_blur(&self, event: &InputEvent) -> PendingValidation {
        match event.field() {
            Some(field) => self.set_field_touched(field, true, None),
            None => {
                warn_missing_field("handle_blur");
                future::ready(Ok(None)).boxed()
            }
        }
    }

    pub fn handle_blur_at(&self, field: impl Into<Path>) -> PendingValidation {
        self.set_field_touched(field, true, None)
    }

    /// Submits the form. Failures are logged instead of returned.
    pub fn handle_submit(&self, event: Option<&mut FormEvent>) -> BoxFuture<'static, ()> {
        if let Some(event) = event {
            event.prevent_default();
            event.stop_propagation();
        }
        let form_id = self.id();
        self.submit_form()
            .map(move |result| {
                if let Err(error) = result {
                    tracing::warn!(
                        form = form_id.0,
                        %error,
                        "an unhandled error was caught from submit_form"
                    );
                }
            })
            .boxed()
    }

    pub fn handle_reset(&self, event: Option<&mut FormEvent>) -> BoxFuture<'static, FormResult<()>> {
        if let Some(event) = event {
            event.prevent_default();
            event.stop_propagation();
        }
        self.reset_form(None)
    }

    pub fn get_field_props(&self, config: impl Into<FieldConfig>) -> FormResult<FieldInputProps> {
        let FieldConfig { name, kind, value } = config.into();
        let state = self.state()?;
        let current = get_in(&state.values, &name).cloned();

        let props = match kind {
            InputKind::Checkbox => match value {
                None => FieldInputProps {
                    checked: Some(current.as_ref().is_some_and(Value::is_truthy)),
                    value: current,
                    name,
                    multiple: None,
                },
                Some(value) => FieldInputProps {
                    checked: Some(
                        current
                            .as_ref()
                            .and_then(Value::as_list)
                            .is_some_and(|items| items.contains(&value)),
                    ),
                    value: Some(value),
                    name,
                    multiple: None,
                },
            },
            InputKind::Radio => FieldInputProps {
                checked: Some(match (&current, &value) {
                    (Some(current), Some(value)) => current.same(value),
                    _ => false,
                }),
                value,
                name,
                multiple: None,
            },
            InputKind::SelectMultiple => FieldInputProps {
                value: Some(current.unwrap_or_else(Value::list)),
                name,
                checked: None,
                multiple: Some(true),
            },
            InputKind::Text | InputKind::Number | InputKind::Range | InputKind::Select => {
                FieldInputProps {
                    value: current,
                    name,
                    checked: None,
                    multiple: None,
                }
            }
        };
        Ok(props)
    }

    pub fn get_field_meta(&self, name: impl Into<Path>) -> FormResult<FieldMeta> {
        let name = name.into();
        let state = self.state()?;
        let initial = self.initial()?;
        Ok(FieldMeta {
            value: get_in(&state.values, &name).cloned(),
            error: get_in(&state.errors, &name).cloned(),
            touched: get_in(&state.touched, &name).is_some_and(Value::is_truthy),
            initial_value: get_in(&initial.values, &name).cloned(),
            initial_touched: get_in(&initial.touched, &name).is_some_and(Value::is_truthy),
            initial_error: get_in(&initial.errors, &name).cloned(),
        })
    }

    pub fn get_field_helpers(&self, name: impl Into<Path>) -> FieldHelpers {
        FieldHelpers {
            form: self.clone(),
            name: name.into(),
        }
    }
}
