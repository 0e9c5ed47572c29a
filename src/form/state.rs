use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::nested::set_nested_values;
use crate::path::{Path, set_in};
use crate::value::Value;

#[derive(Clone, Debug, PartialEq)]
pub struct FormState {
    pub values: Value,
    pub errors: Value,
    pub touched: Value,
    pub status: Option<Value>,
    pub is_submitting: bool,
    pub is_validating: bool,
    pub submit_count: u32,
}

impl FormState {
    pub fn new(values: Value) -> Self {
        Self {
            values,
            errors: Value::map(),
            touched: Value::map(),
            status: None,
            is_submitting: false,
            is_validating: false,
            submit_count: 0,
        }
    }
}

impl Default for FormState {
    fn default() -> Self {
        Self::new(Value::map())
    }
}

pub type StateUpdater = Box<dyn FnOnce(&FormState) -> FormState + Send>;

pub enum FormAction {
    SetValues(Value),
    SetTouched(Value),
    SetErrors(Value),
    SetStatus(Option<Value>),
    SetSubmitting(bool),
    SetValidating(bool),
    SetFieldValue { field: Path, value: Option<Value> },
    SetFieldTouched { field: Path, touched: Option<bool> },
    SetFieldError { field: Path, error: Option<Value> },
    ResetForm(FormState),
    SetFormState(StateUpdater),
    SubmitAttempt,
    SubmitFailure,
    SubmitSuccess,
}

impl FormAction {
    pub fn set_form_state(updater: impl FnOnce(&FormState) -> FormState + Send + 'static) -> Self {
        FormAction::SetFormState(Box::new(updater))
    }

    pub fn name(&self) -> &'static str {
        match self {
            FormAction::SetValues(_) => "SET_VALUES",
            FormAction::SetTouched(_) => "SET_TOUCHED",
            FormAction::SetErrors(_) => "SET_ERRORS",
            FormAction::SetStatus(_) => "SET_STATUS",
            FormAction::SetSubmitting(_) => "SET_ISSUBMITTING",
            FormAction::SetValidating(_) => "SET_ISVALIDATING",
            FormAction::SetFieldValue { .. } => "SET_FIELD_VALUE",
            FormAction::SetFieldTouched { .. } => "SET_FIELD_TOUCHED",
            FormAction::SetFieldError { .. } => "SET_FIELD_ERROR",
            FormAction::ResetForm(_) => "RESET_FORM",
            FormAction::SetFormState(_) => "SET_FORM_STATE",
            FormAction::SubmitAttempt => "SUBMIT_ATTEMPT",
            FormAction::SubmitFailure => "SUBMIT_FAILURE",
            FormAction::SubmitSuccess => "SUBMIT_SUCCESS",
        }
    }
}

impl Debug for FormAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormAction::SetFieldValue { field, value } => f
                .debug_struct("SetFieldValue")
                .field("field", field)
                .field("value", value)
                .finish(),
            FormAction::SetFieldTouched { field, touched } => f
                .debug_struct("SetFieldTouched")
                .field("field", field)
                .field("touched", touched)
                .finish(),
            FormAction::SetFieldError { field, error } => f
                .debug_struct("SetFieldError")
                .field("field", field)
                .field("error", error)
                .finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// The only function that produces form state.
///
/// Every transition yields a fresh `Arc`, except when `SetErrors` carries a
/// tree deep-equal to the current errors; then the input is handed back.
pub fn reduce(state: &Arc<FormState>, action: FormAction) -> Arc<FormState> {
    let current = state.as_ref();
    let next = match action {
        FormAction::SetValues(values) => FormState {
            values,
            ..current.clone()
        },
        FormAction::SetTouched(touched) => FormState {
            touched,
            ..current.clone()
        },
        FormAction::SetErrors(errors) => {
            if current.errors == errors {
                return Arc::clone(state);
            }
            FormState {
                errors,
                ..current.clone()
            }
        }
        FormAction::SetStatus(status) => FormState {
            status,
            ..current.clone()
        },
        FormAction::SetSubmitting(is_submitting) => FormState {
            is_submitting,
            ..current.clone()
        },
        FormAction::SetValidating(is_validating) => FormState {
            is_validating,
            ..current.clone()
        },
        FormAction::SetFieldValue { field, value } => FormState {
            values: set_in(&current.values, &field, value),
            ..current.clone()
        },
        FormAction::SetFieldTouched { field, touched } => FormState {
            touched: set_in(&current.touched, &field, touched.map(Value::Bool)),
            ..current.clone()
        },
        FormAction::SetFieldError { field, error } => FormState {
            errors: set_in(&current.errors, &field, error),
            ..current.clone()
        },
        FormAction::ResetForm(next) => next,
        FormAction::SetFormState(updater) => updater(current),
        FormAction::SubmitAttempt => FormState {
            touched: set_nested_values(&current.values, &Value::Bool(true)),
            is_submitting: true,
            submit_count: current.submit_count.saturating_add(1),
            ..current.clone()
        },
        FormAction::SubmitFailure | FormAction::SubmitSuccess => FormState {
            is_submitting: false,
            ..current.clone()
        },
    };
    Arc::new(next)
}
