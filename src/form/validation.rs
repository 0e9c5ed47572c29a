use std::fmt::{Debug, Display, Formatter};
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, BoxFuture};

use super::controller::{FormError, FormResult};
use super::registry::RegisteredValidator;
use crate::nested::{merge_all, prepare_for_validation};
use crate::path::{Path, get_in, set_in};
use crate::value::Value;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A callback result that is either available now or still in flight.
pub enum Deferred<T> {
    Ready(T),
    Pending(BoxFuture<'static, T>),
}

impl<T> Deferred<T>
where
    T: Send + 'static,
{
    pub fn ready(value: T) -> Self {
        Deferred::Ready(value)
    }

    pub fn pending(future: impl Future<Output = T> + Send + 'static) -> Self {
        Deferred::Pending(future.boxed())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Deferred::Pending(_))
    }

    pub fn into_future(self) -> BoxFuture<'static, T> {
        match self {
            Deferred::Ready(value) => future::ready(value).boxed(),
            Deferred::Pending(future) => future,
        }
    }
}

impl<T> Debug for Deferred<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Deferred::Ready(_) => f.write_str("Deferred::Ready"),
            Deferred::Pending(_) => f.write_str("Deferred::Pending"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ValidatorKind {
    Field,
    Schema,
    Function,
}

impl Display for ValidatorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ValidatorKind::Field => "field",
            ValidatorKind::Schema => "schema",
            ValidatorKind::Function => "function",
        })
    }
}

pub type FieldValidation = Deferred<Result<Option<String>, BoxError>>;

/// Per-field validator: `None` (or an empty message) means the field is valid.
pub trait FieldValidator: Send + Sync {
    fn validate(&self, value: Option<&Value>) -> FieldValidation;
}

impl<F> FieldValidator for F
where
    F: Fn(Option<&Value>) -> FieldValidation + Send + Sync,
{
    fn validate(&self, value: Option<&Value>) -> FieldValidation {
        (self)(value)
    }
}

pub type FunctionValidation = Deferred<Result<Option<Value>, BoxError>>;

/// Whole-form validate function returning an error tree, `None` for "no errors".
pub trait FormValidateFn: Send + Sync {
    fn validate(&self, values: &Value) -> FunctionValidation;
}

impl<F> FormValidateFn for F
where
    F: Fn(&Value) -> FunctionValidation + Send + Sync,
{
    fn validate(&self, values: &Value) -> FunctionValidation {
        (self)(values)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationIssue {
    pub path: Path,
    pub message: String,
}

/// The recognised "values are invalid" rejection of a schema validator.
#[derive(Clone, Debug, Default, Eq, PartialEq, thiserror::Error)]
#[error("{} validation issue(s)", .issues.len())]
pub struct ValidationFailure {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationFailure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(path: impl Into<Path>, message: impl Into<String>) -> Self {
        Self::new().issue(path, message)
    }

    pub fn issue(mut self, path: impl Into<Path>, message: impl Into<String>) -> Self {
        self.issues.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
        });
        self
    }

    /// Folds the issues into an error tree, keeping the first message per path.
    pub fn to_errors(&self) -> Value {
        self.issues.iter().fold(Value::map(), |errors, issue| {
            if get_in(&errors, &issue.path).is_some_and(Value::is_truthy) {
                errors
            } else {
                set_in(&errors, &issue.path, Some(Value::from(issue.message.as_str())))
            }
        })
    }
}

#[derive(Debug)]
pub enum SchemaError {
    Invalid(ValidationFailure),
    Other(BoxError),
}

impl From<ValidationFailure> for SchemaError {
    fn from(failure: ValidationFailure) -> Self {
        SchemaError::Invalid(failure)
    }
}

pub type SchemaFuture = BoxFuture<'static, Result<Value, SchemaError>>;

/// Whole-schema validator. Resolves with the (normalised) values when they are
/// valid and rejects with [`SchemaError::Invalid`] otherwise.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, values: Value) -> SchemaFuture;

    fn validate_at(&self, _path: &Path, values: Value) -> SchemaFuture {
        self.validate(values)
    }
}

#[derive(Clone)]
pub enum FormValidator {
    Schema(Arc<dyn SchemaValidator>),
    Function(Arc<dyn FormValidateFn>),
}

impl FormValidator {
    pub fn schema(validator: impl SchemaValidator + 'static) -> Self {
        FormValidator::Schema(Arc::new(validator))
    }

    pub fn function<F>(validate: F) -> Self
    where
        F: Fn(&Value) -> FunctionValidation + Send + Sync + 'static,
    {
        FormValidator::Function(Arc::new(validate))
    }

    pub fn kind(&self) -> ValidatorKind {
        match self {
            FormValidator::Schema(_) => ValidatorKind::Schema,
            FormValidator::Function(_) => ValidatorKind::Function,
        }
    }
}

impl Debug for FormValidator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "FormValidator::{:?}", self.kind())
    }
}

pub(super) fn fatal(kind: ValidatorKind, source: BoxError) -> FormError {
    if cfg!(debug_assertions) {
        tracing::warn!(%kind, error = %source, "an unhandled error was caught during validation");
    }
    FormError::Validator {
        kind,
        source: Arc::from(source),
    }
}

/// Runs every field validator of the snapshot against `values` and collects
/// the truthy messages into an error tree.
pub(super) fn run_field_validations(
    values: &Value,
    fields: Vec<RegisteredValidator>,
) -> BoxFuture<'static, FormResult<Value>> {
    let (paths, pending): (Vec<_>, Vec<_>) = fields
        .into_iter()
        .map(|(path, validator)| {
            let outcome = validator.validate(get_in(values, &path)).into_future();
            (path, outcome)
        })
        .unzip();
    collect_field_errors(paths, pending).boxed()
}

async fn collect_field_errors(
    paths: Vec<Path>,
    pending: Vec<BoxFuture<'static, Result<Option<String>, BoxError>>>,
) -> FormResult<Value> {
    let results = future::join_all(pending).await;
    let mut errors = Value::map();
    for (path, result) in paths.iter().zip(results) {
        let message = result.map_err(|source| fatal(ValidatorKind::Field, source))?;
        if let Some(message) = message.filter(|message| !message.is_empty()) {
            errors = set_in(&errors, path, Some(Value::from(message)));
        }
    }
    Ok(errors)
}

pub(super) fn run_schema_validation(
    schema: &Arc<dyn SchemaValidator>,
    values: &Value,
    at: Option<&Path>,
) -> BoxFuture<'static, FormResult<Value>> {
    let pending = match at {
        Some(path) => schema.validate_at(path, values.clone()),
        None => schema.validate(prepare_for_validation(values)),
    };
    schema_errors(pending).boxed()
}

async fn schema_errors(pending: SchemaFuture) -> FormResult<Value> {
    match pending.await {
        Ok(_) => Ok(Value::map()),
        Err(SchemaError::Invalid(failure)) => Ok(failure.to_errors()),
        Err(SchemaError::Other(source)) => Err(fatal(ValidatorKind::Schema, source)),
    }
}

pub(super) fn run_validate_fn(
    validate: &Arc<dyn FormValidateFn>,
    values: &Value,
) -> BoxFuture<'static, FormResult<Value>> {
    let pending = validate.validate(values).into_future();
    validate_fn_errors(pending).boxed()
}

async fn validate_fn_errors(
    pending: BoxFuture<'static, Result<Option<Value>, BoxError>>,
) -> FormResult<Value> {
    match pending.await {
        Ok(errors) => Ok(errors.unwrap_or_else(Value::map)),
        Err(source) => Err(fatal(ValidatorKind::Function, source)),
    }
}

/// One validation pass: field-level, schema and validate-function results are
/// awaited side by side and merged in that order, so a later source wins on
/// a shared path whatever order they settled in.
pub fn run_all_validations(
    values: &Value,
    fields: Vec<RegisteredValidator>,
    schema: Option<&Arc<dyn SchemaValidator>>,
    validate: Option<&Arc<dyn FormValidateFn>>,
) -> BoxFuture<'static, FormResult<Value>> {
    let field_count = fields.len();
    let field_pass = run_field_validations(values, fields);
    let schema_pass = match schema {
        Some(schema) => run_schema_validation(schema, values, None),
        None => future::ready(Ok(Value::map())).boxed(),
    };
    let validate_pass = match validate {
        Some(validate) => run_validate_fn(validate, values),
        None => future::ready(Ok(Value::map())).boxed(),
    };
    merge_passes(field_count, field_pass, schema_pass, validate_pass).boxed()
}

async fn merge_passes(
    field_count: usize,
    field_pass: BoxFuture<'static, FormResult<Value>>,
    schema_pass: BoxFuture<'static, FormResult<Value>>,
    validate_pass: BoxFuture<'static, FormResult<Value>>,
) -> FormResult<Value> {
    let (field_errors, schema_errors, validate_errors) =
        future::try_join3(field_pass, schema_pass, validate_pass).await?;
    let merged = merge_all([&field_errors, &schema_errors, &validate_errors]);
    tracing::debug!(
        fields = field_count,
        invalid = !merged.has_no_keys(),
        "validation pass settled"
    );
    Ok(merged)
}
