use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use serde::{Deserialize, Serialize};

use super::registry::{FieldRegistration, FieldRegistry};
use super::state::{FormAction, FormState};
use super::store::{
    FormStore, InitialState, MetadataSlice, Projection, ProjectionChange, StatusSlice,
    SubscriptionId, ValuesSlice,
};
use super::validation::{
    BoxError, Deferred, FormValidateFn, FormValidator, FunctionValidation, SchemaValidator,
    ValidatorKind, fatal, run_all_validations, run_schema_validation,
};
use crate::path::{Path, get_in, set_in};
use crate::value::Value;

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Clone, Debug, thiserror::Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("{kind} validator failed: {source}")]
    Validator {
        kind: ValidatorKind,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
    #[error("submit handler failed: {source}")]
    Submit {
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
}

impl FormError {
    pub fn submit(source: BoxError) -> Self {
        FormError::Submit {
            source: Arc::from(source),
        }
    }
}

pub type FormResult<T> = Result<T, FormError>;

/// Resolves once the validation a method kicked off has settled; `None`
/// when the call did not validate.
pub type PendingValidation = BoxFuture<'static, FormResult<Option<Value>>>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormOptions {
    pub validate_on_change: bool,
    pub validate_on_blur: bool,
    pub validate_on_mount: bool,
    pub enable_reinitialize: bool,
    pub initial_valid: Option<bool>,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            validate_on_change: true,
            validate_on_blur: true,
            validate_on_mount: false,
            enable_reinitialize: false,
            initial_valid: None,
        }
    }
}

/// Initial values plus the optional initial errors, touched and status.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormInitial {
    pub values: Value,
    pub errors: Option<Value>,
    pub touched: Option<Value>,
    pub status: Option<Value>,
}

impl FormInitial {
    pub fn new(values: impl Into<Value>) -> Self {
        Self {
            values: values.into(),
            ..Self::default()
        }
    }

    pub fn errors(mut self, errors: impl Into<Value>) -> Self {
        self.errors = Some(errors.into());
        self
    }

    pub fn touched(mut self, touched: impl Into<Value>) -> Self {
        self.touched = Some(touched.into());
        self
    }

    pub fn status(mut self, status: impl Into<Value>) -> Self {
        self.status = Some(status.into());
        self
    }
}

/// Overrides for [`FormController::reset_form`]. Unset trees fall back to
/// the current initial refs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResetState {
    pub values: Option<Value>,
    pub errors: Option<Value>,
    pub touched: Option<Value>,
    pub status: Option<Value>,
    pub is_submitting: bool,
    pub is_validating: bool,
    pub submit_count: Option<u32>,
}

impl ResetState {
    pub fn values(mut self, values: impl Into<Value>) -> Self {
        self.values = Some(values.into());
        self
    }

    pub fn errors(mut self, errors: impl Into<Value>) -> Self {
        self.errors = Some(errors.into());
        self
    }

    pub fn touched(mut self, touched: impl Into<Value>) -> Self {
        self.touched = Some(touched.into());
        self
    }

    pub fn status(mut self, status: impl Into<Value>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn submit_count(mut self, submit_count: u32) -> Self {
        self.submit_count = Some(submit_count);
        self
    }
}

pub enum SubmitOutcome {
    Settled,
    Pending(BoxFuture<'static, Result<Value, BoxError>>),
}

impl SubmitOutcome {
    pub fn pending(future: impl Future<Output = Result<Value, BoxError>> + Send + 'static) -> Self {
        SubmitOutcome::Pending(future.boxed())
    }
}

impl Debug for SubmitOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitOutcome::Settled => f.write_str("SubmitOutcome::Settled"),
            SubmitOutcome::Pending(_) => f.write_str("SubmitOutcome::Pending"),
        }
    }
}

/// Receives the values of a valid form. A [`SubmitOutcome::Pending`] result
/// drives `is_submitting` back to false when it settles; a settled one leaves
/// that to the handler.
pub trait SubmitHandler: Send + Sync {
    fn submit(&self, values: Value, form: &FormController) -> Result<SubmitOutcome, BoxError>;
}

impl<F> SubmitHandler for F
where
    F: Fn(Value, &FormController) -> Result<SubmitOutcome, BoxError> + Send + Sync,
{
    fn submit(&self, values: Value, form: &FormController) -> Result<SubmitOutcome, BoxError> {
        (self)(values, form)
    }
}

pub trait ResetHandler: Send + Sync {
    fn reset(&self, values: Value, form: &FormController) -> Deferred<()>;
}

impl<F> ResetHandler for F
where
    F: Fn(Value, &FormController) -> Deferred<()> + Send + Sync,
{
    fn reset(&self, values: Value, form: &FormController) -> Deferred<()> {
        (self)(values, form)
    }
}

pub struct FormBuilder {
    initial: FormInitial,
    options: FormOptions,
    schema: Option<Arc<dyn SchemaValidator>>,
    validate: Option<Arc<dyn FormValidateFn>>,
    on_reset: Option<Arc<dyn ResetHandler>>,
}

impl FormBuilder {
    pub fn new(initial_values: impl Into<Value>) -> Self {
        Self {
            initial: FormInitial::new(initial_values),
            options: FormOptions::default(),
            schema: None,
            validate: None,
            on_reset: None,
        }
    }

    pub fn initial_errors(mut self, errors: impl Into<Value>) -> Self {
        self.initial.errors = Some(errors.into());
        self
    }

    pub fn initial_touched(mut self, touched: impl Into<Value>) -> Self {
        self.initial.touched = Some(touched.into());
        self
    }

    pub fn initial_status(mut self, status: impl Into<Value>) -> Self {
        self.initial.status = Some(status.into());
        self
    }

    pub fn options(mut self, options: FormOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validation_schema(mut self, schema: impl SchemaValidator + 'static) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    pub fn validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&Value) -> FunctionValidation + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    pub fn validator(mut self, validator: FormValidator) -> Self {
        match validator {
            FormValidator::Schema(schema) => self.schema = Some(schema),
            FormValidator::Function(validate) => self.validate = Some(validate),
        }
        self
    }

    pub fn on_reset<F>(mut self, on_reset: F) -> Self
    where
        F: Fn(Value, &FormController) -> Deferred<()> + Send + Sync + 'static,
    {
        self.on_reset = Some(Arc::new(on_reset));
        self
    }

    pub fn build<F>(self, on_submit: F) -> FormController
    where
        F: Fn(Value, &FormController) -> Result<SubmitOutcome, BoxError> + Send + Sync + 'static,
    {
        self.build_with(Arc::new(on_submit))
    }

    pub fn build_with(self, on_submit: Arc<dyn SubmitHandler>) -> FormController {
        let FormInitial {
            values,
            errors,
            touched,
            status,
        } = self.initial;
        let initial = InitialState {
            values,
            errors: errors.unwrap_or_else(Value::map),
            touched: touched.unwrap_or_else(Value::map),
            status,
        };
        let state = FormState {
            values: initial.values.clone(),
            errors: initial.errors.clone(),
            touched: initial.touched.clone(),
            status: initial.status.clone(),
            ..FormState::default()
        };
        let id = FormId::next();
        tracing::debug!(form = id.0, "form controller created");

        FormController {
            inner: Arc::new(FormInner {
                id,
                options: self.options,
                store: FormStore::new(state, initial, self.options.initial_valid),
                registry: FieldRegistry::new(),
                schema: self.schema,
                validate: self.validate,
                on_submit,
                on_reset: self.on_reset,
                mounted: AtomicBool::new(true),
            }),
        }
    }
}

struct FormInner {
    id: FormId,
    options: FormOptions,
    store: FormStore,
    registry: FieldRegistry,
    schema: Option<Arc<dyn SchemaValidator>>,
    validate: Option<Arc<dyn FormValidateFn>>,
    on_submit: Arc<dyn SubmitHandler>,
    on_reset: Option<Arc<dyn ResetHandler>>,
    mounted: AtomicBool,
}

/// Handle to one form. Clones share the same state; the handle itself is the
/// stable "methods" projection, see [`FormController::ptr_eq`].
#[derive(Clone)]
pub struct FormController {
    inner: Arc<FormInner>,
}

impl Debug for FormController {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormController")
            .field("id", &self.inner.id)
            .field("options", &self.inner.options)
            .field("mounted", &self.is_mounted())
            .finish_non_exhaustive()
    }
}

fn settled(result: FormResult<Option<Value>>) -> PendingValidation {
    future::ready(result).boxed()
}

fn flatten(started: FormResult<PendingValidation>) -> PendingValidation {
    started.unwrap_or_else(|error| settled(Err(error)))
}

impl FormController {
    pub fn builder(initial_values: impl Into<Value>) -> FormBuilder {
        FormBuilder::new(initial_values)
    }

    pub fn id(&self) -> FormId {
        self.inner.id
    }

    pub fn options(&self) -> FormOptions {
        self.inner.options
    }

    /// True when both handles drive the same form.
    pub fn ptr_eq(&self, other: &FormController) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn store(&self) -> &FormStore {
        &self.inner.store
    }

    pub fn state(&self) -> FormResult<Arc<FormState>> {
        self.inner.store.state()
    }

    pub fn initial(&self) -> FormResult<InitialState> {
        self.inner.store.initial()
    }

    pub fn values(&self) -> FormResult<Arc<ValuesSlice>> {
        self.inner.store.values()
    }

    pub fn status(&self) -> FormResult<Arc<StatusSlice>> {
        self.inner.store.status()
    }

    pub fn metadata(&self) -> FormResult<Arc<MetadataSlice>> {
        self.inner.store.metadata()
    }

    pub fn methods(&self) -> FormController {
        self.clone()
    }

    pub fn subscribe(
        &self,
        projection: Projection,
        listener: impl Fn(&ProjectionChange) + Send + Sync + 'static,
    ) -> FormResult<SubscriptionId> {
        self.inner.store.subscribe(projection, listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> FormResult<bool> {
        self.inner.store.unsubscribe(id)
    }

    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> FormResult<R> {
        self.inner.store.batch(f)
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }

    /// Marks the form live and runs the on-mount validation when enabled.
    pub fn mount(&self) -> PendingValidation {
        self.inner.mounted.store(true, Ordering::SeqCst);
        if !self.inner.options.validate_on_mount {
            return settled(Ok(None));
        }
        match self.inner.store.initial() {
            Ok(initial) => self.validate_with(initial.values),
            Err(error) => settled(Err(error)),
        }
    }

    /// After this, every dispatch (including ones from passes still in
    /// flight) is dropped.
    pub fn unmount(&self) {
        self.inner.mounted.store(false, Ordering::SeqCst);
        tracing::debug!(form = self.inner.id.0, "form unmounted");
    }

    pub(super) fn dispatch(&self, action: FormAction) -> FormResult<bool> {
        if !self.is_mounted() {
            tracing::trace!(
                form = self.inner.id.0,
                action = action.name(),
                "dropping action dispatched after unmount"
            );
            return Ok(false);
        }
        self.inner.store.dispatch(action)
    }

    /// Rewrites the initial refs. Dropped after unmount, like [`Self::dispatch`].
    fn set_initial(&self, update: impl FnOnce(&mut InitialState)) -> FormResult<()> {
        if !self.is_mounted() {
            tracing::trace!(
                form = self.inner.id.0,
                "dropping initial state update after unmount"
            );
            return Ok(());
        }
        self.inner.store.set_initial(update)
    }

    pub fn register_field(
        &self,
        name: impl Into<Path>,
        registration: FieldRegistration,
    ) -> FormResult<()> {
        self.inner.registry.register(name, registration)
    }

    pub fn unregister_field(&self, name: impl Into<Path>) -> FormResult<()> {
        self.inner.registry.unregister(name).map(|_| ())
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.inner.registry
    }

    pub fn set_errors(&self, errors: impl Into<Value>) -> FormResult<()> {
        self.dispatch(FormAction::SetErrors(errors.into())).map(|_| ())
    }

    pub fn set_field_error(&self, field: impl Into<Path>, error: Option<Value>) -> FormResult<()> {
        self.dispatch(FormAction::SetFieldError {
            field: field.into(),
            error,
        })
        .map(|_| ())
    }

    pub fn set_status(&self, status: Option<Value>) -> FormResult<()> {
        self.dispatch(FormAction::SetStatus(status)).map(|_| ())
    }

    pub fn set_submitting(&self, is_submitting: bool) -> FormResult<()> {
        self.dispatch(FormAction::SetSubmitting(is_submitting))
            .map(|_| ())
    }

    pub fn set_form_state(
        &self,
        updater: impl FnOnce(&FormState) -> FormState + Send + 'static,
    ) -> FormResult<()> {
        self.dispatch(FormAction::set_form_state(updater)).map(|_| ())
    }

    fn validate_with(&self, values: Value) -> PendingValidation {
        self.validate_form(Some(values))
            .map(|result| result.map(Some))
            .boxed()
    }

    fn validate_if(&self, enabled: bool, values: Value) -> PendingValidation {
        if enabled {
            self.validate_with(values)
        } else {
            settled(Ok(None))
        }
    }

    pub fn set_values(
        &self,
        values: impl Into<Value>,
        should_validate: Option<bool>,
    ) -> PendingValidation {
        let values = values.into();
        flatten(self.dispatch(FormAction::SetValues(values.clone())).map(|_| {
            let enabled = should_validate.unwrap_or(self.inner.options.validate_on_change);
            self.validate_if(enabled, values)
        }))
    }

    pub fn set_values_with(
        &self,
        update: impl FnOnce(&Value) -> Value,
        should_validate: Option<bool>,
    ) -> PendingValidation {
        match self.state() {
            Ok(state) => self.set_values(update(&state.values), should_validate),
            Err(error) => settled(Err(error)),
        }
    }

    pub fn set_field_value(
        &self,
        field: impl Into<Path>,
        value: impl Into<Value>,
        should_validate: Option<bool>,
    ) -> PendingValidation {
        self.write_field_value(field.into(), Some(value.into()), should_validate)
    }

    pub fn set_field_value_with(
        &self,
        field: impl Into<Path>,
        update: impl FnOnce(Option<&Value>) -> Value,
        should_validate: Option<bool>,
    ) -> PendingValidation {
        let field = field.into();
        match self.state() {
            Ok(state) => {
                let value = update(get_in(&state.values, &field));
                self.write_field_value(field, Some(value), should_validate)
            }
            Err(error) => settled(Err(error)),
        }
    }

    /// `None` removes the field from the values tree.
    pub(super) fn write_field_value(
        &self,
        field: Path,
        value: Option<Value>,
        should_validate: Option<bool>,
    ) -> PendingValidation {
        flatten(self.state().and_then(|state| {
            let next = set_in(&state.values, &field, value.clone());
            self.dispatch(FormAction::SetFieldValue { field, value })?;
            let enabled = should_validate.unwrap_or(self.inner.options.validate_on_change);
            Ok(self.validate_if(enabled, next))
        }))
    }

    pub fn set_touched(
        &self,
        touched: impl Into<Value>,
        should_validate: Option<bool>,
    ) -> PendingValidation {
        flatten(
            self.dispatch(FormAction::SetTouched(touched.into()))
                .and_then(|_| self.state())
                .map(|state| {
                    let enabled = should_validate.unwrap_or(self.inner.options.validate_on_blur);
                    self.validate_if(enabled, state.values.clone())
                }),
        )
    }

    pub fn set_field_touched(
        &self,
        field: impl Into<Path>,
        touched: bool,
        should_validate: Option<bool>,
    ) -> PendingValidation {
        flatten(
            self.dispatch(FormAction::SetFieldTouched {
                field: field.into(),
                touched: Some(touched),
            })
            .and_then(|_| self.state())
            .map(|state| {
                let enabled = should_validate.unwrap_or(self.inner.options.validate_on_blur);
                self.validate_if(enabled, state.values.clone())
            }),
        )
    }

    /// Runs a full validation pass over `values` (the current values when
    /// `None`) and stores the merged errors.
    ///
    /// `is_validating` flips to true before this returns; it only flips back
    /// once the returned future settles.
    pub fn validate_form(&self, values: Option<Value>) -> BoxFuture<'static, FormResult<Value>> {
        match self.start_validation(values) {
            Ok(pass) => pass,
            Err(error) => future::ready(Err(error)).boxed(),
        }
    }

    fn start_validation(
        &self,
        values: Option<Value>,
    ) -> FormResult<BoxFuture<'static, FormResult<Value>>> {
        let values = match values {
            Some(values) => values,
            None => self.state()?.values.clone(),
        };
        self.dispatch(FormAction::SetValidating(true))?;
        let fields = self.inner.registry.snapshot()?;
        let pass = run_all_validations(
            &values,
            fields,
            self.inner.schema.as_ref(),
            self.inner.validate.as_ref(),
        );
        Ok(settle_validation(self.clone(), pass).boxed())
    }

    /// Validates one registered field, or the schema at that path when the
    /// field has no validator of its own.
    pub fn validate_field(&self, name: impl Into<Path>) -> PendingValidation {
        flatten(self.start_field_validation(name.into()))
    }

    fn start_field_validation(&self, name: Path) -> FormResult<PendingValidation> {
        let values = self.state()?.values.clone();

        if let Some(validator) = self.inner.registry.validator(&name)? {
            return match validator.validate(get_in(&values, &name)) {
                Deferred::Ready(result) => {
                    let error = result
                        .map_err(|source| fatal(ValidatorKind::Field, source))?
                        .map(Value::from);
                    self.dispatch(FormAction::SetFieldError {
                        field: name,
                        error: error.clone(),
                    })?;
                    Ok(settled(Ok(error)))
                }
                Deferred::Pending(pending) => {
                    self.dispatch(FormAction::SetValidating(true))?;
                    let pending = pending
                        .map(|result| {
                            result
                                .map(|error| error.map(Value::from))
                                .map_err(|source| fatal(ValidatorKind::Field, source))
                        })
                        .boxed();
                    Ok(settle_field(self.clone(), name, pending).boxed())
                }
            };
        }

        if let Some(schema) = &self.inner.schema {
            self.dispatch(FormAction::SetValidating(true))?;
            let at = name.clone();
            let pending = run_schema_validation(schema, &values, Some(&name))
                .map(move |result| result.map(|errors| get_in(&errors, &at).cloned()))
                .boxed();
            return Ok(settle_field(self.clone(), name, pending).boxed());
        }

        Ok(settled(Ok(None)))
    }

    /// Restores the form to `next`, falling back to the current initial refs,
    /// and makes the result the new initial state.
    pub fn reset_form(&self, next: Option<ResetState>) -> BoxFuture<'static, FormResult<()>> {
        match self.start_reset(next.unwrap_or_default()) {
            Ok(reset) => reset,
            Err(error) => future::ready(Err(error)).boxed(),
        }
    }

    fn start_reset(&self, next: ResetState) -> FormResult<BoxFuture<'static, FormResult<()>>> {
        if !self.is_mounted() {
            return Ok(future::ready(Ok(())).boxed());
        }
        let current = self.inner.store.initial()?;
        let initial = InitialState {
            values: next.values.unwrap_or(current.values),
            errors: next.errors.unwrap_or(current.errors),
            touched: next.touched.unwrap_or(current.touched),
            status: next.status.or(current.status),
        };
        let reset = FormAction::ResetForm(FormState {
            values: initial.values.clone(),
            errors: initial.errors.clone(),
            touched: initial.touched.clone(),
            status: initial.status.clone(),
            is_submitting: next.is_submitting,
            is_validating: next.is_validating,
            submit_count: next.submit_count.unwrap_or(0),
        });
        self.set_initial(move |refs| *refs = initial)?;

        let pending = match &self.inner.on_reset {
            Some(on_reset) => on_reset.reset(self.state()?.values.clone(), self),
            None => Deferred::Ready(()),
        };
        match pending {
            Deferred::Ready(()) => {
                self.dispatch(reset)?;
                Ok(future::ready(Ok(())).boxed())
            }
            Deferred::Pending(pending) => {
                let form = self.clone();
                Ok(async move {
                    pending.await;
                    form.dispatch(reset).map(|_| ())
                }
                .boxed())
            }
        }
    }

    /// Applies new initial props. Only effective with `enable_reinitialize`;
    /// changed initial values reset the form even when it is dirty.
    pub fn reinitialize(&self, next: FormInitial) -> PendingValidation {
        if !self.inner.options.enable_reinitialize || !self.is_mounted() {
            return settled(Ok(None));
        }
        flatten(self.start_reinitialize(next))
    }

    fn start_reinitialize(&self, next: FormInitial) -> FormResult<PendingValidation> {
        let current = self.inner.store.initial()?;

        let mut reset = None;
        let mut revalidate = None;
        if next.values != current.values {
            let values = next.values.clone();
            self.set_initial(move |refs| refs.values = values)?;
            reset = Some(self.reset_form(None));
            if self.inner.options.validate_on_mount {
                revalidate = Some(next.values.clone());
            }
        }

        let errors = next.errors.unwrap_or_else(Value::map);
        if errors != current.errors {
            let stored = errors.clone();
            self.set_initial(move |refs| refs.errors = stored)?;
            self.dispatch(FormAction::SetErrors(errors))?;
        }

        let touched = next.touched.unwrap_or_else(Value::map);
        if touched != current.touched {
            let stored = touched.clone();
            self.set_initial(move |refs| refs.touched = stored)?;
            self.dispatch(FormAction::SetTouched(touched))?;
        }

        if next.status != current.status {
            let stored = next.status.clone();
            self.set_initial(move |refs| refs.status = stored)?;
            self.dispatch(FormAction::SetStatus(next.status))?;
        }

        tracing::debug!(
            form = self.inner.id.0,
            reset = reset.is_some(),
            "form reinitialized"
        );
        Ok(finish_reinitialize(self.clone(), reset, revalidate).boxed())
    }

    /// Touches every field, validates, and hands valid values to the submit
    /// handler. Resolves with the handler's result when it returned one.
    pub fn submit_form(&self) -> BoxFuture<'static, FormResult<Option<Value>>> {
        if let Err(error) = self.dispatch(FormAction::SubmitAttempt) {
            return future::ready(Err(error)).boxed();
        }
        let validation = self.validate_form(None);
        run_submit(self.clone(), validation).boxed()
    }
}

async fn settle_validation(
    form: FormController,
    pass: BoxFuture<'static, FormResult<Value>>,
) -> FormResult<Value> {
    match pass.await {
        Ok(errors) => {
            form.batch(|| -> FormResult<()> {
                form.dispatch(FormAction::SetValidating(false))?;
                form.dispatch(FormAction::SetErrors(errors.clone()))?;
                Ok(())
            })??;
            Ok(errors)
        }
        Err(error) => {
            form.dispatch(FormAction::SetValidating(false))?;
            Err(error)
        }
    }
}

async fn settle_field(
    form: FormController,
    field: Path,
    pending: PendingValidation,
) -> FormResult<Option<Value>> {
    match pending.await {
        Ok(error) => {
            let stored = error.clone();
            form.batch(|| -> FormResult<()> {
                form.dispatch(FormAction::SetFieldError {
                    field,
                    error: stored,
                })?;
                form.dispatch(FormAction::SetValidating(false))?;
                Ok(())
            })??;
            Ok(error)
        }
        Err(error) => {
            form.dispatch(FormAction::SetValidating(false))?;
            Err(error)
        }
    }
}

async fn finish_reinitialize(
    form: FormController,
    reset: Option<BoxFuture<'static, FormResult<()>>>,
    revalidate: Option<Value>,
) -> FormResult<Option<Value>> {
    if let Some(reset) = reset {
        reset.await?;
    }
    match revalidate {
        Some(values) => form.validate_form(Some(values)).await.map(Some),
        None => Ok(None),
    }
}

async fn run_submit(
    form: FormController,
    validation: BoxFuture<'static, FormResult<Value>>,
) -> FormResult<Option<Value>> {
    let errors = match validation.await {
        Ok(errors) => errors,
        Err(error) => {
            form.dispatch(FormAction::SubmitFailure)?;
            return Err(error);
        }
    };
    if !errors.has_no_keys() {
        tracing::debug!(form = form.id().0, "submit blocked by validation errors");
        form.dispatch(FormAction::SubmitFailure)?;
        return Ok(None);
    }

    let values = form.state()?.values.clone();
    // A handler that fails before handing back an outcome keeps `is_submitting`
    // as it left it.
    let outcome = form
        .inner
        .on_submit
        .submit(values, &form)
        .map_err(FormError::submit)?;
    match outcome {
        SubmitOutcome::Settled => Ok(None),
        SubmitOutcome::Pending(pending) => match pending.await {
            Ok(result) => {
                form.dispatch(FormAction::SubmitSuccess)?;
                Ok(Some(result))
            }
            Err(source) => {
                form.dispatch(FormAction::SubmitFailure)?;
                Err(FormError::submit(source))
            }
        },
    }
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
