use super::*;
use futures::FutureExt;
use futures::executor::block_on;
use futures::future;
use futures_timer::Delay;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::path::{Path, get_in};
use crate::value::Value;

fn tree(value: serde_json::Value) -> Value {
    Value::from(value)
}

fn settled_submit(_values: Value, _form: &FormController) -> Result<SubmitOutcome, BoxError> {
    Ok(SubmitOutcome::Settled)
}

fn require_email(values: &Value) -> FunctionValidation {
    let present = get_in(values, &Path::parse("email")).is_some_and(Value::is_truthy);
    Deferred::ready(Ok((!present).then(|| tree(json!({ "email": "Required" })))))
}

fn counting_submit(
    calls: Arc<AtomicUsize>,
) -> impl Fn(Value, &FormController) -> Result<SubmitOutcome, BoxError> + Send + Sync + 'static {
    move |values: Value, _form: &FormController| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(SubmitOutcome::pending(async move { Ok(values) }))
    }
}

struct SchemaAt {
    issues: Vec<(&'static str, &'static str)>,
}

impl SchemaValidator for SchemaAt {
    fn validate(&self, _values: Value) -> SchemaFuture {
        let failure = self
            .issues
            .iter()
            .fold(ValidationFailure::new(), |failure, (path, message)| {
                failure.issue(*path, *message)
            });
        future::ready(Err(SchemaError::Invalid(failure))).boxed()
    }

    fn validate_at(&self, path: &Path, values: Value) -> SchemaFuture {
        let path = path.to_string();
        let failure = self
            .issues
            .iter()
            .filter(|(issue, _)| *issue == path)
            .fold(ValidationFailure::new(), |failure, (path, message)| {
                failure.issue(*path, *message)
            });
        if failure.issues.is_empty() {
            future::ready(Ok(values)).boxed()
        } else {
            future::ready(Err(SchemaError::Invalid(failure))).boxed()
        }
    }
}

#[test]
fn invalid_submit_touches_fields_and_skips_the_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let form = FormController::builder(tree(json!({ "email": "" })))
        .validate(require_email)
        .build(counting_submit(Arc::clone(&calls)));

    let result = block_on(form.submit_form()).expect("submit settles");
    assert_eq!(result, None);

    let state = form.state().expect("state");
    assert_eq!(state.submit_count, 1);
    assert_eq!(state.touched, tree(json!({ "email": true })));
    assert_eq!(state.errors, tree(json!({ "email": "Required" })));
    assert!(!state.is_submitting);
    assert!(!state.is_validating);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

struct RequiredEmail;

impl SchemaValidator for RequiredEmail {
    fn validate(&self, values: Value) -> SchemaFuture {
        let result = if get_in(&values, &Path::parse("email")).is_some() {
            Ok(values)
        } else {
            Err(SchemaError::from(ValidationFailure::single("email", "Required")))
        };
        future::ready(result).boxed()
    }
}

#[test]
fn schema_rejects_an_empty_email_on_submit() {
    let calls = Arc::new(AtomicUsize::new(0));
    let form = FormController::builder(tree(json!({ "email": "" })))
        .validation_schema(RequiredEmail)
        .build(counting_submit(Arc::clone(&calls)));

    let result = block_on(form.submit_form()).expect("submit settles");
    assert_eq!(result, None);

    let state = form.state().expect("state");
    assert_eq!(
        get_in(&state.errors, &Path::parse("email")),
        Some(&Value::from("Required"))
    );
    assert!(!state.is_submitting);
    assert_eq!(state.submit_count, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn valid_submit_awaits_the_handler_and_clears_submitting() {
    let calls = Arc::new(AtomicUsize::new(0));
    let form = FormController::builder(tree(json!({ "email": "a@b.c" })))
        .validate(require_email)
        .build(counting_submit(Arc::clone(&calls)));

    let result = block_on(form.submit_form()).expect("submit settles");
    assert_eq!(result, Some(tree(json!({ "email": "a@b.c" }))));

    let state = form.state().expect("state");
    assert_eq!(state.submit_count, 1);
    assert!(!state.is_submitting);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn settled_submit_leaves_submitting_to_the_handler() {
    let form = FormController::builder(tree(json!({ "email": "a@b.c" }))).build(settled_submit);

    block_on(form.submit_form()).expect("submit settles");
    assert!(form.state().expect("state").is_submitting);

    form.set_submitting(false).expect("set submitting");
    assert!(!form.state().expect("state").is_submitting);
}

#[test]
fn failing_submit_handler_resets_submitting_and_surfaces_the_error() {
    let form = FormController::builder(tree(json!({ "email": "a@b.c" }))).build(|_values, _form| {
        Ok(SubmitOutcome::pending(async { Err("server said no".into()) }))
    });

    let error = block_on(form.submit_form()).expect_err("submit fails");
    assert!(matches!(error, FormError::Submit { .. }));
    assert!(error.to_string().contains("server said no"));
    assert!(!form.state().expect("state").is_submitting);
}

#[test]
fn synchronous_handler_errors_leave_submitting_untouched() {
    let form = FormController::builder(tree(json!({ "email": "a@b.c" })))
        .build(|_values, _form| Err("rejected before starting".into()));

    let error = block_on(form.submit_form()).expect_err("submit fails");
    assert!(matches!(error, FormError::Submit { .. }));
    assert!(form.state().expect("state").is_submitting);
}

#[test]
fn fatal_validation_fails_submit_and_stops_validating() {
    let form = FormController::builder(tree(json!({ "email": "" })))
        .validate(|_values| Deferred::ready(Err("validator crashed".into())))
        .build(settled_submit);

    let error = block_on(form.submit_form()).expect_err("submit rejects");
    assert!(matches!(
        error,
        FormError::Validator {
            kind: ValidatorKind::Function,
            ..
        }
    ));
    let state = form.state().expect("state");
    assert!(!state.is_submitting);
    assert!(!state.is_validating);
    assert_eq!(state.submit_count, 1);
}

#[test]
fn later_sources_win_when_errors_are_merged() {
    let form = FormController::builder(tree(json!({ "a": "", "b": "" })))
        .validation_schema(SchemaAt {
            issues: vec![("a", "S"), ("b", "S2")],
        })
        .validate(|_values| Deferred::ready(Ok(Some(tree(json!({ "a": "I" }))))))
        .build(settled_submit);
    form.register_field(
        "a",
        FieldRegistration::new().validate(|_value| Deferred::ready(Ok(Some("F".to_owned())))),
    )
    .expect("register field");

    let errors = block_on(form.validate_form(None)).expect("validation");
    assert_eq!(errors, tree(json!({ "a": "I", "b": "S2" })));
    assert_eq!(form.state().expect("state").errors, errors);
}

#[test]
fn field_and_schema_errors_in_one_list_are_combined() {
    let form = FormController::builder(tree(json!({
        "friends": [{ "name": "" }, { "name": "" }]
    })))
    .validation_schema(SchemaAt {
        issues: vec![("friends[1].name", "S")],
    })
    .build(settled_submit);
    form.register_field(
        "friends[0].name",
        FieldRegistration::new().validate(|_value| Deferred::ready(Ok(Some("F".to_owned())))),
    )
    .expect("register field");

    let errors = block_on(form.validate_form(None)).expect("validation");
    assert_eq!(
        errors,
        tree(json!({ "friends": [{ "name": "F" }, { "name": "S" }] }))
    );
}

#[test]
fn validating_flag_is_set_before_the_pass_settles() {
    let form = FormController::builder(tree(json!({ "email": "" }))).build(settled_submit);
    form.register_field(
        "email",
        FieldRegistration::new().validate(|_value| Deferred::pending(future::pending())),
    )
    .expect("register field");

    let pass = form.validate_form(None);
    assert!(form.state().expect("state").is_validating);
    drop(pass);
    assert!(form.state().expect("state").is_validating);
}

#[test]
fn a_pass_validates_the_fields_registered_when_it_started() {
    let form = FormController::builder(tree(json!({ "a": "", "b": "" }))).build(settled_submit);
    form.register_field(
        "a",
        FieldRegistration::new().validate(|_value| {
            Deferred::pending(async {
                Delay::new(Duration::from_millis(20)).await;
                Ok(Some("A".to_owned()))
            })
        }),
    )
    .expect("register a");

    let pass = form.validate_form(None);
    form.register_field(
        "b",
        FieldRegistration::new().validate(|_value| Deferred::ready(Ok(Some("B".to_owned())))),
    )
    .expect("register b");

    let errors = block_on(pass).expect("validation");
    assert_eq!(errors, tree(json!({ "a": "A" })));
}

#[test]
fn methods_handle_stays_stable_across_updates() {
    let form = FormController::builder(tree(json!({ "email": "" }))).build(settled_submit);
    let methods = form.methods();
    let notified = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&notified);
    form.subscribe(Projection::Methods, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    })
    .expect("subscribe");

    for index in 0..100 {
        block_on(form.set_field_value("email", format!("user{index}"), Some(false)))
            .expect("set field value");
    }

    assert!(methods.ptr_eq(&form.methods()));
    assert_eq!(notified.load(Ordering::SeqCst), 0);
    assert_eq!(
        form.values().expect("values").values,
        tree(json!({ "email": "user99" }))
    );
}

#[test]
fn batched_writes_notify_values_listeners_once() {
    let form =
        FormController::builder(tree(json!({ "first": "", "last": "" }))).build(settled_submit);
    let notified = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&notified);
    form.subscribe(Projection::Values, move |change| {
        assert!(matches!(change, ProjectionChange::Values(_)));
        seen.fetch_add(1, Ordering::SeqCst);
    })
    .expect("subscribe");

    form.batch(|| {
        drop(form.set_field_value("first", "Ada", Some(false)));
        drop(form.set_field_value("last", "Lovelace", Some(false)));
    })
    .expect("batch");

    assert_eq!(notified.load(Ordering::SeqCst), 1);
}

#[test]
fn touching_a_field_does_not_notify_values_listeners() {
    let form = FormController::builder(tree(json!({ "email": "" }))).build(settled_submit);
    let notified = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&notified);
    form.subscribe(Projection::Values, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    })
    .expect("subscribe");

    block_on(form.set_field_touched("email", true, Some(false))).expect("touch");
    assert_eq!(notified.load(Ordering::SeqCst), 0);
    assert_eq!(
        form.status().expect("status").touched,
        tree(json!({ "email": true }))
    );
}

fn reinitializing_form(values: serde_json::Value) -> FormController {
    FormController::builder(tree(values))
        .options(FormOptions {
            enable_reinitialize: true,
            ..FormOptions::default()
        })
        .build(settled_submit)
}

#[test]
fn reinitialize_resets_a_pristine_form() {
    let form = reinitializing_form(json!({ "name": "a" }));
    block_on(form.reinitialize(FormInitial::new(tree(json!({ "name": "b" })))))
        .expect("reinitialize");

    assert_eq!(form.state().expect("state").values, tree(json!({ "name": "b" })));
    let metadata = form.metadata().expect("metadata");
    assert_eq!(metadata.initial_values, tree(json!({ "name": "b" })));
    assert!(!metadata.dirty);
}

#[test]
fn reinitialize_discards_edits_of_a_dirty_form() {
    let form = reinitializing_form(json!({ "name": "a" }));
    block_on(form.set_field_value("name", "typed", Some(false))).expect("edit");
    assert!(form.metadata().expect("metadata").dirty);

    block_on(form.reinitialize(FormInitial::new(tree(json!({ "name": "c" })))))
        .expect("reinitialize");
    assert_eq!(form.state().expect("state").values, tree(json!({ "name": "c" })));
    assert!(!form.metadata().expect("metadata").dirty);
}

#[test]
fn reinitialize_is_ignored_unless_enabled() {
    let form = FormController::builder(tree(json!({ "name": "a" }))).build(settled_submit);
    block_on(form.reinitialize(FormInitial::new(tree(json!({ "name": "b" })))))
        .expect("reinitialize");
    assert_eq!(form.state().expect("state").values, tree(json!({ "name": "a" })));
}

#[test]
fn reinitialize_applies_new_initial_errors() {
    let form = reinitializing_form(json!({ "name": "a" }));
    block_on(form.reinitialize(
        FormInitial::new(tree(json!({ "name": "a" }))).errors(tree(json!({ "name": "taken" }))),
    ))
    .expect("reinitialize");

    assert_eq!(
        form.state().expect("state").errors,
        tree(json!({ "name": "taken" }))
    );
    assert_eq!(
        form.metadata().expect("metadata").initial_errors,
        tree(json!({ "name": "taken" }))
    );
}

#[test]
fn results_arriving_after_unmount_are_discarded() {
    let form = FormController::builder(tree(json!({ "email": "" })))
        .validate(|_values| {
            Deferred::pending(async {
                Delay::new(Duration::from_millis(10)).await;
                Ok(Some(tree(json!({ "email": "Required" }))))
            })
        })
        .build(settled_submit);

    let pass = form.validate_form(None);
    form.unmount();
    let errors = block_on(pass).expect("pass still resolves");

    assert_eq!(errors, tree(json!({ "email": "Required" })));
    let state = form.state().expect("state");
    assert_eq!(state.errors, Value::map());
    assert!(state.is_validating);
}

#[test]
fn reset_after_unmount_keeps_the_initial_refs() {
    let form = FormController::builder(tree(json!({ "email": "" }))).build(settled_submit);
    let notified = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&notified);
    form.subscribe(Projection::Metadata, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    })
    .expect("subscribe");

    form.unmount();
    block_on(form.reset_form(Some(
        ResetState::default().values(tree(json!({ "email": "x" }))),
    )))
    .expect("reset");

    assert_eq!(notified.load(Ordering::SeqCst), 0);
    let metadata = form.metadata().expect("metadata");
    assert_eq!(metadata.initial_values, tree(json!({ "email": "" })));
    assert!(!metadata.dirty);
    assert_eq!(form.state().expect("state").values, tree(json!({ "email": "" })));
}

#[test]
fn validate_on_mount_runs_against_initial_values() {
    let form = FormController::builder(tree(json!({ "email": "" })))
        .options(FormOptions {
            validate_on_mount: true,
            ..FormOptions::default()
        })
        .validate(require_email)
        .build(settled_submit);

    let errors = block_on(form.mount()).expect("mount validation");
    assert_eq!(errors, Some(tree(json!({ "email": "Required" }))));
    assert!(!form.metadata().expect("metadata").is_valid);
}

#[test]
fn initial_valid_holds_until_the_form_is_edited() {
    let form = FormController::builder(tree(json!({ "email": "" })))
        .options(FormOptions {
            initial_valid: Some(false),
            ..FormOptions::default()
        })
        .build(settled_submit);
    assert!(!form.metadata().expect("metadata").is_valid);

    block_on(form.set_field_value("email", "a@b.c", None)).expect("edit");
    assert!(form.metadata().expect("metadata").is_valid);
}

#[test]
fn validate_field_uses_the_registered_validator() {
    let form = FormController::builder(tree(json!({ "email": "" }))).build(settled_submit);
    form.register_field(
        "email",
        FieldRegistration::new().validate(|value| {
            let present = value.is_some_and(Value::is_truthy);
            Deferred::ready(Ok((!present).then(|| "Required".to_owned())))
        }),
    )
    .expect("register field");

    let error = block_on(form.validate_field("email")).expect("validate field");
    assert_eq!(error, Some(Value::from("Required")));
    let state = form.state().expect("state");
    assert_eq!(state.errors, tree(json!({ "email": "Required" })));
    assert!(!state.is_validating);
}

#[test]
fn validate_field_falls_back_to_the_schema_at_that_path() {
    let form = FormController::builder(tree(json!({ "email": "", "name": "" })))
        .validation_schema(SchemaAt {
            issues: vec![("email", "Invalid email"), ("name", "Required")],
        })
        .build(settled_submit);

    let error = block_on(form.validate_field("email")).expect("validate field");
    assert_eq!(error, Some(Value::from("Invalid email")));
    let state = form.state().expect("state");
    assert_eq!(state.errors, tree(json!({ "email": "Invalid email" })));
    assert!(!state.is_validating);
}

#[test]
fn validate_field_without_any_validator_is_a_no_op() {
    let form = FormController::builder(tree(json!({ "email": "" }))).build(settled_submit);
    assert_eq!(block_on(form.validate_field("email")).expect("validate"), None);
    assert_eq!(form.state().expect("state").errors, Value::map());
}

#[test]
fn change_events_are_parsed_by_input_kind() {
    let form = FormController::builder(tree(json!({
        "age": 0,
        "agree": false,
        "tags": [],
        "colors": [],
        "name": "",
    })))
    .build(settled_submit);

    let events = [
        InputEvent::new(InputKind::Number).name("age").value("42"),
        InputEvent::new(InputKind::Checkbox).name("agree").checked(true),
        InputEvent::new(InputKind::Checkbox)
            .name("tags")
            .value("rust")
            .checked(true),
        InputEvent::new(InputKind::SelectMultiple)
            .name("colors")
            .selected(["red", "blue"]),
        InputEvent::new(InputKind::Text).id("name").value("Ada"),
    ];
    for event in &events {
        block_on(form.handle_change(event)).expect("handle change");
    }

    let values = form.state().expect("state").values.clone();
    assert_eq!(get_in(&values, &Path::parse("age")), Some(&Value::from(42.0)));
    assert_eq!(get_in(&values, &Path::parse("agree")), Some(&Value::Bool(true)));
    assert_eq!(get_in(&values, &Path::parse("tags")), Some(&tree(json!(["rust"]))));
    assert_eq!(
        get_in(&values, &Path::parse("colors")),
        Some(&tree(json!(["red", "blue"])))
    );
    assert_eq!(get_in(&values, &Path::parse("name")), Some(&Value::from("Ada")));

    block_on(form.handle_change(&InputEvent::new(InputKind::Number).name("age").value("abc")))
        .expect("handle change");
    assert_eq!(
        get_in(&form.state().expect("state").values, &Path::parse("age")),
        Some(&Value::from(""))
    );
}

#[test]
fn change_events_without_a_field_are_ignored() {
    let form = FormController::builder(tree(json!({ "name": "" }))).build(settled_submit);
    let before = form.state().expect("state");
    block_on(form.handle_change(&InputEvent::new(InputKind::Text).value("x")))
        .expect("handle change");
    assert!(Arc::ptr_eq(&before, &form.state().expect("state")));
}

#[test]
fn blur_marks_touched_and_validates() {
    let form = FormController::builder(tree(json!({ "email": "" })))
        .validate(require_email)
        .build(settled_submit);

    block_on(form.handle_blur(&InputEvent::new(InputKind::Text).name("email"))).expect("blur");
    let state = form.state().expect("state");
    assert_eq!(state.touched, tree(json!({ "email": true })));
    assert_eq!(state.errors, tree(json!({ "email": "Required" })));
}

#[test]
fn handle_submit_prevents_the_default_action() {
    let calls = Arc::new(AtomicUsize::new(0));
    let form = FormController::builder(tree(json!({ "email": "a@b.c" })))
        .build(counting_submit(Arc::clone(&calls)));
    let mut event = FormEvent::default();

    block_on(form.handle_submit(Some(&mut event)));
    assert!(event.default_prevented);
    assert!(event.propagation_stopped);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn field_props_reflect_the_input_kind() {
    let form = FormController::builder(tree(json!({
        "agree": true,
        "tags": ["rust"],
        "color": "red",
        "name": "Ada",
    })))
    .build(settled_submit);

    let agree = form
        .get_field_props(FieldConfig::new("agree").kind(InputKind::Checkbox))
        .expect("props");
    assert_eq!(agree.checked, Some(true));

    let go = form
        .get_field_props(FieldConfig::new("tags").kind(InputKind::Checkbox).value("go"))
        .expect("props");
    assert_eq!(go.checked, Some(false));
    assert_eq!(go.value, Some(Value::from("go")));

    let red = form
        .get_field_props(FieldConfig::new("color").kind(InputKind::Radio).value("red"))
        .expect("props");
    assert_eq!(red.checked, Some(true));

    let colors = form
        .get_field_props(FieldConfig::new("colors").kind(InputKind::SelectMultiple))
        .expect("props");
    assert_eq!(colors.value, Some(Value::list()));
    assert_eq!(colors.multiple, Some(true));

    let name = form.get_field_props("name").expect("props");
    assert_eq!(name.value, Some(Value::from("Ada")));
    assert_eq!(name.checked, None);
}

#[test]
fn field_meta_and_helpers_address_one_path() {
    let form = FormController::builder(tree(json!({ "friends": [{ "name": "a" }] })))
        .initial_errors(tree(json!({ "friends": [{ "name": "taken" }] })))
        .build(settled_submit);

    let helpers = form.get_field_helpers("friends[0].name");
    block_on(helpers.set_value("b", Some(false))).expect("set value");
    block_on(helpers.set_touched(true, Some(false))).expect("set touched");

    let meta = form.get_field_meta("friends[0].name").expect("meta");
    assert_eq!(meta.value, Some(Value::from("b")));
    assert_eq!(meta.initial_value, Some(Value::from("a")));
    assert!(meta.touched);
    assert!(!meta.initial_touched);
    assert_eq!(meta.error, Some(Value::from("taken")));
    assert_eq!(meta.initial_error, Some(Value::from("taken")));

    helpers.set_error(None).expect("clear error");
    assert_eq!(form.get_field_meta("friends[0].name").expect("meta").error, None);
}

#[test]
fn reset_restores_initial_state_and_calls_on_reset() {
    let seen = Arc::new(Mutex::new(None));
    let captured = Arc::clone(&seen);
    let form = FormController::builder(tree(json!({ "email": "" })))
        .on_reset(move |values, _form| {
            *captured.lock().expect("reset lock") = Some(values);
            Deferred::ready(())
        })
        .build(settled_submit);

    block_on(form.set_field_value("email", "typed", Some(false))).expect("edit");
    form.set_errors(tree(json!({ "email": "bad" }))).expect("errors");
    block_on(form.handle_reset(None)).expect("reset");

    let state = form.state().expect("state");
    assert_eq!(state.values, tree(json!({ "email": "" })));
    assert_eq!(state.errors, Value::map());
    assert_eq!(state.submit_count, 0);
    assert_eq!(
        *seen.lock().expect("reset lock"),
        Some(tree(json!({ "email": "typed" })))
    );
}

#[test]
fn reset_with_next_state_moves_the_initial_refs() {
    let form = FormController::builder(tree(json!({ "email": "" }))).build(settled_submit);
    block_on(form.reset_form(Some(
        ResetState::default()
            .values(tree(json!({ "email": "saved@b.c" })))
            .submit_count(3),
    )))
    .expect("reset");

    let state = form.state().expect("state");
    assert_eq!(state.values, tree(json!({ "email": "saved@b.c" })));
    assert_eq!(state.submit_count, 3);
    let metadata = form.metadata().expect("metadata");
    assert_eq!(metadata.initial_values, tree(json!({ "email": "saved@b.c" })));
    assert!(!metadata.dirty);
}

#[test]
fn deferred_on_reset_delays_the_reset() {
    let form = FormController::builder(tree(json!({ "email": "" })))
        .on_reset(|_values, _form| {
            Deferred::pending(async {
                Delay::new(Duration::from_millis(5)).await;
            })
        })
        .build(settled_submit);
    block_on(form.set_field_value("email", "typed", Some(false))).expect("edit");

    let reset = form.reset_form(None);
    assert_eq!(
        form.state().expect("state").values,
        tree(json!({ "email": "typed" }))
    );
    block_on(reset).expect("reset");
    assert_eq!(form.state().expect("state").values, tree(json!({ "email": "" })));
}

#[test]
fn removing_an_array_item_realigns_errors_and_touched() {
    let form = FormController::builder(tree(json!({
        "friends": [{ "n": 1 }, { "n": 2 }, { "n": 3 }]
    })))
    .initial_errors(tree(json!({
        "friends": [{ "n": "first" }, { "n": "bad" }, { "n": "worse" }]
    })))
    .initial_touched(tree(json!({ "friends": [{ "n": true }, { "n": true }, null] })))
    .build(settled_submit);

    let friends = form.field_array("friends").validate_on_change(false);
    let (removed, pending) = friends.remove(1);
    block_on(pending).expect("no validation");

    assert_eq!(removed, Some(tree(json!({ "n": 2 }))));
    let state = form.state().expect("state");
    assert_eq!(state.values, tree(json!({ "friends": [{ "n": 1 }, { "n": 3 }] })));
    assert_eq!(
        state.errors,
        tree(json!({ "friends": [{ "n": "first" }, { "n": "worse" }] }))
    );
    assert_eq!(state.touched, tree(json!({ "friends": [{ "n": true }, null] })));
}

#[test]
fn array_edits_revalidate_by_default() {
    let form = FormController::builder(tree(json!({ "tags": [] })))
        .validate(|values| {
            let count = get_in(values, &Path::parse("tags"))
                .and_then(Value::as_list)
                .map_or(0, <[Value]>::len);
            Deferred::ready(Ok((count > 1).then(|| tree(json!({ "tags": "Too many" })))))
        })
        .build(settled_submit);
    let tags = form.field_array("tags");

    block_on(tags.push("a")).expect("push");
    assert_eq!(form.state().expect("state").errors, Value::map());
    let (length, pending) = tags.unshift("b");
    assert_eq!(length, 2);
    block_on(pending).expect("unshift");

    let state = form.state().expect("state");
    assert_eq!(state.values, tree(json!({ "tags": ["b", "a"] })));
    assert_eq!(state.errors, tree(json!({ "tags": "Too many" })));

    let (popped, pending) = tags.pop();
    block_on(pending).expect("pop");
    assert_eq!(popped, Some(Value::from("a")));
    assert_eq!(form.state().expect("state").errors, Value::map());
}

#[test]
fn array_reordering_moves_item_errors_with_the_items() {
    let form = FormController::builder(tree(json!({ "tags": ["a", "b", "c"] })))
        .initial_errors(tree(json!({ "tags": ["bad a", null, null] })))
        .build(settled_submit);
    let tags = form.field_array("tags").validate_on_change(false);

    block_on(tags.move_item(0, 2)).expect("move");
    let state = form.state().expect("state");
    assert_eq!(state.values, tree(json!({ "tags": ["b", "c", "a"] })));
    assert_eq!(state.errors, tree(json!({ "tags": [null, null, "bad a"] })));

    block_on(tags.swap(0, 2)).expect("swap");
    assert_eq!(
        form.state().expect("state").errors,
        tree(json!({ "tags": ["bad a", null, null] }))
    );
}

#[allow(dead_code)]
#[derive(serde::Serialize, serde::Deserialize, calmform_derive::FormModel)]
struct SignupForm {
    email: String,
    #[serde(rename = "rememberMe")]
    remember_me: bool,
    #[serde(skip)]
    session: Option<String>,
}

#[test]
fn derived_field_keys_follow_serde_names() {
    let fields = SignupForm::fields();
    assert_eq!(fields.email().as_str(), "email");
    assert_eq!(fields.remember_me().as_str(), "rememberMe");
    assert_eq!(SignupForm::field_names(), &["email", "rememberMe"]);

    let model = SignupForm {
        email: String::new(),
        remember_me: false,
        session: None,
    };
    let form = FormController::builder(model.to_values().expect("to values")).build(settled_submit);
    block_on(form.set_field_value(fields.remember_me(), true, Some(false))).expect("set");

    let saved = SignupForm::from_values(&form.state().expect("state").values).expect("model");
    assert!(saved.remember_me);
}
