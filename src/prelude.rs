pub use crate::form::{
    Deferred, FieldArray, FieldKey, FieldRegistration, FormBuilder, FormController, FormError,
    FormInitial, FormModel, FormOptions, FormResult, FormState, FormValidator, InputEvent,
    InputKind, PendingValidation, Projection, ProjectionChange, ResetState, SchemaError,
    SchemaFuture, SchemaValidator, SubmitOutcome, ValidationFailure,
};
pub use crate::path::{Path, get_in, set_in};
pub use crate::value::Value;
