mod array;
mod binding;
mod controller;
mod model;
mod registry;
mod state;
mod store;
mod validation;

#[cfg(test)]
mod tests;

pub use array::{FieldArray, copy_array_like, insert, move_item, replace, swap};
pub use binding::{
    FieldConfig, FieldHelpers, FieldInputProps, FieldMeta, FormEvent, InputEvent, InputKind,
};
pub use calmform_derive::FormModel;
pub use controller::{
    FormBuilder, FormController, FormError, FormId, FormInitial, FormOptions, FormResult,
    PendingValidation, ResetHandler, ResetState, SubmitHandler, SubmitOutcome,
};
pub use model::{FieldKey, FormModel};
pub use registry::{FieldRegistration, FieldRegistry, RegisteredValidator};
pub use state::{FormAction, FormState, StateUpdater, reduce};
pub use store::{
    FormStore, InitialState, MetadataSlice, Projection, ProjectionChange, StatusSlice,
    SubscriptionId, ValuesSlice,
};
pub use validation::{
    BoxError, Deferred, FieldValidation, FieldValidator, FormValidateFn, FormValidator,
    FunctionValidation, SchemaError, SchemaFuture, SchemaValidator, ValidationFailure,
    ValidationIssue, ValidatorKind, run_all_validations,
};
