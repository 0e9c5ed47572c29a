//! Headless form state: nested values, errors and touched flags, a reducer
//! that owns every transition, and concurrent field/schema/function
//! validation merged into one error tree.

pub mod form;
pub mod nested;
pub mod path;
pub mod prelude;
pub mod value;

pub use form::{FormBuilder, FormController, FormError, FormOptions, FormResult};
pub use path::Path;
pub use value::{Value, ValueMap};
