use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::controller::{FormResult, read_lock, write_lock};
use super::validation::{FieldValidation, FieldValidator};
use crate::path::Path;
use crate::value::Value;

pub type RegisteredValidator = (Path, Arc<dyn FieldValidator>);

#[derive(Clone, Default)]
pub struct FieldRegistration {
    pub validate: Option<Arc<dyn FieldValidator>>,
}

impl FieldRegistration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(Option<&Value>) -> FieldValidation + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    pub fn validator(mut self, validator: Arc<dyn FieldValidator>) -> Self {
        self.validate = Some(validator);
        self
    }
}

/// Mounted fields keyed by path. Registering a name twice replaces the
/// earlier entry.
#[derive(Clone, Default)]
pub struct FieldRegistry {
    fields: Arc<RwLock<BTreeMap<Path, FieldRegistration>>>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<Path>, registration: FieldRegistration) -> FormResult<()> {
        let name = name.into();
        tracing::trace!(field = %name, "registering field");
        write_lock(&self.fields, "registering field")?.insert(name, registration);
        Ok(())
    }

    pub fn unregister(&self, name: impl Into<Path>) -> FormResult<bool> {
        let name = name.into();
        Ok(write_lock(&self.fields, "unregistering field")?
            .remove(&name)
            .is_some())
    }

    pub fn contains(&self, name: &Path) -> FormResult<bool> {
        Ok(read_lock(&self.fields, "reading field registry")?.contains_key(name))
    }

    pub fn len(&self) -> FormResult<usize> {
        Ok(read_lock(&self.fields, "reading field registry")?.len())
    }

    pub fn is_empty(&self) -> FormResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn validator(&self, name: &Path) -> FormResult<Option<Arc<dyn FieldValidator>>> {
        Ok(read_lock(&self.fields, "reading field validator")?
            .get(name)
            .and_then(|registration| registration.validate.clone()))
    }

    /// The fields carrying a validator right now. A validation pass works on
    /// this copy, so later registrations do not leak into a running pass.
    pub fn snapshot(&self) -> FormResult<Vec<RegisteredValidator>> {
        Ok(read_lock(&self.fields, "snapshotting field registry")?
            .iter()
            .filter_map(|(name, registration)| {
                registration
                    .validate
                    .clone()
                    .map(|validator| (name.clone(), validator))
            })
            .collect())
    }
}
