use futures::FutureExt;
use futures::future;

use super::controller::{FormController, FormResult, PendingValidation};
use super::state::{FormAction, FormState};
use crate::path::{Path, as_index, get_in, set_in};
use crate::value::Value;

/// Dense copy of a list, or of a map with numeric keys; anything else is empty.
pub fn copy_array_like(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::List(items)) => items.to_vec(),
        Some(Value::Map(entries)) => {
            let Some(len) = entries
                .keys()
                .filter_map(|key| as_index(key))
                .max()
                .map(|max| max + 1)
            else {
                return Vec::new();
            };
            (0..len)
                .map(|index| entries.get(&index.to_string()).cloned().unwrap_or_default())
                .collect()
        }
        _ => Vec::new(),
    }
}

pub fn move_item(array: &[Value], from: usize, to: usize) -> Vec<Value> {
    let mut copy = array.to_vec();
    let item = if from < copy.len() {
        copy.remove(from)
    } else {
        Value::Null
    };
    copy.insert(to.min(copy.len()), item);
    copy
}

pub fn swap(array: &[Value], index_a: usize, index_b: usize) -> Vec<Value> {
    let mut copy = array.to_vec();
    let needed = index_a.max(index_b) + 1;
    if copy.len() < needed {
        copy.resize(needed, Value::Null);
    }
    copy.swap(index_a, index_b);
    copy
}

pub fn insert(array: &[Value], index: usize, value: Value) -> Vec<Value> {
    let mut copy = array.to_vec();
    copy.insert(index.min(copy.len()), value);
    copy
}

pub fn replace(array: &[Value], index: usize, value: Value) -> Vec<Value> {
    let mut copy = array.to_vec();
    if copy.len() <= index {
        copy.resize(index + 1, Value::Null);
    }
    copy[index] = value;
    copy
}

#[derive(Clone, Debug)]
enum ArrayOp {
    Push(Value),
    Swap(usize, usize),
    Move(usize, usize),
    Insert(usize, Value),
    Replace(usize, Value),
    Unshift(Value),
    Remove(usize),
    Pop,
}

impl ArrayOp {
    fn apply(&self, array: &[Value]) -> Vec<Value> {
        match self {
            ArrayOp::Push(value) => {
                let mut copy = array.to_vec();
                copy.push(value.clone());
                copy
            }
            ArrayOp::Swap(a, b) => swap(array, *a, *b),
            ArrayOp::Move(from, to) => move_item(array, *from, *to),
            ArrayOp::Insert(index, value) => insert(array, *index, value.clone()),
            ArrayOp::Replace(index, value) => replace(array, *index, value.clone()),
            ArrayOp::Unshift(value) => insert(array, 0, value.clone()),
            ArrayOp::Remove(index) => {
                let mut copy = array.to_vec();
                if *index < copy.len() {
                    copy.remove(*index);
                }
                copy
            }
            ArrayOp::Pop => {
                let mut copy = array.to_vec();
                copy.pop();
                copy
            }
        }
    }

    /// The same edit on the errors/touched arrays. `None` leaves them alone.
    fn apply_meta(&self, array: &[Value]) -> Option<Vec<Value>> {
        match self {
            ArrayOp::Push(_) | ArrayOp::Replace(..) => None,
            ArrayOp::Insert(index, _) => Some(insert(array, *index, Value::Null)),
            ArrayOp::Unshift(_) => Some(insert(array, 0, Value::Null)),
            ArrayOp::Remove(_) => {
                let copy = self.apply(array);
                Some(if copy.iter().all(Value::is_null) {
                    Vec::new()
                } else {
                    copy
                })
            }
            ArrayOp::Swap(..) | ArrayOp::Move(..) | ArrayOp::Pop => Some(self.apply(array)),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ArrayOp::Push(_) => "push",
            ArrayOp::Swap(..) => "swap",
            ArrayOp::Move(..) => "move",
            ArrayOp::Insert(..) => "insert",
            ArrayOp::Replace(..) => "replace",
            ArrayOp::Unshift(_) => "unshift",
            ArrayOp::Remove(_) => "remove",
            ArrayOp::Pop => "pop",
        }
    }
}

/// Applies `op` to the errors or touched tree at `name`. Other scalars pass
/// through, a missing entry only grows a placeholder on insert and unshift,
/// and an array left empty is removed.
fn alter_meta(tree: &Value, name: &Path, op: &ArrayOp) -> Value {
    let current = get_in(tree, name);
    match current {
        Some(current) if current.is_container() => {}
        None | Some(Value::Null) if matches!(op, ArrayOp::Insert(..) | ArrayOp::Unshift(_)) => {}
        _ => return tree.clone(),
    }
    match op.apply_meta(&copy_array_like(current)) {
        None => tree.clone(),
        Some(next) if next.is_empty() => set_in(tree, name, None),
        Some(next) => set_in(tree, name, Some(Value::from(next))),
    }
}

fn apply_to_state(state: &FormState, name: &Path, op: &ArrayOp) -> FormState {
    let values = op.apply(&copy_array_like(get_in(&state.values, name)));
    FormState {
        values: set_in(&state.values, name, Some(Value::from(values))),
        errors: alter_meta(&state.errors, name, op),
        touched: alter_meta(&state.touched, name, op),
        ..state.clone()
    }
}

/// List operations on the array field at `name` that keep errors and
/// touched flags aligned with the items they belong to.
#[derive(Clone, Debug)]
pub struct FieldArray {
    form: FormController,
    name: Path,
    validate_on_change: bool,
}

impl FormController {
    pub fn field_array(&self, name: impl Into<Path>) -> FieldArray {
        FieldArray {
            form: self.clone(),
            name: name.into(),
            validate_on_change: true,
        }
    }
}

impl FieldArray {
    pub fn validate_on_change(mut self, validate_on_change: bool) -> Self {
        self.validate_on_change = validate_on_change;
        self
    }

    pub fn name(&self) -> &Path {
        &self.name
    }

    /// Path of the item at `index`, for binding its sub-fields.
    pub fn item(&self, index: usize) -> Path {
        self.name.clone().index(index)
    }

    pub fn items(&self) -> FormResult<Vec<Value>> {
        let state = self.form.state()?;
        Ok(copy_array_like(get_in(&state.values, &self.name)))
    }

    fn update(&self, op: ArrayOp) -> PendingValidation {
        let before = match self.form.state() {
            Ok(state) => get_in(&state.values, &self.name).cloned(),
            Err(error) => return future::ready(Err(error)).boxed(),
        };
        tracing::trace!(field = %self.name, op = op.name(), "updating field array");

        let name = self.name.clone();
        let updater = move |state: &FormState| apply_to_state(state, &name, &op);
        if let Err(error) = self
            .form
            .dispatch(FormAction::set_form_state(updater))
        {
            return future::ready(Err(error)).boxed();
        }

        let after = match self.form.state() {
            Ok(state) => get_in(&state.values, &self.name).cloned(),
            Err(error) => return future::ready(Err(error)).boxed(),
        };
        if self.validate_on_change && before != after {
            self.form
                .validate_form(None)
                .map(|result| result.map(Some))
                .boxed()
        } else {
            future::ready(Ok(None)).boxed()
        }
    }

    fn item_at(&self, index: Option<usize>) -> Option<Value> {
        let items = self.items().ok()?;
        match index {
            Some(index) => items.get(index).cloned(),
            None => items.last().cloned(),
        }
    }

    pub fn push(&self, value: impl Into<Value>) -> PendingValidation {
        self.update(ArrayOp::Push(value.into()))
    }

    pub fn swap(&self, index_a: usize, index_b: usize) -> PendingValidation {
        self.update(ArrayOp::Swap(index_a, index_b))
    }

    pub fn move_item(&self, from: usize, to: usize) -> PendingValidation {
        self.update(ArrayOp::Move(from, to))
    }

    pub fn insert(&self, index: usize, value: impl Into<Value>) -> PendingValidation {
        self.update(ArrayOp::Insert(index, value.into()))
    }

    pub fn replace(&self, index: usize, value: impl Into<Value>) -> PendingValidation {
        self.update(ArrayOp::Replace(index, value.into()))
    }

    /// Returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> (usize, PendingValidation) {
        let pending = self.update(ArrayOp::Unshift(value.into()));
        (self.items().map_or(0, |items| items.len()), pending)
    }

    /// Returns the removed item.
    pub fn remove(&self, index: usize) -> (Option<Value>, PendingValidation) {
        let removed = self.item_at(Some(index));
        (removed, self.update(ArrayOp::Remove(index)))
    }

    pub fn pop(&self) -> (Option<Value>, PendingValidation) {
        let removed = self.item_at(None);
        (removed, self.update(ArrayOp::Pop))
    }

    pub fn shift(&self) -> (Option<Value>, PendingValidation) {
        self.remove(0)
    }
}
