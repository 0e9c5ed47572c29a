use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::controller::{FormResult, read_lock, write_lock};
use super::state::{FormAction, FormState, reduce};
use crate::value::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Projection {
    Values,
    Status,
    Metadata,
    Methods,
}

impl Projection {
    const NOTIFIED: [Projection; 3] = [Projection::Values, Projection::Status, Projection::Metadata];
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValuesSlice {
    pub values: Value,
}

impl ValuesSlice {
    fn same_key(&self, other: &Self) -> bool {
        self.values.same(&other.values)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatusSlice {
    pub errors: Value,
    pub touched: Value,
    pub is_submitting: bool,
    pub is_validating: bool,
    pub status: Option<Value>,
    pub submit_count: u32,
}

impl StatusSlice {
    fn same_key(&self, other: &Self) -> bool {
        self.errors.same(&other.errors)
            && self.touched.same(&other.touched)
            && self.is_submitting == other.is_submitting
            && self.is_validating == other.is_validating
            && same_status(&self.status, &other.status)
            && self.submit_count == other.submit_count
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MetadataSlice {
    pub dirty: bool,
    pub is_valid: bool,
    pub initial_values: Value,
    pub initial_errors: Value,
    pub initial_touched: Value,
    pub initial_status: Option<Value>,
}

impl MetadataSlice {
    fn same_key(&self, other: &Self) -> bool {
        self.dirty == other.dirty
            && self.is_valid == other.is_valid
            && self.initial_values.same(&other.initial_values)
            && self.initial_errors.same(&other.initial_errors)
            && self.initial_touched.same(&other.initial_touched)
            && same_status(&self.initial_status, &other.initial_status)
    }
}

fn same_status(left: &Option<Value>, right: &Option<Value>) -> bool {
    match (left, right) {
        (Some(left), Some(right)) => left.same(right),
        (None, None) => true,
        _ => false,
    }
}

/// What the form was initialised (or last reset) with.
#[derive(Clone, Debug, PartialEq)]
pub struct InitialState {
    pub values: Value,
    pub errors: Value,
    pub touched: Value,
    pub status: Option<Value>,
}

impl InitialState {
    pub fn new(values: Value) -> Self {
        Self {
            values,
            errors: Value::map(),
            touched: Value::map(),
            status: None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum ProjectionChange {
    Values(Arc<ValuesSlice>),
    Status(Arc<StatusSlice>),
    Metadata(Arc<MetadataSlice>),
}

impl ProjectionChange {
    pub fn projection(&self) -> Projection {
        match self {
            ProjectionChange::Values(_) => Projection::Values,
            ProjectionChange::Status(_) => Projection::Status,
            ProjectionChange::Metadata(_) => Projection::Metadata,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SubscriptionId(pub u64);

type Listener = Arc<dyn Fn(&ProjectionChange) + Send + Sync>;

#[derive(Clone)]
struct Slices {
    values: Arc<ValuesSlice>,
    status: Arc<StatusSlice>,
    metadata: Arc<MetadataSlice>,
}

impl Slices {
    fn changes_since(&self, earlier: &Slices) -> Vec<ProjectionChange> {
        let mut changes = Vec::new();
        if !self.values.same_key(&earlier.values) {
            changes.push(ProjectionChange::Values(Arc::clone(&self.values)));
        }
        if !self.status.same_key(&earlier.status) {
            changes.push(ProjectionChange::Status(Arc::clone(&self.status)));
        }
        if !self.metadata.same_key(&earlier.metadata) {
            changes.push(ProjectionChange::Metadata(Arc::clone(&self.metadata)));
        }
        changes
    }
}

struct StoreState {
    state: Arc<FormState>,
    initial: InitialState,
    slices: Slices,
    batch_depth: usize,
    batch_start: Option<Slices>,
}

impl StoreState {
    /// Rebuilds the projections whose memo key moved and returns what changed.
    fn refresh(&mut self, initial_valid: Option<bool>) -> Vec<ProjectionChange> {
        let previous = self.slices.clone();

        let values = ValuesSlice {
            values: self.state.values.clone(),
        };
        if !values.same_key(&self.slices.values) {
            self.slices.values = Arc::new(values);
        }

        let status = status_slice(&self.state);
        if !status.same_key(&self.slices.status) {
            self.slices.status = Arc::new(status);
        }

        let metadata = metadata_slice(&self.state, &self.initial, initial_valid);
        if !metadata.same_key(&self.slices.metadata) {
            self.slices.metadata = Arc::new(metadata);
        }

        if self.batch_depth > 0 {
            return Vec::new();
        }
        self.slices.changes_since(&previous)
    }
}

fn status_slice(state: &FormState) -> StatusSlice {
    StatusSlice {
        errors: state.errors.clone(),
        touched: state.touched.clone(),
        is_submitting: state.is_submitting,
        is_validating: state.is_validating,
        status: state.status.clone(),
        submit_count: state.submit_count,
    }
}

fn metadata_slice(
    state: &FormState,
    initial: &InitialState,
    initial_valid: Option<bool>,
) -> MetadataSlice {
    let dirty = !state.values.same(&initial.values) && state.values != initial.values;
    let no_errors = state.errors.has_no_keys();
    let is_valid = match initial_valid {
        Some(flag) if !dirty => flag,
        _ => no_errors,
    };
    MetadataSlice {
        dirty,
        is_valid,
        initial_values: initial.values.clone(),
        initial_errors: initial.errors.clone(),
        initial_touched: initial.touched.clone(),
        initial_status: initial.status.clone(),
    }
}

/// Holds the current [`FormState`] and tells subscribers when one of the
/// projections they watch changes.
///
/// Listeners always run after the store lock is released, so they may read
/// the store or dispatch again.
pub struct FormStore {
    state: RwLock<StoreState>,
    listeners: RwLock<BTreeMap<Projection, Vec<(SubscriptionId, Listener)>>>,
    next_subscription: AtomicU64,
    initial_valid: Option<bool>,
}

impl FormStore {
    pub fn new(state: FormState, initial: InitialState, initial_valid: Option<bool>) -> Self {
        let slices = Slices {
            values: Arc::new(ValuesSlice {
                values: state.values.clone(),
            }),
            status: Arc::new(status_slice(&state)),
            metadata: Arc::new(metadata_slice(&state, &initial, initial_valid)),
        };
        Self {
            state: RwLock::new(StoreState {
                state: Arc::new(state),
                initial,
                slices,
                batch_depth: 0,
                batch_start: None,
            }),
            listeners: RwLock::new(BTreeMap::new()),
            next_subscription: AtomicU64::new(1),
            initial_valid,
        }
    }

    pub fn state(&self) -> FormResult<Arc<FormState>> {
        Ok(Arc::clone(&read_lock(&self.state, "reading form state")?.state))
    }

    pub fn initial(&self) -> FormResult<InitialState> {
        Ok(read_lock(&self.state, "reading initial state")?.initial.clone())
    }

    pub fn values(&self) -> FormResult<Arc<ValuesSlice>> {
        Ok(Arc::clone(
            &read_lock(&self.state, "reading values projection")?.slices.values,
        ))
    }

    pub fn status(&self) -> FormResult<Arc<StatusSlice>> {
        Ok(Arc::clone(
            &read_lock(&self.state, "reading status projection")?.slices.status,
        ))
    }

    pub fn metadata(&self) -> FormResult<Arc<MetadataSlice>> {
        Ok(Arc::clone(
            &read_lock(&self.state, "reading metadata projection")?
                .slices
                .metadata,
        ))
    }

    /// Runs `action` through the reducer. Returns whether the state changed.
    pub fn dispatch(&self, action: FormAction) -> FormResult<bool> {
        let name = action.name();
        let changes = {
            let mut inner = write_lock(&self.state, "dispatching form action")?;
            let next = reduce(&inner.state, action);
            if Arc::ptr_eq(&next, &inner.state) {
                tracing::trace!(action = name, "form action left state untouched");
                return Ok(false);
            }
            inner.state = next;
            inner.refresh(self.initial_valid)
        };
        tracing::trace!(action = name, changed = changes.len(), "form action applied");
        self.notify(&changes)?;
        Ok(true)
    }

    /// Replaces the initial-state refs and refreshes the metadata projection.
    pub fn set_initial(&self, update: impl FnOnce(&mut InitialState)) -> FormResult<()> {
        let changes = {
            let mut inner = write_lock(&self.state, "updating initial state")?;
            update(&mut inner.initial);
            inner.refresh(self.initial_valid)
        };
        self.notify(&changes)
    }

    /// Runs `f` with notifications held back; each projection that ended up
    /// changed is reported once when the outermost batch closes.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> FormResult<R> {
        {
            let mut inner = write_lock(&self.state, "opening batch")?;
            if inner.batch_depth == 0 {
                inner.batch_start = Some(inner.slices.clone());
            }
            inner.batch_depth += 1;
        }

        let result = f();

        let changes = {
            let mut inner = write_lock(&self.state, "closing batch")?;
            inner.batch_depth = inner.batch_depth.saturating_sub(1);
            match (inner.batch_depth, inner.batch_start.take()) {
                (0, Some(start)) => inner.slices.changes_since(&start),
                (_, start) => {
                    inner.batch_start = start;
                    Vec::new()
                }
            }
        };
        self.notify(&changes)?;
        Ok(result)
    }

    pub fn subscribe(
        &self,
        projection: Projection,
        listener: impl Fn(&ProjectionChange) + Send + Sync + 'static,
    ) -> FormResult<SubscriptionId> {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        write_lock(&self.listeners, "subscribing to form store")?
            .entry(projection)
            .or_default()
            .push((id, Arc::new(listener)));
        Ok(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> FormResult<bool> {
        let mut listeners = write_lock(&self.listeners, "unsubscribing from form store")?;
        let mut removed = false;
        for entries in listeners.values_mut() {
            let before = entries.len();
            entries.retain(|(entry, _)| *entry != id);
            removed |= entries.len() != before;
        }
        Ok(removed)
    }

    pub fn listener_count(&self, projection: Projection) -> FormResult<usize> {
        Ok(read_lock(&self.listeners, "counting listeners")?
            .get(&projection)
            .map_or(0, Vec::len))
    }

    fn notify(&self, changes: &[ProjectionChange]) -> FormResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        for change in changes {
            let projection = change.projection();
            debug_assert!(Projection::NOTIFIED.contains(&projection));
            let targets: Vec<Listener> = read_lock(&self.listeners, "notifying listeners")?
                .get(&projection)
                .map(|entries| entries.iter().map(|(_, listener)| Arc::clone(listener)).collect())
                .unwrap_or_default();
            tracing::trace!(?projection, listeners = targets.len(), "notifying projection");
            for listener in targets {
                listener(change);
            }
        }
        Ok(())
    }
}
