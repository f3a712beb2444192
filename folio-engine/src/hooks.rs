//! Ordered hook stages.
//!
//! Each stage is a list of hooks run strictly in registration order. The
//! working value is folded through them: a hook that returns a value
//! replaces it for every later hook and stage, a hook that returns nothing
//! leaves it alone.

use crate::context::RequestContext;
use crate::error::EngineResult;
use crate::update::UpdateArgs;
use async_trait::async_trait;
use folio_model::CollectionSchema;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Named points in the update pipeline where hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageName {
    BeforeOperation,
    BeforeValidate,
    BeforeChange,
    AfterRead,
    AfterChange,
    AfterOperation,
}

impl StageName {
    pub const ORDER: [StageName; 6] = [
        Self::BeforeOperation,
        Self::BeforeValidate,
        Self::BeforeChange,
        Self::AfterRead,
        Self::AfterChange,
        Self::AfterOperation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeOperation => "beforeOperation",
            Self::BeforeValidate => "beforeValidate",
            Self::BeforeChange => "beforeChange",
            Self::AfterRead => "afterRead",
            Self::AfterChange => "afterChange",
            Self::AfterOperation => "afterOperation",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only context handed to every hook.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub stage: StageName,
    pub schema: &'a CollectionSchema,
    pub request: &'a RequestContext,
    /// The document as it was before this update, once it has been read.
    pub original: Option<&'a Value>,
}

impl HookContext<'_> {
    /// The only operation this engine runs.
    pub fn operation(&self) -> &'static str {
        "update"
    }

    /// The same context for another stage.
    #[must_use]
    pub fn at(self, stage: StageName) -> Self {
        Self { stage, ..self }
    }
}

/// A value that can be threaded through a stage.
pub trait StageValue: Send + Sync + 'static {
    /// A returned value for which this is true keeps the current one.
    fn is_absent(&self) -> bool {
        false
    }
}

impl StageValue for Value {
    fn is_absent(&self) -> bool {
        self.is_null()
    }
}

/// A stage callback.
#[async_trait]
pub trait Hook<T: StageValue>: Send + Sync {
    /// Returns the replacement working value, or `None` to keep it.
    async fn call(&self, value: &T, ctx: &HookContext<'_>) -> EngineResult<Option<T>>;
}

struct FnHook<F>(F);

#[async_trait]
impl<T, F> Hook<T> for FnHook<F>
where
    T: StageValue,
    F: Fn(&T, &HookContext<'_>) -> EngineResult<Option<T>> + Send + Sync,
{
    async fn call(&self, value: &T, ctx: &HookContext<'_>) -> EngineResult<Option<T>> {
        (self.0)(value, ctx)
    }
}

/// Wraps a synchronous closure as a hook.
pub fn hook_fn<T, F>(f: F) -> Arc<dyn Hook<T>>
where
    T: StageValue,
    F: Fn(&T, &HookContext<'_>) -> EngineResult<Option<T>> + Send + Sync + 'static,
{
    Arc::new(FnHook(f))
}

/// Hooks registered on a collection, one list per stage.
#[derive(Clone, Default)]
pub struct CollectionHooks {
    pub before_operation: Vec<Arc<dyn Hook<UpdateArgs>>>,
    pub before_validate: Vec<Arc<dyn Hook<Value>>>,
    pub before_change: Vec<Arc<dyn Hook<Value>>>,
    pub after_read: Vec<Arc<dyn Hook<Value>>>,
    pub after_change: Vec<Arc<dyn Hook<Value>>>,
    pub after_operation: Vec<Arc<dyn Hook<Value>>>,
}

impl CollectionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn before_operation(mut self, hook: Arc<dyn Hook<UpdateArgs>>) -> Self {
        self.before_operation.push(hook);
        self
    }

    /// Appends a hook to one of the document stages.
    ///
    /// `BeforeOperation` works on the update arguments, not the document;
    /// use [`CollectionHooks::before_operation`] for it.
    #[must_use]
    pub fn on(mut self, stage: StageName, hook: Arc<dyn Hook<Value>>) -> Self {
        match stage {
            StageName::BeforeOperation => {
                warn!("document hook registered for beforeOperation; ignored");
            }
            StageName::BeforeValidate => self.before_validate.push(hook),
            StageName::BeforeChange => self.before_change.push(hook),
            StageName::AfterRead => self.after_read.push(hook),
            StageName::AfterChange => self.after_change.push(hook),
            StageName::AfterOperation => self.after_operation.push(hook),
        }
        self
    }

    /// The document hooks for `stage`. Empty for `BeforeOperation`.
    pub fn stage(&self, stage: StageName) -> &[Arc<dyn Hook<Value>>] {
        match stage {
            StageName::BeforeOperation => &[],
            StageName::BeforeValidate => &self.before_validate,
            StageName::BeforeChange => &self.before_change,
            StageName::AfterRead => &self.after_read,
            StageName::AfterChange => &self.after_change,
            StageName::AfterOperation => &self.after_operation,
        }
    }
}

impl fmt::Debug for CollectionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionHooks")
            .field("before_operation", &self.before_operation.len())
            .field("before_validate", &self.before_validate.len())
            .field("before_change", &self.before_change.len())
            .field("after_read", &self.after_read.len())
            .field("after_change", &self.after_change.len())
            .field("after_operation", &self.after_operation.len())
            .finish()
    }
}

/// Folds `value` through `hooks` in order. The first error aborts the stage.
pub async fn run_stage<T: StageValue>(
    hooks: &[Arc<dyn Hook<T>>],
    mut value: T,
    ctx: &HookContext<'_>,
) -> EngineResult<T> {
    for (index, hook) in hooks.iter().enumerate() {
        match hook.call(&value, ctx).await {
            Ok(Some(next)) if !next.is_absent() => value = next,
            Ok(_) => {}
            Err(e) => {
                warn!(stage = %ctx.stage, index, error = %e, "hook rejected the operation");
                return Err(e);
            }
        }
    }
    if !hooks.is_empty() {
        debug!(stage = %ctx.stage, hooks = hooks.len(), "stage complete");
    }
    Ok(value)
}

/// Linear progress of one update, for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdatePhase {
    NotStarted,
    BeforeOperation,
    AccessChecked,
    Locked,
    BeforeValidate,
    FilesMaterialized,
    BeforeChange,
    Persisted,
    AfterRead,
    AfterChange,
    Completed,
    Failed,
}

impl UpdatePhase {
    /// The phase that follows on success. `None` for terminal phases.
    pub fn next(self) -> Option<Self> {
        use UpdatePhase::*;
        Some(match self {
            NotStarted => BeforeOperation,
            BeforeOperation => AccessChecked,
            AccessChecked => Locked,
            Locked => BeforeValidate,
            BeforeValidate => FilesMaterialized,
            FilesMaterialized => BeforeChange,
            BeforeChange => Persisted,
            Persisted => AfterRead,
            AfterRead => AfterChange,
            AfterChange => Completed,
            Completed | Failed => return None,
        })
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// `Failed` is reachable from every non-terminal phase; otherwise only
    /// the next phase is.
    pub fn can_advance_to(self, to: Self) -> bool {
        if to == Self::Failed {
            return !self.is_terminal();
        }
        self.next() == Some(to)
    }
}

/// Tracks the phase of a running update.
#[derive(Debug)]
pub(crate) struct PhaseTracker<'a> {
    phase: UpdatePhase,
    collection: &'a str,
}

impl<'a> PhaseTracker<'a> {
    pub(crate) fn new(collection: &'a str) -> Self {
        Self {
            phase: UpdatePhase::NotStarted,
            collection,
        }
    }

    pub(crate) fn phase(&self) -> UpdatePhase {
        self.phase
    }

    pub(crate) fn advance(&mut self, to: UpdatePhase) {
        debug_assert!(
            self.phase.can_advance_to(to),
            "invalid phase transition {:?} -> {:?}",
            self.phase,
            to
        );
        debug!(collection = self.collection, from = ?self.phase, to = ?to, "update phase");
        self.phase = to;
    }
}
