//! Change notifications for parameter sets
//!
//! A [`Parameters`](super::Parameters) set is the single source of truth for
//! parameter state. Editors subscribe to change events and publish their
//! intents back through the set's setters; observers only ever see an
//! immutable event, so a notification can never re-enter the set.

use std::fmt;
use std::sync::Arc;

/// Field of a parameter touched by a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamField {
    Value,
    Min,
    Max,
    Vary,
    Expr,
    Stderr,
}

/// Old or new content of a changed field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Bool(bool),
    Text(Option<String>),
    Optional(Option<f64>),
}

/// What caused a change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    /// A call to one of the set's setters
    Setter,
    /// Re-evaluation of expression-backed parameters
    Expression,
    /// `Parameters::reset`
    Reset,
    /// Best-fit values written back by the fitting driver
    Fit,
}

/// A single committed change to one field of one parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterChange {
    pub name: String,
    pub field: ParamField,
    pub old: FieldValue,
    pub new: FieldValue,
    pub source: ChangeSource,
}

/// Receiver of parameter change events
///
/// Implemented for every `Fn(&ParameterChange) + Send + Sync` closure.
pub trait ParameterObserver: Send + Sync {
    fn on_change(&self, change: &ParameterChange);
}

impl<F> ParameterObserver for F
where
    F: Fn(&ParameterChange) + Send + Sync,
{
    fn on_change(&self, change: &ParameterChange) {
        self(change)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Ordered observer list
#[derive(Default)]
pub(crate) struct Observers {
    next_id: u64,
    entries: Vec<(ObserverId, Arc<dyn ParameterObserver>)>,
}

impl Observers {
    pub(crate) fn subscribe(&mut self, observer: Arc<dyn ParameterObserver>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Deliver events to every observer, in subscription order
    pub(crate) fn notify(&self, changes: &[ParameterChange]) {
        for change in changes {
            for (_, observer) in &self.entries {
                observer.on_change(change);
            }
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.entries.len())
            .finish()
    }
}
