//! Step functions
//!
//! A step function advances a simulation by one moment. Crunchers apply it
//! repeatedly, off the shared tree, to grow new branches of history.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::value::{State, Value};

/// Context available to step functions
pub struct StepContext<'a> {
    /// The state to advance
    pub state: &'a State,
    /// Positional arguments bound by the step profile
    pub args: &'a [Value],
    /// Keyword arguments bound by the step profile
    pub kwargs: &'a IndexMap<String, Value>,
}

/// Result of applying a step function to a state
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The next world-moment
    Next(State),
    /// The simulation reached a terminal moment; there is no next state
    End,
}

struct Inner {
    name: String,
    run: Box<dyn Fn(&StepContext<'_>) -> StepOutcome + Send + Sync>,
}

/// A named, shareable step function.
///
/// Equality is identity: two handles compare equal iff they share the same
/// underlying function object. Cloning shares identity, so the profile a
/// state was crunched with can be recognized later.
#[derive(Clone)]
pub struct StepFunction {
    inner: Arc<Inner>,
}

impl StepFunction {
    pub fn new(
        name: impl Into<String>,
        run: impl Fn(&StepContext<'_>) -> StepOutcome + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                run: Box::new(run),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn call(&self, ctx: &StepContext<'_>) -> StepOutcome {
        (self.inner.run)(ctx)
    }
}

impl PartialEq for StepFunction {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for StepFunction {}

impl fmt::Debug for StepFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StepFunction").field(&self.inner.name).finish()
    }
}

impl fmt::Display for StepFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn increment() -> StepFunction {
        StepFunction::new("increment", |ctx| {
            StepOutcome::Next(State::new(ctx.state.clock + 1.0, ctx.state.data.clone()))
        })
    }

    #[test]
    fn test_equality_is_identity() {
        let f = increment();
        let same = f.clone();
        let other = increment();

        assert_eq!(f, same);
        assert_ne!(f, other); // same name and behavior, different object
    }

    #[test]
    fn test_call_advances_state() {
        let f = increment();
        let state = State::initial(Value::Int(0));
        let kwargs = IndexMap::new();
        let ctx = StepContext {
            state: &state,
            args: &[],
            kwargs: &kwargs,
        };
        match f.call(&ctx) {
            StepOutcome::Next(next) => assert_eq!(next.clock, 1.0),
            StepOutcome::End => panic!("expected a next state"),
        }
    }
}
