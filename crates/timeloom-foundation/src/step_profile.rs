//! Step profiles
//!
//! A step profile bundles a step function with the arguments it is applied
//! with. Crunching the same simulation with different profiles - different
//! world laws, different constants - grows different branches of the same
//! history tree, so every produced state is tagged with the profile that
//! produced it.

use std::fmt;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::step::{StepContext, StepFunction, StepOutcome};
use crate::value::{State, Value};

/// An immutable step-function-plus-arguments value object.
///
/// Two profiles are equal iff their functions are identical and their
/// arguments are equal. Profiles are compared, cloned and carried around
/// freely; they are never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct StepProfile {
    function: StepFunction,
    args: Vec<Value>,
    kwargs: IndexMap<String, Value>,
}

impl StepProfile {
    pub fn new(function: StepFunction, args: Vec<Value>, kwargs: IndexMap<String, Value>) -> Self {
        Self {
            function,
            args,
            kwargs,
        }
    }

    /// A profile binding no arguments at all.
    pub fn bare(function: StepFunction) -> Self {
        Self::new(function, Vec::new(), IndexMap::new())
    }

    pub fn function(&self) -> &StepFunction {
        &self.function
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &IndexMap<String, Value> {
        &self.kwargs
    }

    /// Apply the profile's step function to a state.
    pub fn step(&self, state: &State) -> StepOutcome {
        let ctx = StepContext {
            state,
            args: &self.args,
            kwargs: &self.kwargs,
        };
        self.function.call(&ctx)
    }
}

impl fmt::Display for StepProfile {
    /// Renders e.g. `gravity_step(<state>, "bilinear", g=3)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(<state>", self.function)?;
        for arg in &self.args {
            write!(f, ", {arg}")?;
        }
        for (key, value) in &self.kwargs {
            write!(f, ", {key}={value}")?;
        }
        write!(f, ")")
    }
}

/// How a caller described the step profile it wants.
#[derive(Debug, Clone)]
pub enum StepProfileInput {
    /// A ready profile, passed through unchanged
    Profile(StepProfile),
    /// An explicit step function with arguments
    Function {
        function: StepFunction,
        args: Vec<Value>,
        kwargs: IndexMap<String, Value>,
    },
    /// Arguments only; the default step function is used
    Arguments {
        args: Vec<Value>,
        kwargs: IndexMap<String, Value>,
    },
}

/// Resolves loose step-profile descriptions against a default step function.
///
/// Most simulations have one step function that should be used unless the
/// caller explicitly names another; this helper implements that preference
/// order. An explicitly given function always wins over the default, and a
/// ready profile passes through untouched.
#[derive(Debug, Clone)]
pub struct StepProfileParser {
    default_step_function: Option<StepFunction>,
}

impl StepProfileParser {
    pub fn new(default_step_function: Option<StepFunction>) -> Self {
        Self {
            default_step_function,
        }
    }

    pub fn parse(&self, input: StepProfileInput) -> Result<StepProfile> {
        match input {
            StepProfileInput::Profile(profile) => Ok(profile),
            StepProfileInput::Function {
                function,
                args,
                kwargs,
            } => Ok(StepProfile::new(function, args, kwargs)),
            StepProfileInput::Arguments { args, kwargs } => {
                let function = self
                    .default_step_function
                    .clone()
                    .ok_or(Error::MissingStepFunction)?;
                Ok(StepProfile::new(function, args, kwargs))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;

    fn noop() -> StepFunction {
        StepFunction::new("noop", |ctx| StepOutcome::Next(ctx.state.clone()))
    }

    #[test]
    fn test_equal_arguments_compare_equal() {
        let f = noop();
        let a = StepProfile::new(
            f.clone(),
            vec![Value::Int(1)],
            indexmap! { "g".to_string() => Value::Scalar(3.0) },
        );
        let b = StepProfile::new(
            f,
            vec![Value::Int(1)],
            indexmap! { "g".to_string() => Value::Scalar(3.0) },
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_differing_kwarg_value_compares_unequal() {
        let f = noop();
        let a = StepProfile::new(
            f.clone(),
            vec![],
            indexmap! { "g".to_string() => Value::Scalar(3.0) },
        );
        let b = StepProfile::new(
            f,
            vec![],
            indexmap! { "g".to_string() => Value::Scalar(4.0) },
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_differing_function_compares_unequal() {
        let a = StepProfile::bare(noop());
        let b = StepProfile::bare(noop());
        assert_ne!(a, b);
    }

    #[test]
    fn test_parser_prefers_explicit_function() {
        let default = noop();
        let explicit = noop();
        let parser = StepProfileParser::new(Some(default));

        let profile = parser
            .parse(StepProfileInput::Function {
                function: explicit.clone(),
                args: vec![],
                kwargs: IndexMap::new(),
            })
            .unwrap();
        assert_eq!(profile.function(), &explicit);
    }

    #[test]
    fn test_parser_falls_back_to_default() {
        let default = noop();
        let parser = StepProfileParser::new(Some(default.clone()));

        let profile = parser
            .parse(StepProfileInput::Arguments {
                args: vec![Value::Int(5)],
                kwargs: IndexMap::new(),
            })
            .unwrap();
        assert_eq!(profile.function(), &default);
        assert_eq!(profile.args(), &[Value::Int(5)]);
    }

    #[test]
    fn test_parser_passes_profile_through() {
        let profile = StepProfile::bare(noop());
        let parser = StepProfileParser::new(None);

        let parsed = parser
            .parse(StepProfileInput::Profile(profile.clone()))
            .unwrap();
        assert_eq!(parsed, profile);
    }

    #[test]
    fn test_parser_without_default_rejects_bare_arguments() {
        let parser = StepProfileParser::new(None);
        let result = parser.parse(StepProfileInput::Arguments {
            args: vec![],
            kwargs: IndexMap::new(),
        });
        assert!(matches!(result, Err(Error::MissingStepFunction)));
    }

    #[test]
    fn test_display() {
        let profile = StepProfile::new(
            noop(),
            vec![Value::Text("bilinear".into())],
            indexmap! { "t".to_string() => Value::Int(7) },
        );
        assert_eq!(profile.to_string(), "noop(<state>, \"bilinear\", t=7)");
    }
}
