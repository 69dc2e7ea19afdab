//! Simulation package descriptors
//!
//! A simpack describes a simulation to the crunching layer: which worker
//! backends can crunch it, and which step function to use when the caller
//! doesn't name one.

use timeloom_foundation::{StepFunction, StepProfileParser};

use crate::cruncher::CruncherType;
use crate::thread_cruncher::ThreadCruncher;

/// Descriptor for a simulation package.
#[derive(Debug, Clone)]
pub struct Simpack {
    name: String,
    available_cruncher_types: Vec<CruncherType>,
    default_step_function: Option<StepFunction>,
}

impl Simpack {
    /// Descriptor with the default backend list (thread crunchers only).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available_cruncher_types: vec![ThreadCruncher::cruncher_type()],
            default_step_function: None,
        }
    }

    /// Replace the backend list. Order matters: a fresh crunching manager
    /// selects the first entry.
    pub fn with_cruncher_types(mut self, types: Vec<CruncherType>) -> Self {
        self.available_cruncher_types = types;
        self
    }

    /// Set the step function used when none is explicitly given.
    pub fn with_default_step_function(mut self, function: StepFunction) -> Self {
        self.default_step_function = Some(function);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn available_cruncher_types(&self) -> &[CruncherType] {
        &self.available_cruncher_types
    }

    pub fn default_step_function(&self) -> Option<&StepFunction> {
        self.default_step_function.as_ref()
    }

    /// Parser resolving loose step-profile descriptions against this
    /// simpack's default step function.
    pub fn step_profile_parser(&self) -> StepProfileParser {
        StepProfileParser::new(self.default_step_function.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeloom_foundation::{StepOutcome, StepProfileInput};

    #[test]
    fn test_defaults_to_thread_backend() {
        let simpack = Simpack::new("demo");
        let kinds: Vec<String> = simpack
            .available_cruncher_types()
            .iter()
            .map(|t| t.kind().to_string())
            .collect();
        assert_eq!(kinds, vec![ThreadCruncher::KIND.to_string()]);
    }

    #[test]
    fn test_parser_uses_default_step_function() {
        let step = StepFunction::new("demo_step", |ctx| StepOutcome::Next(ctx.state.clone()));
        let simpack = Simpack::new("demo").with_default_step_function(step.clone());

        let profile = simpack
            .step_profile_parser()
            .parse(StepProfileInput::Arguments {
                args: vec![],
                kwargs: Default::default(),
            })
            .unwrap();
        assert_eq!(profile.function(), &step);
    }
}
