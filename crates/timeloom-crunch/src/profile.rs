//! Crunching profiles
//!
//! A crunching profile says how far to crunch (the clock target) and how
//! (the step profile). Owners mutate profiles in place; every mutation bumps
//! the revision so the manager's change tracker notices between syncs.

use timeloom_foundation::{Revision, State, StepProfile};

/// Instructions for crunching: a clock target plus a step profile.
///
/// Equality ignores the revision; it is bookkeeping, not identity.
#[derive(Debug, Clone)]
pub struct CrunchingProfile {
    clock_target: f64,
    step_profile: StepProfile,
    revision: Revision,
}

impl CrunchingProfile {
    /// Crunch until the clock reaches `clock_target`, with `step_profile`.
    /// Use `f64::INFINITY` to crunch until the simulation ends on its own.
    pub fn new(clock_target: f64, step_profile: StepProfile) -> Self {
        Self {
            clock_target,
            step_profile,
            revision: Revision::default(),
        }
    }

    pub fn clock_target(&self) -> f64 {
        self.clock_target
    }

    pub fn step_profile(&self) -> &StepProfile {
        &self.step_profile
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Whether `state` fulfills this profile.
    pub fn state_satisfies(&self, state: &State) -> bool {
        state.clock >= self.clock_target
    }

    pub fn set_clock_target(&mut self, clock_target: f64) {
        if self.clock_target != clock_target {
            self.clock_target = clock_target;
            self.revision.bump();
        }
    }

    /// Raise the clock target to `clock_target`; never lowers it.
    pub fn raise_clock_target(&mut self, clock_target: f64) {
        if clock_target > self.clock_target {
            self.clock_target = clock_target;
            self.revision.bump();
        }
    }

    pub fn set_step_profile(&mut self, step_profile: StepProfile) {
        if self.step_profile != step_profile {
            self.step_profile = step_profile;
            self.revision.bump();
        }
    }
}

impl PartialEq for CrunchingProfile {
    fn eq(&self, other: &Self) -> bool {
        self.clock_target == other.clock_target && self.step_profile == other.step_profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeloom_foundation::{StepFunction, StepOutcome, Value};

    fn profile(clock_target: f64) -> CrunchingProfile {
        let step = StepFunction::new("noop", |ctx| StepOutcome::Next(ctx.state.clone()));
        CrunchingProfile::new(clock_target, StepProfile::bare(step))
    }

    #[test]
    fn test_state_satisfies_at_or_past_target() {
        let profile = profile(5.0);
        assert!(!profile.state_satisfies(&State::new(4.9, Value::default())));
        assert!(profile.state_satisfies(&State::new(5.0, Value::default())));
        assert!(profile.state_satisfies(&State::new(7.0, Value::default())));
    }

    #[test]
    fn test_infinite_target_is_never_satisfied() {
        let profile = profile(f64::INFINITY);
        assert!(!profile.state_satisfies(&State::new(1e12, Value::default())));
    }

    #[test]
    fn test_mutation_bumps_revision() {
        let mut profile = profile(5.0);
        let before = profile.revision();

        profile.set_clock_target(10.0);
        assert_ne!(profile.revision(), before);
    }

    #[test]
    fn test_noop_mutation_keeps_revision() {
        let mut profile = profile(5.0);
        let before = profile.revision();

        profile.set_clock_target(5.0);
        assert_eq!(profile.revision(), before);
    }

    #[test]
    fn test_raise_clock_target_only_raises() {
        let mut profile = profile(5.0);
        let before = profile.revision();

        profile.raise_clock_target(3.0);
        assert_eq!(profile.clock_target(), 5.0);
        assert_eq!(profile.revision(), before);

        profile.raise_clock_target(8.0);
        assert_eq!(profile.clock_target(), 8.0);
        assert_ne!(profile.revision(), before);
    }

    #[test]
    fn test_equality_ignores_revision() {
        let mut a = profile(5.0);
        let b = profile(5.0);
        assert_ne!(a, b); // different step function objects

        let mut c = a.clone();
        c.set_clock_target(9.0);
        c.set_clock_target(5.0);
        assert_eq!(a.step_profile(), c.step_profile());
        assert_eq!(a, c);
        assert_ne!(a.revision(), c.revision());

        a.set_clock_target(6.0);
        assert_ne!(a, c);
    }
}
