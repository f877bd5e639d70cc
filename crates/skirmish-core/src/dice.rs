//! Pure test resolver for quality and morale rolls
//!
//! One Page Rules checks roll a D6, add situational modifiers, and succeed
//! when the result meets or beats a target number (a model's quality, lower
//! is better). The resolver holds no state; dice come from [`DiceRng`] or
//! from a forced value injected by tests.

use crate::DiceRng;
use serde::{Deserialize, Serialize};

/// The outcome of a single resolved test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// The raw die roll (1..=6)
    pub roll: u8,
    /// Situational modifier applied to the roll
    pub modifier: i32,
    /// Target number the test was resolved against
    pub target: u8,
    /// `roll + modifier`, unclamped; this is what pass/fail compares
    pub total: i32,
    /// Whether the test passed (`total >= target`)
    pub passed: bool,
}

impl TestOutcome {
    /// The effective die value clamped to the physical range of a D6.
    ///
    /// Display code shows this; the pass/fail comparison uses the
    /// unclamped [`TestOutcome::total`].
    pub fn effective(&self) -> u8 {
        self.total.clamp(1, 6) as u8
    }
}

/// Resolve a test against a target number.
///
/// Pure function; callers roll the die themselves (or force one) so the
/// resolver is safe to call from anywhere.
pub fn resolve_test(target: u8, modifier: i32, roll: u8) -> TestOutcome {
    let total = i32::from(roll) + modifier;
    TestOutcome {
        roll,
        modifier,
        target,
        total,
        passed: total >= i32::from(target),
    }
}

/// Take a forced roll if one was injected, otherwise roll a D6.
pub fn roll_or_forced(rng: &mut DiceRng, forced: Option<u8>) -> u8 {
    match forced {
        Some(roll) => roll.clamp(1, 6),
        None => rng.d6(),
    }
}

/// Render a human-readable description of a resolved test.
pub fn describe_test(label: &str, reason: &str, outcome: &TestOutcome) -> String {
    let result_text = if outcome.modifier == 0 {
        format!("{}", outcome.roll)
    } else {
        format!("{}{:+}={}", outcome.roll, outcome.modifier, outcome.total)
    };
    let verdict = if outcome.passed { "PASSED" } else { "FAILED" };

    format!(
        "{} test ({}): rolled {} vs {}+ - {}",
        label, reason, result_text, outcome.target, verdict
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_and_fail() {
        assert!(resolve_test(4, 0, 4).passed);
        assert!(resolve_test(4, 0, 5).passed);
        assert!(!resolve_test(4, 0, 3).passed);
    }

    #[test]
    fn test_forced_roll_below_quality_fails() {
        // Quality 4+, roll forced to 3, no modifier
        let outcome = resolve_test(4, 0, 3);
        assert!(!outcome.passed);
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.target, 4);
    }

    #[test]
    fn test_modifier_applies() {
        let outcome = resolve_test(5, 2, 3);
        assert_eq!(outcome.total, 5);
        assert!(outcome.passed);

        let outcome = resolve_test(3, -2, 4);
        assert_eq!(outcome.total, 2);
        assert!(!outcome.passed);
    }

    #[test]
    fn test_effective_is_clamped() {
        assert_eq!(resolve_test(2, 4, 6).effective(), 6);
        assert_eq!(resolve_test(2, -4, 2).effective(), 1);
        // Pass/fail still uses the unclamped total
        assert!(!resolve_test(2, -4, 2).passed);
    }

    #[test]
    fn test_roll_or_forced() {
        let mut rng = DiceRng::new(42);
        assert_eq!(roll_or_forced(&mut rng, Some(3)), 3);
        // Out-of-range forced rolls are clamped to the die faces
        assert_eq!(roll_or_forced(&mut rng, Some(9)), 6);
        assert!((1..=6).contains(&roll_or_forced(&mut rng, None)));
    }

    #[test]
    fn test_describe() {
        let outcome = resolve_test(4, 0, 3);
        let text = describe_test("Quality", "ability use", &outcome);
        assert!(text.contains("rolled 3 vs 4+"));
        assert!(text.contains("FAILED"));

        let outcome = resolve_test(4, -1, 5);
        let text = describe_test("Morale", "casualties", &outcome);
        assert!(text.contains("5-1=4"));
        assert!(text.contains("PASSED"));
    }
}
