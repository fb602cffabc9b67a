//! Test-sequence parsing
//!
//! A test sequence is written as `qps+seconds` groups joined by `-`, e.g.
//! `50+30-200+30` for 30 seconds at 50 qps followed by 30 seconds at 200 qps.
//! Numbers must be canonical decimal (digits only, no leading zero, non-zero)
//! so that rendering a parsed sequence reproduces the input exactly.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between steps
pub const STEP_SEPARATOR: char = '-';

/// Separator between qps and duration inside a step
pub const FIELD_SEPARATOR: char = '+';

/// Errors raised while parsing a test sequence
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceParseError {
    #[error("test sequence is empty")]
    Empty,

    #[error("step {index} ('{group}') must be written as <qps>+<seconds>")]
    MissingSeparator { index: usize, group: String },

    #[error("step {index} ('{group}') has an invalid {field}: '{value}'")]
    InvalidNumber {
        index: usize,
        group: String,
        field: &'static str,
        value: String,
    },
}

/// One load profile: a request rate held for a number of seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TestSequenceStep {
    /// Requests per second
    pub qps: u32,
    /// Duration of the attack in seconds
    pub duration_secs: u32,
}

impl TestSequenceStep {
    pub fn new(qps: u32, duration_secs: u32) -> Self {
        Self { qps, duration_secs }
    }
}

impl fmt::Display for TestSequenceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.qps, FIELD_SEPARATOR, self.duration_secs)
    }
}

/// Ordered, non-empty list of steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSequence {
    steps: Vec<TestSequenceStep>,
}

impl TestSequence {
    /// Parse a sequence string such as `50+30-200+30`.
    ///
    /// # Example
    /// ```
    /// use rpc_bench_common::sequence::{TestSequence, TestSequenceStep};
    ///
    /// let seq = TestSequence::parse("50+30-200+30").unwrap();
    /// assert_eq!(seq.steps(), &[TestSequenceStep::new(50, 30), TestSequenceStep::new(200, 30)]);
    /// assert_eq!(seq.render(), "50+30-200+30");
    /// ```
    pub fn parse(input: &str) -> Result<Self, SequenceParseError> {
        if input.is_empty() {
            return Err(SequenceParseError::Empty);
        }

        let steps = input
            .split(STEP_SEPARATOR)
            .enumerate()
            .map(|(index, group)| parse_step(index, group))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { steps })
    }

    /// Build a sequence from already-validated steps.
    ///
    /// Returns `None` if `steps` is empty or any step has a zero field.
    pub fn from_steps(steps: Vec<TestSequenceStep>) -> Option<Self> {
        let valid = !steps.is_empty() && steps.iter().all(|s| s.qps > 0 && s.duration_secs > 0);
        valid.then_some(Self { steps })
    }

    /// Render back to the `qps+seconds-...` form
    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn steps(&self) -> &[TestSequenceStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false: a parsed sequence has at least one step
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestSequenceStep> {
        self.steps.iter()
    }
}

impl fmt::Display for TestSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", STEP_SEPARATOR)?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

impl FromStr for TestSequence {
    type Err = SequenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'a> IntoIterator for &'a TestSequence {
    type Item = &'a TestSequenceStep;
    type IntoIter = std::slice::Iter<'a, TestSequenceStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

fn parse_step(index: usize, group: &str) -> Result<TestSequenceStep, SequenceParseError> {
    let Some((qps, duration)) = group.split_once(FIELD_SEPARATOR) else {
        return Err(SequenceParseError::MissingSeparator {
            index,
            group: group.to_string(),
        });
    };

    Ok(TestSequenceStep {
        qps: parse_field(index, group, "qps", qps)?,
        duration_secs: parse_field(index, group, "duration", duration)?,
    })
}

fn parse_field(
    index: usize,
    group: &str,
    field: &'static str,
    value: &str,
) -> Result<u32, SequenceParseError> {
    let invalid = || SequenceParseError::InvalidNumber {
        index,
        group: group.to_string(),
        field,
        value: value.to_string(),
    };

    // `u32::from_str` would accept "+5" and "007", neither of which renders back
    let canonical = !value.is_empty()
        && value.bytes().all(|b| b.is_ascii_digit())
        && !value.starts_with('0');
    if !canonical {
        return Err(invalid());
    }

    value.parse().map_err(|_| invalid())
}
