use std::collections::BTreeSet;

/// One screen of the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDescriptor {
    pub label: &'static str,
    pub optional: bool,
}

/// Outcome of a skip attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipAttempt {
    Skipped,
    /// The current step was not optional. The skip mark is withheld but the
    /// step still advances; callers surface the warning (see DESIGN.md).
    NotOptional,
}

/// Ordered step machine over a fixed list of step descriptors.
///
/// `active` ranges over `0..=steps.len()`; the value `steps.len()` is the
/// everything-passed position a visual stepper renders as fully complete.
/// `skipped` only ever holds indices of optional steps the user explicitly
/// bypassed, and is replaced wholesale on every transition so each
/// transition reads as a pure function of the previous state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSequencer {
    steps: Vec<StepDescriptor>,
    active: usize,
    skipped: BTreeSet<usize>,
}

impl StepSequencer {
    pub fn new(steps: Vec<StepDescriptor>) -> Self {
        Self {
            steps,
            active: 0,
            skipped: BTreeSet::new(),
        }
    }

    /// The event wizard's fixed sequence: details, interests, preview.
    pub fn event_steps() -> Self {
        Self::new(vec![
            StepDescriptor {
                label: "Details",
                optional: false,
            },
            StepDescriptor {
                label: "Interests",
                optional: true,
            },
            StepDescriptor {
                label: "Preview",
                optional: false,
            },
        ])
    }

    pub fn active_step(&self) -> usize {
        self.active
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&StepDescriptor> {
        self.steps.get(index)
    }

    pub fn is_step_optional(&self, index: usize) -> bool {
        self.steps.get(index).map(|step| step.optional).unwrap_or(false)
    }

    pub fn is_step_skipped(&self, index: usize) -> bool {
        self.skipped.contains(&index)
    }

    /// Completed-marker for a visual stepper. A skipped step reports false
    /// even though navigation proceeded past it.
    pub fn is_step_completed(&self, index: usize) -> bool {
        index < self.active && !self.skipped.contains(&index)
    }

    /// True on the last step, where the primary control switches from
    /// "Next" to "Submit".
    pub fn is_terminal(&self) -> bool {
        self.active + 1 == self.steps.len()
    }

    /// True once every step has been passed.
    pub fn is_complete(&self) -> bool {
        self.active >= self.steps.len()
    }

    /// Move to the next step. Re-traversal of a previously skipped step
    /// clears its skip mark. No-op once the sequence is complete.
    pub fn advance(&mut self) {
        if self.is_complete() {
            return;
        }
        if self.skipped.contains(&self.active) {
            let mut next = self.skipped.clone();
            next.remove(&self.active);
            self.skipped = next;
        }
        self.active += 1;
    }

    /// Move to the previous step. No-op on the first step; skip marks are
    /// never altered by retreating.
    pub fn retreat(&mut self) {
        self.active = self.active.saturating_sub(1);
    }

    /// Bypass the current step. Only optional steps receive a skip mark; a
    /// non-optional step advances unmarked and reports `NotOptional`.
    pub fn skip(&mut self) -> SkipAttempt {
        if self.is_complete() {
            return SkipAttempt::NotOptional;
        }
        let attempt = if self.is_step_optional(self.active) {
            let mut next = self.skipped.clone();
            next.insert(self.active);
            self.skipped = next;
            SkipAttempt::Skipped
        } else {
            SkipAttempt::NotOptional
        };
        self.active += 1;
        attempt
    }
}
