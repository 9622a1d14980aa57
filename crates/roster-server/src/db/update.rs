//! Typed conditional update requests
//!
//! A [`ConditionalUpdate`] bundles the key, the fields to set and the
//! precondition into one value. The store applies it as a single atomic
//! operation; callers never read-then-write.

/// One field write inside a conditional update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldAssignment {
    Weight(f64),
    Height(f64),
    Notified(bool),
}

impl FieldAssignment {
    pub fn column(&self) -> &'static str {
        match self {
            FieldAssignment::Weight(_) => "weight",
            FieldAssignment::Height(_) => "height",
            FieldAssignment::Notified(_) => "notified",
        }
    }
}

/// Precondition evaluated atomically with the write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateCondition {
    /// Apply only if a member with exactly this email exists
    #[default]
    KeyExists,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalUpdate {
    pub email: String,
    pub assignments: Vec<FieldAssignment>,
    pub condition: UpdateCondition,
}

impl ConditionalUpdate {
    pub fn for_key(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            assignments: Vec::new(),
            condition: UpdateCondition::KeyExists,
        }
    }

    /// Add a field write. A later write to the same column replaces the earlier one.
    pub fn set(mut self, assignment: FieldAssignment) -> Self {
        self.assignments
            .retain(|existing| existing.column() != assignment.column());
        self.assignments.push(assignment);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_assignments() {
        let update = ConditionalUpdate::for_key("a@x.com")
            .set(FieldAssignment::Weight(70.5))
            .set(FieldAssignment::Height(175.0));

        assert_eq!(update.email, "a@x.com");
        assert_eq!(update.condition, UpdateCondition::KeyExists);
        assert_eq!(
            update.assignments,
            vec![FieldAssignment::Weight(70.5), FieldAssignment::Height(175.0)]
        );
    }

    #[test]
    fn test_same_column_is_replaced() {
        let update = ConditionalUpdate::for_key("a@x.com")
            .set(FieldAssignment::Weight(60.0))
            .set(FieldAssignment::Weight(61.0));

        assert_eq!(update.assignments, vec![FieldAssignment::Weight(61.0)]);
    }

    #[test]
    fn test_empty_update() {
        assert!(ConditionalUpdate::for_key("a@x.com").is_empty());
    }
}
