//! Patch - the changes a handler decided to apply
//!
//! A patch holds at most one change payload per kind. The presence of a
//! payload is the only thing that makes the engine run the matching apply
//! step.

use std::fmt;

/// Kind of change carried by a [`Patch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Create,
    Delete,
    Update,
}

impl ChangeKind {
    /// All kinds, in the order the engine applies them
    pub const ALL: [ChangeKind; 3] = [ChangeKind::Create, ChangeKind::Delete, ChangeKind::Update];
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Create => write!(f, "create"),
            ChangeKind::Delete => write!(f, "delete"),
            ChangeKind::Update => write!(f, "update"),
        }
    }
}

/// Create, delete and update changes computed by a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch<C> {
    create: Option<C>,
    delete: Option<C>,
    update: Option<C>,
}

impl<C> Default for Patch<C> {
    fn default() -> Self {
        Self {
            create: None,
            delete: None,
            update: None,
        }
    }
}

impl<C> Patch<C> {
    /// Create an empty patch
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_create(mut self, change: C) -> Self {
        self.create = Some(change);
        self
    }

    pub fn with_delete(mut self, change: C) -> Self {
        self.delete = Some(change);
        self
    }

    pub fn with_update(mut self, change: C) -> Self {
        self.update = Some(change);
        self
    }

    pub fn set_create_change(&mut self, change: C) {
        self.create = Some(change);
    }

    pub fn set_delete_change(&mut self, change: C) {
        self.delete = Some(change);
    }

    pub fn set_update_change(&mut self, change: C) {
        self.update = Some(change);
    }

    pub fn create_change(&self) -> Option<&C> {
        self.create.as_ref()
    }

    pub fn delete_change(&self) -> Option<&C> {
        self.delete.as_ref()
    }

    pub fn update_change(&self) -> Option<&C> {
        self.update.as_ref()
    }

    /// Look up the change of the given kind
    pub fn change(&self, kind: ChangeKind) -> Option<&C> {
        match kind {
            ChangeKind::Create => self.create_change(),
            ChangeKind::Delete => self.delete_change(),
            ChangeKind::Update => self.update_change(),
        }
    }

    /// Whether the patch carries no change at all
    pub fn is_empty(&self) -> bool {
        self.create.is_none() && self.delete.is_none() && self.update.is_none()
    }

    /// Kinds present in this patch, in application order
    pub fn kinds(&self) -> Vec<ChangeKind> {
        ChangeKind::ALL
            .into_iter()
            .filter(|kind| self.change(*kind).is_some())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_patch() {
        let patch: Patch<u8> = Patch::new();
        assert!(patch.is_empty());
        assert!(patch.kinds().is_empty());
        assert_eq!(patch.create_change(), None);
    }

    #[test]
    fn test_kinds_in_application_order() {
        let patch = Patch::new().with_update(3).with_create(1);
        assert_eq!(patch.kinds(), vec![ChangeKind::Create, ChangeKind::Update]);
        assert_eq!(patch.change(ChangeKind::Update), Some(&3));
        assert_eq!(patch.delete_change(), None);
    }

    #[test]
    fn test_setters_replace() {
        let mut patch = Patch::new();
        patch.set_delete_change("a");
        patch.set_delete_change("b");
        assert_eq!(patch.delete_change(), Some(&"b"));
        assert!(!patch.is_empty());
    }
}
