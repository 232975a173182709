use serde::{Deserialize, Serialize};

/// Which parcel of which project is being edited.
///
/// Passed explicitly to every engine call. The index is checked against the
/// record set before every use; see [`EditingContext::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditingContext {
    pub record_set_id: String,
    pub index: Option<usize>,
}

impl EditingContext {
    pub fn new(record_set_id: impl Into<String>, index: Option<usize>) -> Self {
        Self {
            record_set_id: record_set_id.into(),
            index,
        }
    }

    /// Context for a project with no parcel selected.
    pub fn project(record_set_id: impl Into<String>) -> Self {
        Self::new(record_set_id, None)
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// The index, only when it points into a record set of `len` parcels.
    pub fn resolve(&self, len: usize) -> Option<usize> {
        match self.index {
            Some(i) if i < len => Some(i),
            Some(i) => {
                log::warn!(
                    "stale parcel index {} for project '{}' ({} parcel(s))",
                    i,
                    self.record_set_id,
                    len
                );
                None
            }
            None => None,
        }
    }

    /// Adjust the index after the parcel at `removed` was deleted.
    pub fn after_removal(&mut self, removed: usize) {
        self.index = match self.index {
            Some(i) if i == removed => None,
            Some(i) if i > removed => Some(i - 1),
            other => other,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_checks_bounds() {
        let ctx = EditingContext::new("p1", Some(2));
        assert_eq!(ctx.resolve(3), Some(2));
        assert_eq!(ctx.resolve(2), None);
        assert_eq!(EditingContext::project("p1").resolve(5), None);
    }

    #[test]
    fn test_after_removal() {
        let mut ctx = EditingContext::new("p1", Some(2));
        ctx.after_removal(0);
        assert_eq!(ctx.index, Some(1));
        ctx.after_removal(3);
        assert_eq!(ctx.index, Some(1));
        ctx.after_removal(1);
        assert_eq!(ctx.index, None);
    }
}
