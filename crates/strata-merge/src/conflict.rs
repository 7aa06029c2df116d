//! Merge conflicts and the strategies that resolve them.

use std::fmt;

use serde::{Deserialize, Serialize};
use strata_types::{ItemId, Value};

/// A property both sides changed to different values.
///
/// `None` on any side means the property is absent there.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub item: ItemId,
    pub property: String,
    pub base: Option<Value>,
    pub ours: Option<Value>,
    pub theirs: Option<Value>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}: base={} ours={} theirs={}",
            self.item.short_id(),
            self.property,
            show(&self.base),
            show(&self.ours),
            show(&self.theirs)
        )
    }
}

fn show(value: &Option<Value>) -> String {
    match value {
        Some(v) => format!("{v:?}"),
        None => "<absent>".to_string(),
    }
}

/// Chooses the value of a conflicting property.
///
/// Returning `None` removes the property from the merged item.
pub trait ConflictResolver {
    fn resolve(&self, conflict: &Conflict) -> Option<Value>;
}

/// Keep the working copy's value.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreferOurs;

impl ConflictResolver for PreferOurs {
    fn resolve(&self, conflict: &Conflict) -> Option<Value> {
        conflict.ours.clone()
    }
}

/// Take the incoming value.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreferTheirs;

impl ConflictResolver for PreferTheirs {
    fn resolve(&self, conflict: &Conflict) -> Option<Value> {
        conflict.theirs.clone()
    }
}

impl<F> ConflictResolver for F
where
    F: Fn(&Conflict) -> Option<Value>,
{
    fn resolve(&self, conflict: &Conflict) -> Option<Value> {
        self(conflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conflict() -> Conflict {
        Conflict {
            item: ItemId::new(),
            property: "x".into(),
            base: Some(Value::from(2)),
            ours: Some(Value::from(3)),
            theirs: None,
        }
    }

    #[test]
    fn builtin_resolvers_pick_a_side() {
        let c = conflict();
        assert_eq!(PreferOurs.resolve(&c), Some(Value::from(3)));
        assert_eq!(PreferTheirs.resolve(&c), None);
    }

    #[test]
    fn closures_are_resolvers() {
        let c = conflict();
        let keep_base = |c: &Conflict| c.base.clone();
        assert_eq!(keep_base.resolve(&c), Some(Value::from(2)));
    }

    #[test]
    fn display_names_property_and_sides() {
        let text = conflict().to_string();
        assert!(text.contains(".x:"));
        assert!(text.contains("theirs=<absent>"));
    }
}
