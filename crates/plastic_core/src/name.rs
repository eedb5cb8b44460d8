//! Interned identifiers.
//!
//! Binding names and template field names are interned once so that equality
//! is a pointer comparison.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;

lazy_static! {
    static ref INTERNER: Mutex<HashSet<Arc<str>>> = Mutex::new(HashSet::new());
}

/// An interned identifier. Two `Name`s are equal iff they were interned from
/// the same string, which makes them the same allocation.
#[derive(Clone)]
pub struct Name(Arc<str>);

impl Name {
    pub fn new(s: &str) -> Self {
        let mut interner = INTERNER.lock();
        if let Some(existing) = interner.get(s) {
            return Name(Arc::clone(existing));
        }
        let interned: Arc<str> = Arc::from(s);
        interner.insert(Arc::clone(&interned));
        Name(interned)
    }

    /// Name of the `index`th generated field with the given prefix, e.g. `in_0`.
    pub fn indexed(prefix: &str, index: usize) -> Self {
        Name::new(&format!("{prefix}_{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::new(s)
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name::new(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_returns_same_allocation() {
        let a = Name::new("frequency");
        let b = Name::new(&String::from("frequency"));
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn different_strings_are_different_names() {
        assert_ne!(Name::new("in_0"), Name::new("in_1"));
    }

    #[test]
    fn indexed_names() {
        assert_eq!(Name::indexed("out", 3), Name::new("out_3"));
        assert_eq!(Name::indexed("in", 0).as_str(), "in_0");
    }
}
