//! Scopes is a stack of mappings used while analysing a function body.
//!
//! Blocks open a scope, so a name declared in a block is gone once the block is
//! closed. The scopes are immutable maps with structural sharing, which makes
//! snapshots of the whole hierarchy cheap.

use im::HashMap as ImHashMap;
use im::Vector as ImVec;

use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;

pub type Scope<K, V> = ImHashMap<K, V>;

/// represents the scope hierarchy of a single function
#[derive(Debug, Clone)]
pub struct Scopes<K, V>
where
    K: Debug + Hash + Clone + Eq,
    V: Clone + Debug,
{
    /// Each entry is a scope, the last is the innermost one. The first one holds the
    /// parameters of the function and is never collapsed.
    pub scopes: ImVec<Scope<K, V>>,
}

impl<K, V> Default for Scopes<K, V>
where
    K: Debug + Hash + Clone + Eq,
    V: Clone + Debug,
{
    fn default() -> Self {
        Scopes {
            scopes: ImVec::unit(ImHashMap::new()),
        }
    }
}

impl<K, V> Scopes<K, V>
where
    K: Debug + Hash + Clone + Eq,
    V: Clone + Debug,
{
    /// open a new scope
    pub fn open_new(&mut self) {
        self.scopes.push_back(ImHashMap::new());
    }

    /// collapse the innermost scope. The outermost scope stays, collapsing it
    /// returns `None`
    pub fn collapse_innermost(&mut self) -> Option<Scope<K, V>> {
        if self.scopes.len() > 1 {
            self.scopes.pop_back()
        } else {
            None
        }
    }

    /// add a symbol to the innermost scope
    pub fn add_entry(&mut self, key: K, val: V) {
        if let Some(scope) = self.scopes.back_mut() {
            scope.insert(key, val);
        }
    }

    /// whether the innermost scope already declares the key
    pub fn in_innermost<BK>(&self, key: &BK) -> bool
    where
        BK: Hash + Eq + ?Sized,
        K: Borrow<BK>,
    {
        self.scopes
            .back()
            .map(|scope| scope.contains_key(key))
            .unwrap_or(false)
    }

    /// returns the information about a symbol if it can be found.
    ///
    /// starts searching in the innermost scope, and goes outwards,
    /// if the symbol is not in the scope. Returns None if the symbol is not
    /// in any scope
    pub fn find_entry<BK>(&self, key: &BK) -> Option<&V>
    where
        BK: Hash + Eq + ?Sized,
        K: Borrow<BK>,
    {
        self.scopes.iter().rev().find_map(|scope| scope.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadowing_and_collapse() {
        let mut scopes: Scopes<String, usize> = Scopes::default();
        scopes.add_entry("x".into(), 0);
        scopes.open_new();
        assert!(!scopes.in_innermost("x"));
        scopes.add_entry("x".into(), 1);
        assert_eq!(scopes.find_entry("x"), Some(&1));
        assert!(scopes.collapse_innermost().is_some());
        assert_eq!(scopes.find_entry("x"), Some(&0));
        assert!(scopes.collapse_innermost().is_none());
    }
}
