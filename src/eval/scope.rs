use std::collections::HashMap;
use std::sync::Arc;

use crate::stdlib;
use crate::value::{HostValue, Value};

/// Variables visible to an evaluation.
///
/// Variables of a child scope shadow those of its parents. The standard
/// library is consulted last, after the whole chain.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    variables: HashMap<String, Value>,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Arc<Scope>) -> Self {
        Self {
            variables: HashMap::new(),
            parent: Some(parent),
        }
    }

    pub fn with_variables<K, I>(variables: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self {
            variables: variables.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            parent: None,
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.variables.insert(name.into(), value)
    }

    /// Encode a host value and bind it.
    pub fn set<T: HostValue>(&mut self, name: impl Into<String>, host: &T) -> Option<Value> {
        self.insert(name, host.encode())
    }

    /// Look a name up through the chain, falling back to the standard
    /// library.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.lookup_local(name).or_else(|| stdlib::lookup(name))
    }

    fn lookup_local(&self, name: &str) -> Option<Value> {
        // 現在のスコープで検索
        if let Some(value) = self.variables.get(name) {
            return Some(value.clone());
        }
        // 親スコープを再帰的に検索
        self.parent.as_ref().and_then(|parent| parent.lookup_local(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
            || self.parent.as_ref().is_some_and(|p| p.contains(name))
    }

    // スコープチェーンの深さ（デバッグ用）
    pub fn depth(&self) -> usize {
        1 + self.parent.as_ref().map_or(0, |p| p.depth())
    }
}
