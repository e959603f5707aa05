//! Deterministic id allocation
//!
//! Every generated id starts from a readable wish-name. The name is lowercased,
//! stripped to `[a-z0-9_-]` and, if already taken in the namespace, suffixed
//! with `-2`, `-3`, ... until it is unique.

use indexmap::IndexMap;

/// Lowercase a wish-name and drop characters outside `[a-z0-9_-]`
pub fn slugify(wish_name: &str) -> String {
    wish_name
        .to_lowercase()
        .chars()
        .filter(|c| matches!(c, 'a'..='z' | '0'..='9' | '_' | '-'))
        .collect()
}

/// Insertion-ordered set of allocated ids with attached values
#[derive(Debug, Clone)]
pub struct Namespace<V = ()> {
    items: IndexMap<String, V>,
}

impl<V> Default for Namespace<V> {
    fn default() -> Self {
        Self {
            items: IndexMap::new(),
        }
    }
}

impl<V> Namespace<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a unique id derived from `wish_name` and store `item` under it
    pub fn insert(&mut self, wish_name: &str, item: V) -> String {
        let base = slugify(wish_name);

        let id = if self.items.contains_key(&base) {
            let mut suffix = 2;
            while self.items.contains_key(&format!("{base}-{suffix}")) {
                suffix += 1;
            }
            format!("{base}-{suffix}")
        } else {
            base
        };

        self.items.insert(id.clone(), item);
        id
    }

    pub fn get(&self, id: &str) -> Option<&V> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_inner(self) -> IndexMap<String, V> {
        self.items
    }
}

impl Namespace<()> {
    /// Allocate an id without an attached value
    pub fn allocate(&mut self, wish_name: &str) -> String {
        self.insert(wish_name, ())
    }
}
