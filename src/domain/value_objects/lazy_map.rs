use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

type Producer<V> = Arc<dyn Fn(&LazyMap<V>) -> V + Send + Sync>;

/// A map entry: either a stored value or a function computing it on access.
pub enum LazyValue<V> {
    Literal(V),
    Producer(Producer<V>),
}

impl<V: Clone> Clone for LazyValue<V> {
    fn clone(&self) -> Self {
        match self {
            Self::Literal(value) => Self::Literal(value.clone()),
            Self::Producer(producer) => Self::Producer(Arc::clone(producer)),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for LazyValue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Mapping whose values may be computed lazily.
///
/// Producers run on every `resolve` and receive the map itself, so one
/// entry can be derived from others.
///
/// ```
/// use cons3rt_kit::domain::value_objects::lazy_map::LazyMap;
///
/// let mut facts = LazyMap::new();
/// facts.insert("host", "web01".to_string());
/// facts.insert_with("fqdn", |m| format!("{}.example.com", m.resolve("host").unwrap_or_default()));
/// assert_eq!(facts.resolve("fqdn").as_deref(), Some("web01.example.com"));
/// ```
#[derive(Clone)]
pub struct LazyMap<V> {
    entries: BTreeMap<String, LazyValue<V>>,
}

impl<V> Default for LazyMap<V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for LazyMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<V: Clone> LazyMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) -> &mut Self {
        self.entries.insert(key.into(), LazyValue::Literal(value));
        self
    }

    pub fn insert_with<F>(&mut self, key: impl Into<String>, producer: F) -> &mut Self
    where
        F: Fn(&LazyMap<V>) -> V + Send + Sync + 'static,
    {
        self.entries
            .insert(key.into(), LazyValue::Producer(Arc::new(producer)));
        self
    }

    pub fn resolve(&self, key: &str) -> Option<V> {
        match self.entries.get(key)? {
            LazyValue::Literal(value) => Some(value.clone()),
            LazyValue::Producer(producer) => Some(producer(self)),
        }
    }

    pub fn resolve_all(&self) -> BTreeMap<String, V> {
        self.entries
            .keys()
            .filter_map(|key| self.resolve(key).map(|value| (key.clone(), value)))
            .collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
