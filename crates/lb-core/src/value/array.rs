use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use super::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArrayKey {
    Int(i64),
    Str(String),
}

impl ArrayKey {
    /// Canonical key for a string: decimal integer strings become integer keys.
    pub fn from_string(s: impl Into<String>) -> ArrayKey {
        let s = s.into();
        match canonical_int(&s) {
            Some(i) => ArrayKey::Int(i),
            None => ArrayKey::Str(s),
        }
    }

    /// Key conversion of an index operand. Arrays and objects are not valid keys.
    pub fn from_value(value: &Value) -> Option<ArrayKey> {
        match value {
            Value::Null => Some(ArrayKey::Str(String::new())),
            Value::Bool(b) => Some(ArrayKey::Int(*b as i64)),
            Value::Long(l) => Some(ArrayKey::Int(*l)),
            Value::Double(d) => Some(ArrayKey::Int(d.trunc() as i64)),
            Value::String(s) => Some(ArrayKey::from_string(s.as_str())),
            Value::Alias(alias) => alias.with_value(ArrayKey::from_value),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ArrayKey::Int(i) => Value::Long(*i),
            ArrayKey::Str(s) => Value::String(s.clone()),
        }
    }
}

fn canonical_int(s: &str) -> Option<i64> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    if s == "-0" {
        return None;
    }
    s.parse::<i64>().ok()
}

impl Display for ArrayKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrayKey::Int(i) => write!(f, "{}", i),
            ArrayKey::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ArrayKey {
    fn from(i: i64) -> Self {
        ArrayKey::Int(i)
    }
}

impl From<&str> for ArrayKey {
    fn from(s: &str) -> Self {
        ArrayKey::from_string(s)
    }
}

#[derive(Clone, Default)]
struct ArrayTable {
    entries: Vec<(ArrayKey, Value)>,
    index: HashMap<ArrayKey, usize>,
    next_index: i64,
}

/// Ordered hash array with value semantics. Copies share storage until one
/// side is written.
#[derive(Clone)]
pub struct PhpArray {
    table: Arc<ArrayTable>,
}

fn shared_empty() -> &'static Arc<ArrayTable> {
    static EMPTY: OnceLock<Arc<ArrayTable>> = OnceLock::new();
    EMPTY.get_or_init(|| Arc::new(ArrayTable::default()))
}

impl Default for PhpArray {
    fn default() -> Self {
        Self::empty()
    }
}

impl PhpArray {
    pub fn new() -> Self {
        Self::empty()
    }

    /// The shared empty array. Cloning it does not allocate.
    pub fn empty() -> Self {
        Self {
            table: Arc::clone(shared_empty()),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: Arc::new(ArrayTable {
                entries: Vec::with_capacity(capacity),
                index: HashMap::with_capacity(capacity),
                next_index: 0,
            }),
        }
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let mut array = Self::new();
        for value in values {
            array.push(value);
        }
        array
    }

    pub fn is_shared_empty(&self) -> bool {
        Arc::ptr_eq(&self.table, shared_empty())
    }

    pub fn len(&self) -> usize {
        self.table.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.entries.is_empty()
    }

    pub fn next_index(&self) -> i64 {
        self.table.next_index
    }

    pub fn contains_key(&self, key: &ArrayKey) -> bool {
        self.table.index.contains_key(key)
    }

    pub fn get(&self, key: &ArrayKey) -> Option<&Value> {
        let pos = *self.table.index.get(key)?;
        Some(&self.table.entries[pos].1)
    }

    pub fn get_mut(&mut self, key: &ArrayKey) -> Option<&mut Value> {
        let pos = *self.table.index.get(key)?;
        let table = Arc::make_mut(&mut self.table);
        Some(&mut table.entries[pos].1)
    }

    /// Slot for `key`, inserting `null` when absent.
    pub fn entry(&mut self, key: ArrayKey) -> &mut Value {
        let table = Arc::make_mut(&mut self.table);
        let pos = match table.index.get(&key) {
            Some(pos) => *pos,
            None => table.insert_new(key, Value::Null),
        };
        &mut table.entries[pos].1
    }

    /// Stores `value` under `key`, writing through an existing reference slot.
    pub fn set(&mut self, key: ArrayKey, value: Value) {
        self.entry(key).assign(value);
    }

    /// Appends under the next free integer key.
    pub fn push(&mut self, value: Value) -> ArrayKey {
        let table = Arc::make_mut(&mut self.table);
        let key = ArrayKey::Int(table.next_index);
        table.insert_new(key.clone(), value);
        key
    }

    pub fn remove(&mut self, key: &ArrayKey) -> Option<Value> {
        if !self.contains_key(key) {
            return None;
        }
        let table = Arc::make_mut(&mut self.table);
        let pos = table.index.remove(key)?;
        let (_, value) = table.entries.remove(pos);
        for (_, slot) in table.index.iter_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArrayKey, &Value)> {
        self.table.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &ArrayKey> {
        self.table.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.table.entries.iter().map(|(_, v)| v)
    }
}

impl ArrayTable {
    fn insert_new(&mut self, key: ArrayKey, value: Value) -> usize {
        if let ArrayKey::Int(i) = key {
            if i >= self.next_index {
                self.next_index = i.saturating_add(1);
            }
        }
        let pos = self.entries.len();
        self.index.insert(key.clone(), pos);
        self.entries.push((key, value));
        pos
    }
}

impl PartialEq for PhpArray {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.table, &other.table)
            || (self.len() == other.len()
                && self
                    .iter()
                    .zip(other.iter())
                    .all(|((lk, lv), (rk, rv))| lk == rk && lv == rv))
    }
}

impl Debug for PhpArray {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl FromIterator<(ArrayKey, Value)> for PhpArray {
    fn from_iter<T: IntoIterator<Item = (ArrayKey, Value)>>(iter: T) -> Self {
        let mut array = PhpArray::new();
        for (key, value) in iter {
            array.set(key, value);
        }
        array
    }
}
