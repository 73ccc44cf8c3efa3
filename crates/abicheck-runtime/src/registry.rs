//! Aggregate registry
//!
//! Ordered list of known aggregate signatures. Each entry pairs the signature
//! text with a descriptor constructor and a payload comparator. Lookup is by
//! textual prefix: the first entry whose signature is a prefix of the remaining
//! signature wins, and its byte length is the token length. The lexer never has
//! to match braces itself.

use crate::aggregate::{compare_as, AggregateDescriptor, CAggregate};

/// Builds a fresh descriptor for one use
pub type Constructor = fn() -> AggregateDescriptor;

/// Compares an observed payload against an expected one
pub type Comparator = fn(&[u8], &[u8]) -> bool;

/// Resolved aggregate token: registry index and consumed length in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateRef {
    pub index: usize,
    pub len: usize,
}

/// One registered aggregate type
#[derive(Clone)]
pub struct AggregateEntry {
    signature: &'static str,
    construct: Constructor,
    compare: Comparator,
    payload_size: usize,
}

impl AggregateEntry {
    /// Register an aggregate from explicit callbacks
    pub fn new(signature: &'static str, construct: Constructor, compare: Comparator) -> Self {
        let payload_size = construct().size();
        Self {
            signature,
            construct,
            compare,
            payload_size,
        }
    }

    /// Register a `#[repr(C)]` Rust struct with the default field-wise comparator
    pub fn of<T: CAggregate>() -> Self {
        Self::new(T::SIGNATURE, T::descriptor, compare_as::<T>)
    }

    pub fn signature(&self) -> &'static str {
        self.signature
    }

    /// Size in bytes of one value of this aggregate
    pub fn payload_size(&self) -> usize {
        self.payload_size
    }
}

impl std::fmt::Debug for AggregateEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateEntry")
            .field("signature", &self.signature)
            .field("payload_size", &self.payload_size)
            .finish()
    }
}

/// Ordered aggregate registry
#[derive(Debug, Clone, Default)]
pub struct AggregateRegistry {
    entries: Vec<AggregateEntry>,
}

impl AggregateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, returning its index
    pub fn register(&mut self, entry: AggregateEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    /// Builder form of `register`
    pub fn with(mut self, entry: AggregateEntry) -> Self {
        self.register(entry);
        self
    }

    /// Find the first entry whose signature is a prefix of `rest`
    ///
    /// # Examples
    ///
    /// ```
    /// # use abicheck_runtime::registry::{AggregateEntry, AggregateRegistry};
    /// # use abicheck_runtime::aggregate::{AggregateDescriptor, Field};
    /// # use abicheck_runtime::types::ScalarType;
    /// fn ii() -> AggregateDescriptor {
    ///     AggregateDescriptor::new(vec![Field::scalar(ScalarType::Int).repeated(2)])
    /// }
    /// let registry = AggregateRegistry::new()
    ///     .with(AggregateEntry::new("{i[2]}", ii, |a, b| a == b));
    ///
    /// let found = registry.resolve("{i[2]}d").unwrap();
    /// assert_eq!((found.index, found.len), (0, 6));
    /// assert!(registry.resolve("{i}").is_none());
    /// ```
    pub fn resolve(&self, rest: &str) -> Option<AggregateRef> {
        self.entries
            .iter()
            .position(|entry| rest.starts_with(entry.signature))
            .map(|index| AggregateRef {
                index,
                len: self.entries[index].signature.len(),
            })
    }

    /// Construct a fresh descriptor for the entry at `index`
    pub fn construct(&self, index: usize) -> Option<AggregateDescriptor> {
        self.entries.get(index).map(|entry| (entry.construct)())
    }

    /// Comparator registered for the entry at `index`
    pub fn comparator(&self, index: usize) -> Option<Comparator> {
        self.entries.get(index).map(|entry| entry.compare)
    }

    pub fn signature(&self, index: usize) -> Option<&'static str> {
        self.entries.get(index).map(|entry| entry.signature)
    }

    pub fn entries(&self) -> &[AggregateEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest payload any registered aggregate needs
    pub fn max_payload_size(&self) -> usize {
        self.entries
            .iter()
            .map(AggregateEntry::payload_size)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Field;
    use crate::types::ScalarType;

    fn ic() -> AggregateDescriptor {
        AggregateDescriptor::new(vec![
            Field::scalar(ScalarType::Int),
            Field::scalar(ScalarType::Char),
        ])
    }

    fn icc() -> AggregateDescriptor {
        AggregateDescriptor::new(vec![
            Field::scalar(ScalarType::Int),
            Field::aggregate(AggregateDescriptor::new(vec![
                Field::scalar(ScalarType::Char),
                Field::scalar(ScalarType::Char),
            ])),
        ])
    }

    fn bytes_equal(a: &[u8], b: &[u8]) -> bool {
        a == b
    }

    fn registry() -> AggregateRegistry {
        AggregateRegistry::new()
            .with(AggregateEntry::new("{ic}", ic, bytes_equal))
            .with(AggregateEntry::new("{i{cc}}", icc, bytes_equal))
    }

    #[test]
    fn test_resolve_returns_index_and_length() {
        let registry = registry();
        assert_eq!(
            registry.resolve("{i{cc}}i"),
            Some(AggregateRef { index: 1, len: 7 })
        );
        assert_eq!(
            registry.resolve("{ic}"),
            Some(AggregateRef { index: 0, len: 4 })
        );
    }

    #[test]
    fn test_resolve_unknown_prefix() {
        let registry = registry();
        assert_eq!(registry.resolve("{ii}"), None);
        assert_eq!(registry.resolve("{i"), None);
        assert_eq!(registry.resolve(""), None);
    }

    #[test]
    fn test_first_registered_match_wins() {
        fn other() -> AggregateDescriptor {
            AggregateDescriptor::new(vec![Field::scalar(ScalarType::Int)])
        }
        let registry = registry().with(AggregateEntry::new("{ic}", other, bytes_equal));
        assert_eq!(registry.resolve("{ic}").map(|r| r.index), Some(0));
    }

    #[test]
    fn test_construct_and_comparator_lookup() {
        let registry = registry();
        assert_eq!(registry.construct(1), Some(icc()));
        assert!(registry.construct(2).is_none());

        let cmp = registry.comparator(0).unwrap();
        assert!(cmp(&[1, 2], &[1, 2]));
        assert!(!cmp(&[1, 2], &[1, 3]));
        assert!(registry.comparator(9).is_none());
    }

    #[test]
    fn test_max_payload_size() {
        assert_eq!(registry().max_payload_size(), ic().size().max(icc().size()));
        assert_eq!(AggregateRegistry::new().max_payload_size(), 0);
    }
}
