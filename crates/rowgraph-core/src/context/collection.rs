use crate::{
    context::{CollectionKey, FieldValue, LoadingClaim},
    model::CollectionSemantics,
};
use std::collections::HashSet;

///
/// PersistentCollection
///
/// Collection owned by one entity for one role. List elements sit at their
/// index column position; unpopulated list positions are skipped on reads.
///

#[derive(Clone, Debug)]
pub struct PersistentCollection {
    pub key: CollectionKey,
    pub semantics: CollectionSemantics,
    pub initialized: bool,
    elements: Vec<Option<FieldValue>>,
    // de-duplicated elements appended without an index
    seen: HashSet<FieldValue>,
    pub(crate) claim: Option<LoadingClaim>,
}

impl PersistentCollection {
    pub(crate) fn new(key: CollectionKey, semantics: CollectionSemantics) -> Self {
        Self {
            key,
            semantics,
            initialized: false,
            elements: Vec::new(),
            seen: HashSet::new(),
            claim: None,
        }
    }

    /// Present elements in order.
    pub fn elements(&self) -> impl Iterator<Item = &FieldValue> {
        self.elements.iter().flatten()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at a list position.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&FieldValue> {
        self.elements.get(index).and_then(Option::as_ref)
    }

    pub(crate) fn clear(&mut self) {
        self.elements.clear();
        self.seen.clear();
    }

    // Entity elements are de-duplicated by identity for every semantics,
    // since joins on other collections repeat them across rows.
    pub(crate) fn add(&mut self, element: FieldValue, index: Option<usize>) -> ElementAdd {
        if let Some(index) = index {
            return self.place(element, index);
        }

        let dedupe = match &self.semantics {
            CollectionSemantics::Set => true,
            CollectionSemantics::Bag | CollectionSemantics::List { .. } => {
                matches!(element, FieldValue::Entity(_))
            }
        };
        if dedupe && !self.seen.insert(element.clone()) {
            return ElementAdd::Duplicate;
        }

        self.elements.push(Some(element));
        ElementAdd::Added
    }

    fn place(&mut self, element: FieldValue, index: usize) -> ElementAdd {
        if self.elements.len() <= index {
            self.elements.resize(index + 1, None);
        }

        match &self.elements[index] {
            Some(existing) if *existing == element => ElementAdd::Duplicate,
            Some(_) => ElementAdd::IndexConflict,
            None => {
                self.elements[index] = Some(element);
                ElementAdd::Added
            }
        }
    }
}

///
/// CollectionClaim
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CollectionClaim {
    /// Newly created or previously lazy; the caller populates it.
    Claimed,
    /// Already claimed by the same initializer of the same execution.
    Owned,
    LoadingByOther,
    Initialized,
}

impl CollectionClaim {
    #[must_use]
    pub const fn must_populate(self) -> bool {
        matches!(self, Self::Claimed | Self::Owned)
    }
}

///
/// ElementAdd
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ElementAdd {
    Added,
    /// Equal element already present; repeated rows are expected.
    Duplicate,
    /// A different element already sits at the list index.
    IndexConflict,
}
