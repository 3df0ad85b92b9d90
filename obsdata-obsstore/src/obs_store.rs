use crate::attributes::HasAttributes;
use crate::variables::{HasVariables, Variable};

use anyhow::Result;
use indexmap::IndexMap;
use itertools::Itertools;
use obsdata::{ObjectKind, ObsError};
use std::fmt::{Display, Formatter};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct Key {
    index: usize,
    generation: u32,
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Handle of a group in an [`ObsStore`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct GroupId(Key);

/// Handle of a variable in an [`ObsStore`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VarId(Key);

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

impl Display for VarId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "variable#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage with reuse. A key stays valid until its value is removed; a reused slot
/// gets a new generation so old keys no longer resolve.
#[derive(Debug, Clone)]
struct Slab<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> Slab<T> {
    fn insert(&mut self, value: T) -> Key {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.generation = slot.generation.wrapping_add(1);
                slot.value = Some(value);
                Key {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    value: Some(value),
                });
                Key {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    fn get(&self, key: Key) -> Option<&T> {
        self.slots
            .get(key.index)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        self.slots
            .get_mut(key.index)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    fn remove(&mut self, key: Key) -> Option<T> {
        let value = self
            .slots
            .get_mut(key.index)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.take())?;
        self.free.push(key.index);
        Some(value)
    }

    fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

/// A node of the group tree.
#[derive(Debug, Clone, Default)]
pub struct Group {
    parent: Option<GroupId>,
    pub(crate) children: IndexMap<String, GroupId>,
    pub(crate) vars: HasVariables,
    pub atts: HasAttributes,
}

impl Group {
    pub(crate) fn new(parent: Option<GroupId>) -> Self {
        Self {
            parent,
            ..Default::default()
        }
    }

    /// The enclosing group; `None` for the root.
    pub fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }
}

/// The in-memory engine's object tree. Groups and variables live in slabs and refer to each
/// other through handles.
#[derive(Debug, Clone)]
pub struct ObsStore {
    groups: Slab<Group>,
    variables: Slab<Variable>,
    root: GroupId,
}

impl Default for ObsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObsStore {
    /// A tree holding only an empty root group.
    pub fn new() -> Self {
        let mut groups = Slab::default();
        let root = GroupId(groups.insert(Group::new(None)));
        Self {
            groups,
            variables: Slab::default(),
            root,
        }
    }

    pub fn root(&self) -> GroupId {
        self.root
    }

    pub fn group(&self, id: GroupId) -> Result<&Group> {
        self.groups
            .get(id.0)
            .ok_or_else(|| ObsError::not_found(ObjectKind::Group, id.to_string()).into())
    }

    pub fn group_mut(&mut self, id: GroupId) -> Result<&mut Group> {
        self.groups
            .get_mut(id.0)
            .ok_or_else(|| ObsError::not_found(ObjectKind::Group, id.to_string()).into())
    }

    pub fn variable(&self, id: VarId) -> Result<&Variable> {
        self.variables
            .get(id.0)
            .ok_or_else(|| ObsError::not_found(ObjectKind::Variable, id.to_string()).into())
    }

    pub fn variable_mut(&mut self, id: VarId) -> Result<&mut Variable> {
        self.variables
            .get_mut(id.0)
            .ok_or_else(|| ObsError::not_found(ObjectKind::Variable, id.to_string()).into())
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// The `/`-separated path of a group from the root; the root itself is `/`.
    pub fn group_path(&self, id: GroupId) -> Result<String> {
        let mut segments = Vec::new();
        let mut current = id;
        while let Some(parent) = self.group(current)?.parent {
            let name = self
                .group(parent)?
                .children
                .iter()
                .find_map(|(name, &child)| (child == current).then_some(name.as_str()))
                .unwrap_or_default();
            segments.push(name);
            current = parent;
        }
        Ok(format!("/{}", segments.iter().rev().join("/")))
    }

    pub(crate) fn insert_group(&mut self, group: Group) -> GroupId {
        GroupId(self.groups.insert(group))
    }

    pub(crate) fn insert_variable(&mut self, variable: Variable) -> VarId {
        VarId(self.variables.insert(variable))
    }

    pub(crate) fn take_variable(&mut self, id: VarId) -> Option<Variable> {
        self.variables.remove(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obsdata::error_kind;

    #[test]
    fn test_slab_generations() {
        let mut slab = Slab::default();
        let a = slab.insert("a");
        let b = slab.insert("b");
        assert_eq!(slab.remove(a), Some("a"));
        assert_eq!(slab.get(a), None);
        assert_eq!(slab.remove(a), None);

        let c = slab.insert("c");
        assert_eq!(c.index, a.index);
        assert_ne!(c.generation, a.generation);
        assert_eq!(slab.get(a), None);
        assert_eq!(slab.get(c), Some(&"c"));
        assert_eq!(slab.get(b), Some(&"b"));
        assert_eq!(slab.len(), 2);
    }

    #[test]
    fn test_root_and_paths() -> Result<()> {
        let mut store = ObsStore::new();
        let root = store.root();
        assert!(store.group(root)?.parent().is_none());
        let c = store.create_group(root, "a/b/c")?;
        assert_eq!(store.group_path(c)?, "/a/b/c");
        assert_eq!(store.group_path(root)?, "/");
        assert_eq!(store.num_groups(), 4);
        Ok(())
    }

    #[test]
    fn test_stale_handle() {
        let store = ObsStore::new();
        let stale = GroupId(Key {
            index: 0,
            generation: 7,
        });
        let err = store.group(stale).unwrap_err();
        assert!(matches!(error_kind(&err), Some(ObsError::NotFound { .. })));
    }
}
