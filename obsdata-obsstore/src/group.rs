//! Path-addressed group hierarchy.
//!
//! Paths are `/`-separated and relative to the group they are resolved from. Leading and
//! repeated separators are ignored, so an empty path names the group itself.

use crate::obs_store::{Group, GroupId, ObsStore};

use anyhow::Result;
use log::debug;
use obsdata::{ObjectKind, ObjectType, ObsError};
use std::collections::BTreeMap;

/// Splits off the first path segment: `"a/b/c"` becomes `("a", Some("b/c"))`.
pub(crate) fn split_first_level(path: &str) -> (&str, Option<&str>) {
    let path = path.trim_start_matches('/');
    match path.split_once('/') {
        Some((first, rest)) => (first, Some(rest)),
        None => (path, None),
    }
}

/// Splits a variable path into its group path and variable name at the last `/`.
pub(crate) fn split_group_var(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('/') {
        Some((group, var)) => (Some(group), var),
        None => (None, path),
    }
}

impl ObsStore {
    /// Create the group at `path` below `parent`, along with any missing intermediate
    /// groups. Existing groups are reused.
    pub fn create_group(&mut self, parent: GroupId, path: &str) -> Result<GroupId> {
        let (first, rest) = split_first_level(path);
        if first.is_empty() {
            self.group(parent)?;
            return Ok(parent);
        }
        let existing = self.group(parent)?.children.get(first).copied();
        let child = match existing {
            Some(child) => child,
            None => {
                let child = self.insert_group(Group::new(Some(parent)));
                self.group_mut(parent)?
                    .children
                    .insert(first.to_string(), child);
                debug!("created group '{}' in {}", first, self.group_path(parent)?);
                child
            }
        };
        match rest {
            Some(rest) => self.create_group(child, rest),
            None => Ok(child),
        }
    }

    /// Resolve `path` below `parent` without creating anything.
    pub fn find_group(&self, parent: GroupId, path: &str) -> Result<Option<GroupId>> {
        let group = self.group(parent)?;
        let (first, rest) = split_first_level(path);
        if first.is_empty() {
            return Ok(Some(parent));
        }
        match (group.children.get(first), rest) {
            (Some(&child), Some(rest)) => self.find_group(child, rest),
            (Some(&child), None) => Ok(Some(child)),
            (None, _) => Ok(None),
        }
    }

    pub fn open_group(&self, parent: GroupId, path: &str) -> Result<GroupId> {
        self.find_group(parent, path)?
            .ok_or_else(|| ObsError::not_found(ObjectKind::Group, path).into())
    }

    pub fn group_exists(&self, parent: GroupId, path: &str) -> Result<bool> {
        Ok(self.find_group(parent, path)?.is_some())
    }

    /// Names of the groups and variables below `id`, partitioned by kind. With `recurse`,
    /// the whole subtree is listed and names carry their path relative to `id`.
    pub fn list_objects(
        &self,
        id: GroupId,
        filter: Option<ObjectType>,
        recurse: bool,
    ) -> Result<BTreeMap<ObjectType, Vec<String>>> {
        let mut objects = BTreeMap::new();
        for kind in [ObjectType::Group, ObjectType::Variable] {
            if filter.map_or(true, |f| f == kind) {
                objects.insert(kind, Vec::new());
            }
        }
        self.collect_objects(id, recurse, "", &mut objects)?;
        Ok(objects)
    }

    fn collect_objects(
        &self,
        id: GroupId,
        recurse: bool,
        prefix: &str,
        objects: &mut BTreeMap<ObjectType, Vec<String>>,
    ) -> Result<()> {
        let group = self.group(id)?;
        if let Some(vars) = objects.get_mut(&ObjectType::Variable) {
            vars.extend(group.vars.names().map(|name| format!("{}{}", prefix, name)));
        }
        for (name, &child) in group.children.iter() {
            if let Some(groups) = objects.get_mut(&ObjectType::Group) {
                groups.push(format!("{}{}", prefix, name));
            }
            if recurse {
                self.collect_objects(child, recurse, &format!("{}{}/", prefix, name), objects)?;
            }
        }
        Ok(())
    }
}
