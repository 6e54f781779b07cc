use crate::models::{EntityRef, Group, GroupRef, Role, RoleRef};
use serde::Deserialize;
use std::{collections::HashMap, path::Path, sync::Arc};
use thiserror::Error;

/// CatalogError
///
/// Failures while loading a catalog at startup. Lookups themselves never fail.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to load catalog from database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("duplicate role {0}")]
    DuplicateRole(String),
    #[error("duplicate group {0}")]
    DuplicateGroup(String),
}

/// RoleCatalog
///
/// Read-only lookup of role definitions.
pub trait RoleCatalog: Send + Sync {
    fn role_by_id(&self, id: &str) -> Option<&Role>;
    fn role_by_slug(&self, slug: &str) -> Option<&Role>;

    /// Follows the id path or the slug path depending on the reference tag.
    fn resolve_role(&self, role: &RoleRef) -> Option<&Role> {
        match role {
            EntityRef::ById(id) => self.role_by_id(id),
            EntityRef::BySlug(slug) => self.role_by_slug(slug),
        }
    }
}

/// GroupCatalog
///
/// Read-only lookup of group definitions.
pub trait GroupCatalog: Send + Sync {
    fn group_by_id(&self, id: &str) -> Option<&Group>;
    fn group_by_slug(&self, slug: &str) -> Option<&Group>;

    fn resolve_group(&self, group: &GroupRef) -> Option<&Group> {
        match group {
            EntityRef::ById(id) => self.group_by_id(id),
            EntityRef::BySlug(slug) => self.group_by_slug(slug),
        }
    }
}

/// CatalogSnapshot
///
/// An immutable, indexed copy of every role and group. A snapshot is never
/// mutated after construction; reloading means building a new snapshot and
/// swapping the `Arc` that request handlers clone.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    roles: Vec<Role>,
    groups: Vec<Group>,
    role_by_id: HashMap<String, usize>,
    role_by_slug: HashMap<String, usize>,
    group_by_id: HashMap<String, usize>,
    group_by_slug: HashMap<String, usize>,
}

/// CatalogState
///
/// The shared catalog handle held in the application state.
pub type CatalogState = Arc<CatalogSnapshot>;

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    roles: Vec<Role>,
    #[serde(default)]
    groups: Vec<Group>,
}

impl CatalogSnapshot {
    /// new
    ///
    /// Indexes roles and groups by id and by slug. Ids and slugs must be unique
    /// within their kind.
    pub fn new(roles: Vec<Role>, groups: Vec<Group>) -> Result<Self, CatalogError> {
        let mut role_by_id = HashMap::with_capacity(roles.len());
        let mut role_by_slug = HashMap::with_capacity(roles.len());
        for (index, role) in roles.iter().enumerate() {
            if role_by_id.insert(role.id.clone(), index).is_some()
                || role_by_slug.insert(role.slug.clone(), index).is_some()
            {
                return Err(CatalogError::DuplicateRole(role.slug.clone()));
            }
        }

        let mut group_by_id = HashMap::with_capacity(groups.len());
        let mut group_by_slug = HashMap::with_capacity(groups.len());
        for (index, group) in groups.iter().enumerate() {
            if group_by_id.insert(group.id.clone(), index).is_some()
                || group_by_slug.insert(group.slug.clone(), index).is_some()
            {
                return Err(CatalogError::DuplicateGroup(group.slug.clone()));
            }
        }

        Ok(Self {
            roles,
            groups,
            role_by_id,
            role_by_slug,
            group_by_id,
            group_by_slug,
        })
    }

    /// Parses a `{"roles": [...], "groups": [...]}` document.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.roles, file.groups)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }
}

impl RoleCatalog for CatalogSnapshot {
    fn role_by_id(&self, id: &str) -> Option<&Role> {
        self.role_by_id.get(id).map(|&index| &self.roles[index])
    }

    fn role_by_slug(&self, slug: &str) -> Option<&Role> {
        self.role_by_slug.get(slug).map(|&index| &self.roles[index])
    }
}

impl GroupCatalog for CatalogSnapshot {
    fn group_by_id(&self, id: &str) -> Option<&Group> {
        self.group_by_id.get(id).map(|&index| &self.groups[index])
    }

    fn group_by_slug(&self, slug: &str) -> Option<&Group> {
        self.group_by_slug.get(slug).map(|&index| &self.groups[index])
    }
}
