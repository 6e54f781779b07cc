use crate::{
    audience::build_predicate,
    catalog::{CatalogError, CatalogSnapshot},
    lowering::relational::push_audience_clause,
    models::{AccessContext, ContentItem, EntityRef, Group, Role},
};
use async_trait::async_trait;
use serde::Deserialize;
use sqlx::{FromRow, PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// ContentFilter
///
/// Business filters for content listing. They are unrelated to visibility and
/// are combined with the caller's audience filter by the repository.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct ContentFilter {
    /// Optional content kind (e.g. "article", "nav").
    pub kind: Option<String>,
    /// Optional case-insensitive title search.
    pub search: Option<String>,
}

/// CatalogRepository
///
/// Loads the role and group catalog from persistent storage. The engine only
/// ever sees the resulting immutable snapshot.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn load_catalog(&self) -> Result<CatalogSnapshot, CatalogError>;
}

/// ContentRepository
///
/// Lists content rows visible to a caller.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn list_content(
        &self,
        filter: ContentFilter,
        context: Option<&AccessContext>,
    ) -> Vec<ContentItem>;
}

/// ContentState
///
/// The shared content repository handle. Absent when no database is configured.
pub type ContentState = Arc<dyn ContentRepository>;

/// PostgresRepository
///
/// Catalog and content access backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct RoleRow {
    id: Uuid,
    slug: String,
    display_name: String,
    permissions: Vec<String>,
    is_system: bool,
}

#[derive(FromRow)]
struct GroupRow {
    id: Uuid,
    slug: String,
    display_name: String,
    role_ids: Vec<Uuid>,
}

#[async_trait]
impl CatalogRepository for PostgresRepository {
    /// load_catalog
    ///
    /// Reads every role and every group with its role ids. Group roles are
    /// stored as foreign keys, so they become id references.
    async fn load_catalog(&self) -> Result<CatalogSnapshot, CatalogError> {
        let roles = sqlx::query_as::<_, RoleRow>(
            r#"SELECT id, slug, display_name, permissions, is_system FROM roles ORDER BY slug"#,
        )
        .fetch_all(&self.pool)
        .await?;

        let groups = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT
                g.id, g.slug, g.display_name,
                COALESCE(array_agg(gr.role_id) FILTER (WHERE gr.role_id IS NOT NULL), '{}') AS role_ids
            FROM groups g
            LEFT JOIN group_roles gr ON gr.group_id = g.id
            GROUP BY g.id, g.slug, g.display_name
            ORDER BY g.slug
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        tracing::info!(
            roles = roles.len(),
            groups = groups.len(),
            "catalog loaded from database"
        );

        let roles = roles
            .into_iter()
            .map(|row| Role {
                id: row.id.to_string(),
                slug: row.slug,
                display_name: row.display_name,
                permissions: row.permissions.into_iter().collect(),
                is_system: row.is_system,
            })
            .collect();
        let groups = groups
            .into_iter()
            .map(|row| Group {
                id: row.id.to_string(),
                slug: row.slug,
                display_name: row.display_name,
                roles: row
                    .role_ids
                    .into_iter()
                    .map(|id| EntityRef::ById(id.to_string()))
                    .collect(),
            })
            .collect();

        CatalogSnapshot::new(roles, groups)
    }
}

#[async_trait]
impl ContentRepository for PostgresRepository {
    /// list_content
    ///
    /// Applies the business filters with bound parameters, then ANDs the
    /// caller's audience clause. Sysadmin gets no audience clause at all.
    async fn list_content(
        &self,
        filter: ContentFilter,
        context: Option<&AccessContext>,
    ) -> Vec<ContentItem> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            r#"
            SELECT
                c.id, c.kind, c.title, c.visibility,
                COALESCE(c.allow_role_ids, '{}') AS allow_role_ids,
                COALESCE(c.allow_role_slugs, '{}') AS allow_role_slugs,
                COALESCE(c.allow_group_ids, '{}') AS allow_group_ids,
                COALESCE(c.allow_group_slugs, '{}') AS allow_group_slugs
            FROM content c
            WHERE TRUE
            "#,
        );

        if let Some(kind) = filter.kind {
            builder.push(" AND c.kind = ");
            builder.push_bind(kind);
        }

        if let Some(search) = filter.search {
            builder.push(" AND c.title ILIKE ");
            builder.push_bind(format!("%{}%", search));
        }

        let audience = build_predicate("c", context);
        push_audience_clause(&mut builder, audience.as_ref());

        builder.push(" ORDER BY c.title ASC");

        match builder.build_query_as::<ContentItem>().fetch_all(&self.pool).await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!("list_content error: {:?}", e);
                vec![]
            }
        }
    }
}
