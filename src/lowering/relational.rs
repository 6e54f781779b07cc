use super::partition_refs;
use crate::{
    audience::{Comparison, Field, FieldPath, Operand, PredicateNode},
    models::EntityRef,
};
use serde_json::{Value, json};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

/// SqlParam
///
/// A value bound to one placeholder of a lowered fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Text(String),
    TextArray(Vec<String>),
    UuidArray(Vec<Uuid>),
}

impl SqlParam {
    pub fn to_json(&self) -> Value {
        match self {
            SqlParam::Text(text) => json!(text),
            SqlParam::TextArray(values) => json!(values),
            SqlParam::UuidArray(values) => json!(values),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Sql(String),
    Bind(SqlParam),
}

/// SqlFragment
///
/// A Postgres boolean expression with its bound values kept out of band.
/// It can be rendered with numbered placeholders or pushed into a `QueryBuilder`,
/// which numbers the binds itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlFragment {
    pieces: Vec<Piece>,
}

impl SqlFragment {
    fn sql(&mut self, sql: &str) -> &mut Self {
        match self.pieces.last_mut() {
            Some(Piece::Sql(text)) => text.push_str(sql),
            _ => self.pieces.push(Piece::Sql(sql.to_string())),
        }
        self
    }

    fn bind(&mut self, param: SqlParam) -> &mut Self {
        self.pieces.push(Piece::Bind(param));
        self
    }

    fn append(&mut self, other: SqlFragment) -> &mut Self {
        for piece in other.pieces {
            match piece {
                Piece::Sql(text) => self.sql(&text),
                Piece::Bind(param) => self.bind(param),
            };
        }
        self
    }

    /// render
    ///
    /// Produces the SQL text with placeholders `$first`, `$first+1`, ... and
    /// the values in placeholder order.
    pub fn render(&self, first_placeholder: usize) -> (String, Vec<SqlParam>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        for piece in &self.pieces {
            match piece {
                Piece::Sql(text) => sql.push_str(text),
                Piece::Bind(param) => {
                    sql.push_str(&format!("${}", first_placeholder + params.len()));
                    params.push(param.clone());
                }
            }
        }
        (sql, params)
    }

    pub fn push_to(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        for piece in &self.pieces {
            match piece {
                Piece::Sql(text) => {
                    builder.push(text);
                }
                Piece::Bind(SqlParam::Text(text)) => {
                    builder.push_bind(text.clone());
                }
                Piece::Bind(SqlParam::TextArray(values)) => {
                    builder.push_bind(values.clone());
                }
                Piece::Bind(SqlParam::UuidArray(values)) => {
                    builder.push_bind(values.clone());
                }
            }
        }
    }
}

/// to_sql_fragment
///
/// Lowers a predicate into a WHERE fragment over the `content` row layout:
/// a `visibility` text column and the audience split into `allow_*_ids`
/// (`uuid[]`) and `allow_*_slugs` (`text[]`) columns. The prefix is used as
/// the table alias. Every atom is two-valued, so NULL columns behave like the
/// missing fields of the document store.
pub fn to_sql_fragment(node: &PredicateNode) -> SqlFragment {
    let mut fragment = SqlFragment::default();
    match node {
        PredicateNode::And(nodes) => join(&mut fragment, nodes, " AND ", "TRUE"),
        PredicateNode::Or(nodes) => join(&mut fragment, nodes, " OR ", "FALSE"),
        PredicateNode::Not(node) => {
            fragment
                .sql("(NOT ")
                .append(to_sql_fragment(node))
                .sql(")");
        }
        PredicateNode::Never => {
            fragment.sql("FALSE");
        }
        PredicateNode::Leaf { path, op, value } => leaf(&mut fragment, path, *op, value),
    }
    fragment
}

fn join(fragment: &mut SqlFragment, nodes: &[PredicateNode], separator: &str, empty: &str) {
    if nodes.is_empty() {
        fragment.sql(empty);
        return;
    }
    fragment.sql("(");
    for (index, node) in nodes.iter().enumerate() {
        if index > 0 {
            fragment.sql(separator);
        }
        fragment.append(to_sql_fragment(node));
    }
    fragment.sql(")");
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column(prefix: &str, column: &str) -> String {
    prefix
        .split('.')
        .filter(|part| !part.is_empty())
        .chain(std::iter::once(column))
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

fn leaf(fragment: &mut SqlFragment, path: &FieldPath, op: Comparison, value: &Operand) {
    match (path.field, op, value) {
        (Field::Visibility, Comparison::Eq, Operand::Visibility(visibility)) => {
            fragment
                .sql(&column(&path.prefix, "visibility"))
                .sql(" IS NOT DISTINCT FROM ")
                .bind(SqlParam::Text(visibility.as_str().to_string()));
        }
        (Field::Visibility, Comparison::Ne, Operand::Visibility(visibility)) => {
            fragment
                .sql(&column(&path.prefix, "visibility"))
                .sql(" IS DISTINCT FROM ")
                .bind(SqlParam::Text(visibility.as_str().to_string()));
        }
        (Field::AllowRoles, Comparison::Overlaps, Operand::Refs(refs)) => {
            overlap(fragment, &path.prefix, "allow_role", refs);
        }
        (Field::AllowGroups, Comparison::Overlaps, Operand::Refs(refs)) => {
            overlap(fragment, &path.prefix, "allow_group", refs);
        }
        _ => {
            tracing::warn!(?path, ?op, "unsupported predicate leaf lowered to FALSE");
            fragment.sql("FALSE");
        }
    }
}

fn overlap(fragment: &mut SqlFragment, prefix: &str, stem: &str, refs: &[EntityRef]) {
    let (ids, slugs) = partition_refs(refs);
    let mut clauses = Vec::with_capacity(2);

    if !ids.is_empty() {
        let mut clause = SqlFragment::default();
        clause
            .sql("COALESCE(")
            .sql(&column(prefix, &format!("{stem}_ids")))
            .sql(" && ")
            .bind(SqlParam::UuidArray(ids))
            .sql(", FALSE)");
        clauses.push(clause);
    }
    if !slugs.is_empty() {
        let mut clause = SqlFragment::default();
        clause
            .sql("COALESCE(")
            .sql(&column(prefix, &format!("{stem}_slugs")))
            .sql(" && ")
            .bind(SqlParam::TextArray(slugs))
            .sql(", FALSE)");
        clauses.push(clause);
    }

    match clauses.len() {
        0 => {
            fragment.sql("FALSE");
        }
        1 => {
            fragment.append(clauses.remove(0));
        }
        _ => {
            fragment.sql("(");
            for (index, clause) in clauses.into_iter().enumerate() {
                if index > 0 {
                    fragment.sql(" OR ");
                }
                fragment.append(clause);
            }
            fragment.sql(")");
        }
    }
}

/// push_audience_clause
///
/// Appends ` AND <audience>` to a query whose WHERE clause is already open.
/// `None` (sysadmin) appends nothing.
pub fn push_audience_clause(
    builder: &mut QueryBuilder<'_, Postgres>,
    audience: Option<&PredicateNode>,
) {
    if let Some(audience) = audience {
        builder.push(" AND ");
        to_sql_fragment(audience).push_to(builder);
    }
}
