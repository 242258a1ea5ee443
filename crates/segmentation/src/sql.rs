//! Renders a compiled [`Predicate`] as a parameterized PostgreSQL `WHERE`
//! clause so a relational contact store runs the same shape the
//! in-memory store does. Parameter `$1` is always the organization id.

use chrono::{DateTime, Utc};
use std::ops::Bound;
use uuid::Uuid;

use crate::compiler::{Clause, Combinator, Predicate, TextMatch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Uuid(Uuid),
    UuidList(Vec<Uuid>),
    Text(String),
    Timestamp(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFilter {
    pub where_clause: String,
    pub params: Vec<SqlParam>,
}

impl SqlFilter {
    /// `SELECT count(*)` over the filter.
    pub fn count_query(&self, table: &str) -> String {
        format!("SELECT count(*) FROM {table} WHERE {}", self.where_clause)
    }

    /// Total and one page of member ids from a single statement, so both
    /// come from the same snapshot. Always yields exactly one row
    /// `(total, ids)`, even past the end of the membership. `LIMIT` and
    /// `OFFSET` are bound as the next two parameters.
    pub fn membership_query(&self, table: &str) -> String {
        let next = self.params.len() + 1;
        format!(
            "WITH matched AS (SELECT id FROM {table} WHERE {}) \
             SELECT (SELECT count(*) FROM matched) AS total, \
             ARRAY(SELECT id FROM matched ORDER BY id LIMIT ${} OFFSET ${}) AS ids",
            self.where_clause,
            next,
            next + 1
        )
    }
}

struct Renderer {
    params: Vec<SqlParam>,
}

impl Renderer {
    fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    fn clause(&mut self, clause: &Clause) -> String {
        match clause {
            Clause::Text {
                field,
                mode,
                needle,
            } => {
                let col = field.column;
                match mode {
                    TextMatch::Equals => {
                        let p = self.bind(SqlParam::Text(needle.clone()));
                        format!("lower({col}) = {p}")
                    }
                    TextMatch::Contains => {
                        let p = self.bind(SqlParam::Text(format!("%{}%", escape_like(needle))));
                        format!("lower({col}) LIKE {p}")
                    }
                    TextMatch::StartsWith => {
                        let p = self.bind(SqlParam::Text(format!("{}%", escape_like(needle))));
                        format!("lower({col}) LIKE {p}")
                    }
                    TextMatch::EndsWith => {
                        let p = self.bind(SqlParam::Text(format!("%{}", escape_like(needle))));
                        format!("lower({col}) LIKE {p}")
                    }
                }
            }
            Clause::NotEquals { field, needle } => {
                let col = field.column;
                let p = self.bind(SqlParam::Text(needle.clone()));
                format!("({col} IS NOT NULL AND lower({col}) <> {p})")
            }
            Clause::Timestamp {
                field,
                lower,
                upper,
            } => {
                let col = field.column;
                let mut parts = Vec::new();
                match lower {
                    Bound::Included(ts) => {
                        let p = self.bind(SqlParam::Timestamp(*ts));
                        parts.push(format!("{col} >= {p}"));
                    }
                    Bound::Excluded(ts) => {
                        let p = self.bind(SqlParam::Timestamp(*ts));
                        parts.push(format!("{col} > {p}"));
                    }
                    Bound::Unbounded => {}
                }
                match upper {
                    Bound::Included(ts) => {
                        let p = self.bind(SqlParam::Timestamp(*ts));
                        parts.push(format!("{col} <= {p}"));
                    }
                    Bound::Excluded(ts) => {
                        let p = self.bind(SqlParam::Timestamp(*ts));
                        parts.push(format!("{col} < {p}"));
                    }
                    Bound::Unbounded => {}
                }
                if parts.is_empty() {
                    format!("{col} IS NOT NULL")
                } else {
                    format!("({})", parts.join(" AND "))
                }
            }
            Clause::Members(ids) => {
                let p = self.bind(SqlParam::UuidList(ids.iter().copied().collect()));
                format!("id = ANY({p})")
            }
        }
    }
}

/// Escape `LIKE` metacharacters; relies on the default `\` escape.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

impl Predicate {
    pub fn to_sql(&self) -> SqlFilter {
        let mut r = Renderer { params: Vec::new() };
        let scope = r.bind(SqlParam::Uuid(self.organization_id().as_uuid()));
        let mut parts = vec![format!("organization_id = {scope}")];
        match self.combinator() {
            Combinator::All => {
                for clause in self.clauses() {
                    parts.push(r.clause(clause));
                }
            }
        }
        SqlFilter {
            where_clause: parts.join(" AND "),
            params: r.params,
        }
    }
}
