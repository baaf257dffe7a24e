//! Structured statements.
//!
//! A [`Query`] is the shape of one operation. It renders to CQL text and
//! lists its bind slots in text order, so a session can bind values by
//! position without parsing anything.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::core::{ConsistencyLevel, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Insert,
    Update,
    Select,
    Delete,
    Increment,
    Decrement,
}

/// Value of a `USING` or `LIMIT` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Clause {
    Marker,
    Literal(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusteringColumn {
    pub name: String,
    pub reversed: bool,
}

/// Where each positional value of a statement goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindSlot {
    Column(String),
    Key(String),
    SliceStart(String),
    SliceEnd(String),
    Delta,
    Ttl,
    Timestamp,
    Limit,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    pub kind: QueryKind,
    pub table: String,
    pub partition_key: Vec<String>,
    pub clustering_key: Vec<ClusteringColumn>,
    /// Written, selected or incremented columns. An empty select list means `*`.
    pub columns: Vec<String>,
    /// Leading clustering columns restricted by equality.
    pub restricted_clustering: usize,
    pub slice_start: usize,
    pub slice_end: usize,
    pub ordering: Option<(String, SortDirection)>,
    pub limit: Option<Clause>,
    pub ttl: Option<Clause>,
    pub timestamp: Option<Clause>,
}

impl Query {
    fn new(
        kind: QueryKind,
        table: &str,
        partition_key: Vec<String>,
        clustering_key: Vec<ClusteringColumn>,
    ) -> Self {
        let restricted_clustering = clustering_key.len();
        Self {
            kind,
            table: table.to_string(),
            partition_key,
            clustering_key,
            columns: Vec::new(),
            restricted_clustering,
            slice_start: 0,
            slice_end: 0,
            ordering: None,
            limit: None,
            ttl: None,
            timestamp: None,
        }
    }

    pub fn insert(
        table: &str,
        partition_key: Vec<String>,
        clustering_key: Vec<ClusteringColumn>,
        columns: Vec<String>,
    ) -> Self {
        Self {
            columns,
            ..Self::new(QueryKind::Insert, table, partition_key, clustering_key)
        }
    }

    pub fn update(
        table: &str,
        partition_key: Vec<String>,
        clustering_key: Vec<ClusteringColumn>,
        columns: Vec<String>,
    ) -> Self {
        Self {
            columns,
            ..Self::new(QueryKind::Update, table, partition_key, clustering_key)
        }
    }

    pub fn select(
        table: &str,
        partition_key: Vec<String>,
        clustering_key: Vec<ClusteringColumn>,
        columns: Vec<String>,
    ) -> Self {
        Self {
            columns,
            ..Self::new(QueryKind::Select, table, partition_key, clustering_key)
        }
    }

    pub fn delete(
        table: &str,
        partition_key: Vec<String>,
        clustering_key: Vec<ClusteringColumn>,
    ) -> Self {
        Self::new(QueryKind::Delete, table, partition_key, clustering_key)
    }

    pub fn increment(
        table: &str,
        partition_key: Vec<String>,
        clustering_key: Vec<ClusteringColumn>,
        column: &str,
    ) -> Self {
        Self {
            columns: vec![column.to_string()],
            ..Self::new(QueryKind::Increment, table, partition_key, clustering_key)
        }
    }

    pub fn decrement(
        table: &str,
        partition_key: Vec<String>,
        clustering_key: Vec<ClusteringColumn>,
        column: &str,
    ) -> Self {
        Self {
            columns: vec![column.to_string()],
            ..Self::new(QueryKind::Decrement, table, partition_key, clustering_key)
        }
    }

    pub fn ttl(mut self, ttl: Clause) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn timestamp(mut self, timestamp: Clause) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Restrict only the partition plus the first `count` clustering columns.
    pub fn restrict_clustering(mut self, count: usize) -> Self {
        self.restricted_clustering = count.min(self.clustering_key.len());
        self
    }

    pub fn slice(mut self, start: usize, end: usize) -> Self {
        self.slice_start = start.min(self.clustering_key.len());
        self.slice_end = end.min(self.clustering_key.len());
        self
    }

    pub fn order_by(mut self, column: &str, direction: SortDirection) -> Self {
        self.ordering = Some((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: Clause) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_counter(&self) -> bool {
        matches!(self.kind, QueryKind::Increment | QueryKind::Decrement)
    }

    pub fn is_write(&self) -> bool {
        !matches!(self.kind, QueryKind::Select)
    }

    pub fn key_columns(&self) -> impl Iterator<Item = &str> {
        self.partition_key
            .iter()
            .map(String::as_str)
            .chain(self.clustering_key.iter().map(|c| c.name.as_str()))
    }

    fn where_columns(&self) -> impl Iterator<Item = &str> {
        self.partition_key.iter().map(String::as_str).chain(
            self.clustering_key
                .iter()
                .take(self.restricted_clustering)
                .map(|c| c.name.as_str()),
        )
    }

    fn using_slots(&self, slots: &mut Vec<BindSlot>) {
        if self.timestamp == Some(Clause::Marker) {
            slots.push(BindSlot::Timestamp);
        }
        if self.ttl == Some(Clause::Marker) {
            slots.push(BindSlot::Ttl);
        }
    }

    fn where_slots(&self, slots: &mut Vec<BindSlot>) {
        slots.extend(self.where_columns().map(|c| BindSlot::Key(c.to_string())));
        slots.extend(
            self.clustering_key
                .iter()
                .take(self.slice_start)
                .map(|c| BindSlot::SliceStart(c.name.clone())),
        );
        slots.extend(
            self.clustering_key
                .iter()
                .take(self.slice_end)
                .map(|c| BindSlot::SliceEnd(c.name.clone())),
        );
    }

    /// Bind slots in the order their markers appear in [`Query::to_cql`].
    pub fn bind_slots(&self) -> Vec<BindSlot> {
        let mut slots = Vec::new();
        match self.kind {
            QueryKind::Insert => {
                slots.extend(self.columns.iter().map(|c| BindSlot::Column(c.clone())));
                self.using_slots(&mut slots);
            }
            QueryKind::Update => {
                self.using_slots(&mut slots);
                slots.extend(self.columns.iter().map(|c| BindSlot::Column(c.clone())));
                self.where_slots(&mut slots);
            }
            QueryKind::Increment | QueryKind::Decrement => {
                slots.push(BindSlot::Delta);
                self.where_slots(&mut slots);
            }
            QueryKind::Select => {
                self.where_slots(&mut slots);
                if self.limit == Some(Clause::Marker) {
                    slots.push(BindSlot::Limit);
                }
            }
            QueryKind::Delete => {
                self.using_slots(&mut slots);
                self.where_slots(&mut slots);
            }
        }
        slots
    }

    pub fn to_cql(&self) -> String {
        let mut cql = String::new();
        match self.kind {
            QueryKind::Insert => {
                let markers = vec!["?"; self.columns.len()].join(",");
                let _ = write!(
                    cql,
                    "INSERT INTO {}({}) VALUES ({})",
                    self.table,
                    self.columns.join(","),
                    markers
                );
                self.render_using(&mut cql);
            }
            QueryKind::Update => {
                let _ = write!(cql, "UPDATE {}", self.table);
                self.render_using(&mut cql);
                let assignments = self
                    .columns
                    .iter()
                    .map(|c| format!("{}=?", c))
                    .collect::<Vec<_>>()
                    .join(",");
                let _ = write!(cql, " SET {}", assignments);
                self.render_where(&mut cql);
            }
            QueryKind::Increment | QueryKind::Decrement => {
                let column = self.columns.first().map(String::as_str).unwrap_or_default();
                let op = if self.kind == QueryKind::Increment { '+' } else { '-' };
                let _ = write!(
                    cql,
                    "UPDATE {} SET {}={}{}?",
                    self.table, column, column, op
                );
                self.render_where(&mut cql);
            }
            QueryKind::Select => {
                let columns = if self.columns.is_empty() {
                    "*".to_string()
                } else {
                    self.columns.join(",")
                };
                let _ = write!(cql, "SELECT {} FROM {}", columns, self.table);
                self.render_where(&mut cql);
                if let Some((column, direction)) = &self.ordering {
                    let direction = match direction {
                        SortDirection::Asc => "ASC",
                        SortDirection::Desc => "DESC",
                    };
                    let _ = write!(cql, " ORDER BY {} {}", column, direction);
                }
                match self.limit {
                    Some(Clause::Marker) => cql.push_str(" LIMIT ?"),
                    Some(Clause::Literal(limit)) => {
                        let _ = write!(cql, " LIMIT {}", limit);
                    }
                    None => {}
                }
            }
            QueryKind::Delete => {
                let _ = write!(cql, "DELETE FROM {}", self.table);
                self.render_using(&mut cql);
                self.render_where(&mut cql);
            }
        }
        cql.push(';');
        cql
    }

    fn render_using(&self, cql: &mut String) {
        let mut parts = Vec::new();
        if let Some(timestamp) = self.timestamp {
            parts.push(format!("TIMESTAMP {}", render_clause(timestamp)));
        }
        if let Some(ttl) = self.ttl {
            parts.push(format!("TTL {}", render_clause(ttl)));
        }
        if !parts.is_empty() {
            let _ = write!(cql, " USING {}", parts.join(" AND "));
        }
    }

    fn render_where(&self, cql: &mut String) {
        let mut conditions: Vec<String> =
            self.where_columns().map(|c| format!("{}=?", c)).collect();
        for (count, op) in [(self.slice_start, ">="), (self.slice_end, "<=")] {
            if count == 0 {
                continue;
            }
            let names = self
                .clustering_key
                .iter()
                .take(count)
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(",");
            let markers = vec!["?"; count].join(",");
            conditions.push(format!("({}){}({})", names, op, markers));
        }
        if !conditions.is_empty() {
            let _ = write!(cql, " WHERE {}", conditions.join(" AND "));
        }
    }
}

fn render_clause(clause: Clause) -> String {
    match clause {
        Clause::Marker => "?".to_string(),
        Clause::Literal(value) => value.to_string(),
    }
}

/// A query registered once with the session.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStatement {
    pub id: u64,
    pub query: Query,
    pub cql: String,
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    Bound(Arc<PreparedStatement>),
    /// Ad hoc statement, sent as text.
    Simple(Query),
}

/// A ready-to-execute statement with its values and consistency level.
#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub values: Vec<Value>,
    pub consistency: ConsistencyLevel,
    /// Client-side write timestamp in microseconds.
    pub timestamp: Option<i64>,
}

impl Statement {
    pub fn bound(
        prepared: Arc<PreparedStatement>,
        values: Vec<Value>,
        consistency: ConsistencyLevel,
    ) -> Self {
        Self {
            kind: StatementKind::Bound(prepared),
            values,
            consistency,
            timestamp: None,
        }
    }

    pub fn simple(query: Query, values: Vec<Value>, consistency: ConsistencyLevel) -> Self {
        Self {
            kind: StatementKind::Simple(query),
            values,
            consistency,
            timestamp: None,
        }
    }

    pub fn query(&self) -> &Query {
        match &self.kind {
            StatementKind::Bound(prepared) => &prepared.query,
            StatementKind::Simple(query) => query,
        }
    }

    pub fn cql(&self) -> String {
        match &self.kind {
            StatementKind::Bound(prepared) => prepared.cql.clone(),
            StatementKind::Simple(query) => query.to_cql(),
        }
    }

    pub fn is_prepared(&self) -> bool {
        matches!(self.kind, StatementKind::Bound(_))
    }

    pub fn is_counter(&self) -> bool {
        self.query().is_counter()
    }

    /// Copy of this statement stamped with a new write timestamp.
    pub fn with_timestamp(&self, timestamp: i64) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..self.clone()
        }
    }
}

/// Statements sent as one request.
#[derive(Debug, Clone)]
pub struct BatchStatement {
    pub statements: Vec<Statement>,
    pub consistency: ConsistencyLevel,
    pub counter: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> (Vec<String>, Vec<ClusteringColumn>) {
        (
            vec!["id".to_string()],
            vec![ClusteringColumn {
                name: "name".to_string(),
                reversed: false,
            }],
        )
    }

    #[test]
    fn test_prepared_insert_binds_ttl_last() {
        let (pk, ck) = key();
        let query = Query::insert(
            "users",
            pk,
            ck,
            vec!["id".to_string(), "name".to_string(), "age".to_string()],
        )
        .ttl(Clause::Marker);

        assert_eq!(
            query.to_cql(),
            "INSERT INTO users(id,name,age) VALUES (?,?,?) USING TTL ?;"
        );
        assert_eq!(query.bind_slots().last(), Some(&BindSlot::Ttl));
    }

    #[test]
    fn test_ad_hoc_update_renders_literals() {
        let (pk, ck) = key();
        let query = Query::update("users", pk, ck, vec!["age".to_string()])
            .timestamp(Clause::Literal(1000))
            .ttl(Clause::Literal(10));

        assert_eq!(
            query.to_cql(),
            "UPDATE users USING TIMESTAMP 1000 AND TTL 10 SET age=? WHERE id=? AND name=?;"
        );
        assert_eq!(
            query.bind_slots(),
            vec![
                BindSlot::Column("age".to_string()),
                BindSlot::Key("id".to_string()),
                BindSlot::Key("name".to_string()),
            ]
        );
    }

    #[test]
    fn test_slice_select() {
        let (pk, ck) = key();
        let query = Query::select("users", pk, ck, Vec::new())
            .restrict_clustering(0)
            .slice(1, 1)
            .order_by("name", SortDirection::Desc)
            .limit(Clause::Literal(10));

        assert_eq!(
            query.to_cql(),
            "SELECT * FROM users WHERE id=? AND (name)>=(?) AND (name)<=(?) ORDER BY name DESC LIMIT 10;"
        );
        assert_eq!(query.bind_slots().len(), 3);
    }

    #[test]
    fn test_counter_increment() {
        let query = Query::increment(
            "cqlmap_counters",
            vec!["fqcn".to_string(), "primary_key".to_string()],
            vec![ClusteringColumn {
                name: "property_name".to_string(),
                reversed: false,
            }],
            "counter_value",
        );
        assert_eq!(
            query.to_cql(),
            "UPDATE cqlmap_counters SET counter_value=counter_value+? WHERE fqcn=? AND primary_key=? AND property_name=?;"
        );
        assert_eq!(query.bind_slots()[0], BindSlot::Delta);
        assert!(query.is_counter());
    }
}
