//! SQL generation utilities.

use crate::filter::FilterValue;

const POSTGRES_RESERVED: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric",
    "authorization", "binary", "both", "case", "cast", "check", "collate", "column",
    "concurrently", "constraint", "create", "cross", "current_catalog", "current_date",
    "current_role", "current_schema", "current_time", "current_timestamp", "current_user",
    "default", "deferrable", "desc", "distinct", "do", "else", "end", "except", "false",
    "fetch", "for", "foreign", "freeze", "from", "full", "grant", "group", "having", "ilike",
    "in", "initially", "inner", "intersect", "into", "is", "isnull", "join", "lateral",
    "leading", "left", "like", "limit", "localtime", "localtimestamp", "natural", "not",
    "notnull", "null", "offset", "on", "only", "or", "order", "outer", "overlaps", "placing",
    "primary", "references", "returning", "right", "select", "session_user", "similar",
    "some", "symmetric", "table", "tablesample", "then", "to", "trailing", "true", "union",
    "unique", "user", "using", "variadic", "verbose", "when", "where", "window", "with",
];

const MYSQL_RESERVED: &[&str] = &[
    "accessible", "add", "all", "alter", "analyze", "and", "as", "asc", "before", "between",
    "bigint", "binary", "blob", "both", "by", "call", "cascade", "case", "change", "char",
    "character", "check", "collate", "column", "condition", "constraint", "continue",
    "convert", "create", "cross", "current_date", "current_time", "current_timestamp",
    "current_user", "cursor", "database", "databases", "dec", "decimal", "declare",
    "default", "delayed", "delete", "desc", "describe", "distinct", "div", "double", "drop",
    "dual", "each", "else", "elseif", "enclosed", "escaped", "exists", "exit", "explain",
    "false", "fetch", "float", "for", "force", "foreign", "from", "fulltext", "grant",
    "group", "groups", "having", "if", "ignore", "in", "index", "infile", "inner", "insert",
    "int", "integer", "interval", "into", "is", "iterate", "join", "key", "keys", "kill",
    "leading", "leave", "left", "like", "limit", "lines", "load", "lock", "long", "loop",
    "match", "mod", "natural", "not", "null", "numeric", "on", "option", "or", "order",
    "out", "outer", "partition", "precision", "primary", "procedure", "range", "rank",
    "read", "real", "references", "regexp", "release", "rename", "repeat", "replace",
    "require", "restrict", "return", "revoke", "right", "rlike", "row", "rows", "schema",
    "select", "set", "show", "signal", "smallint", "spatial", "sql", "ssl", "starting",
    "system", "table", "terminated", "then", "to", "trailing", "trigger", "true", "undo",
    "union", "unique", "unlock", "unsigned", "update", "usage", "use", "using", "values",
    "varchar", "when", "where", "while", "window", "with", "write", "xor", "zerofill",
];

const SQLITE_RESERVED: &[&str] = &[
    "abort", "action", "add", "after", "all", "alter", "analyze", "and", "as", "asc",
    "attach", "autoincrement", "before", "begin", "between", "by", "cascade", "case", "cast",
    "check", "collate", "column", "commit", "conflict", "constraint", "create", "cross",
    "current_date", "current_time", "current_timestamp", "database", "default", "deferrable",
    "deferred", "delete", "desc", "detach", "distinct", "drop", "each", "else", "end",
    "escape", "except", "exclusive", "exists", "explain", "fail", "for", "foreign", "from",
    "full", "glob", "group", "having", "if", "ignore", "immediate", "in", "index", "indexed",
    "initially", "inner", "insert", "instead", "intersect", "into", "is", "isnull", "join",
    "key", "left", "like", "limit", "match", "natural", "no", "not", "notnull", "null", "of",
    "offset", "on", "or", "order", "outer", "plan", "pragma", "primary", "query", "raise",
    "recursive", "references", "regexp", "reindex", "release", "rename", "replace",
    "restrict", "right", "rollback", "row", "savepoint", "select", "set", "table", "temp",
    "temporary", "then", "to", "transaction", "trigger", "union", "unique", "update",
    "using", "vacuum", "values", "view", "virtual", "when", "where", "with", "without",
];

/// Escape a string for use in SQL (for identifiers, not values).
pub fn escape_identifier(name: &str) -> String {
    let escaped = name.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Check if an identifier needs quoting.
pub fn needs_quoting(name: &str) -> bool {
    if POSTGRES_RESERVED.contains(&name.to_lowercase().as_str()) {
        return true;
    }

    !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Quote an identifier if needed.
pub fn quote_identifier(name: &str) -> String {
    if needs_quoting(name) {
        escape_identifier(name)
    } else {
        name.to_string()
    }
}

/// Make an alias safe for the given platform.
///
/// Names colliding with a reserved keyword get a `_` prefix. Without a known
/// platform nothing is considered reserved.
pub fn safe_name(name: &str, platform: Option<DatabaseType>) -> String {
    match platform {
        Some(db) if db.is_reserved_keyword(name) => format!("_{}", name),
        _ => name.to_string(),
    }
}

/// Build a parameter placeholder for a given database type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatabaseType {
    /// PostgreSQL uses $1, $2, etc.
    #[default]
    PostgreSQL,
    /// MySQL uses ?, ?, etc.
    MySQL,
    /// SQLite uses ?, ?, etc.
    SQLite,
}

impl DatabaseType {
    /// Get the parameter placeholder for this database type.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::PostgreSQL => format!("${}", index),
            Self::MySQL | Self::SQLite => "?".to_string(),
        }
    }

    /// Reserved keywords of this platform, lowercase.
    pub fn reserved_keywords(&self) -> &'static [&'static str] {
        match self {
            Self::PostgreSQL => POSTGRES_RESERVED,
            Self::MySQL => MYSQL_RESERVED,
            Self::SQLite => SQLITE_RESERVED,
        }
    }

    /// Check if a name is a reserved keyword on this platform.
    pub fn is_reserved_keyword(&self, name: &str) -> bool {
        self.reserved_keywords()
            .contains(&name.to_lowercase().as_str())
    }

    /// Quote an identifier for this platform.
    ///
    /// MySQL identifiers are always backtick quoted, others only when needed.
    pub fn quote(&self, name: &str) -> String {
        match self {
            Self::MySQL => format!("`{}`", name.replace('`', "``")),
            Self::PostgreSQL | Self::SQLite => quote_identifier(name),
        }
    }
}

/// A SQL builder for constructing queries.
#[derive(Debug, Clone)]
pub struct SqlBuilder {
    db_type: DatabaseType,
    parts: Vec<String>,
    params: Vec<FilterValue>,
}

impl SqlBuilder {
    /// Create a new SQL builder.
    pub fn new(db_type: DatabaseType) -> Self {
        Self {
            db_type,
            parts: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Create a PostgreSQL SQL builder.
    pub fn postgres() -> Self {
        Self::new(DatabaseType::PostgreSQL)
    }

    /// Create a MySQL SQL builder.
    pub fn mysql() -> Self {
        Self::new(DatabaseType::MySQL)
    }

    /// Create a SQLite SQL builder.
    pub fn sqlite() -> Self {
        Self::new(DatabaseType::SQLite)
    }

    /// The dialect this builder renders for.
    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    /// Push a literal SQL string.
    pub fn push(&mut self, sql: impl AsRef<str>) -> &mut Self {
        self.parts.push(sql.as_ref().to_string());
        self
    }

    /// Push a parameter placeholder and record its value.
    pub fn push_param(&mut self, value: impl Into<FilterValue>) -> &mut Self {
        let index = self.params.len() + 1;
        self.parts.push(self.db_type.placeholder(index));
        self.params.push(value.into());
        self
    }

    /// Push an identifier, quoted for the dialect.
    pub fn push_identifier(&mut self, name: &str) -> &mut Self {
        let quoted = self.db_type.quote(name);
        self.parts.push(quoted);
        self
    }

    /// Build the final SQL string and parameters.
    pub fn build(self) -> (String, Vec<FilterValue>) {
        (self.parts.join(""), self.params)
    }

    /// Get the current SQL string (without consuming).
    pub fn sql(&self) -> String {
        self.parts.join("")
    }

    /// Get the current parameters.
    pub fn params(&self) -> &[FilterValue] {
        &self.params
    }
}

impl Default for SqlBuilder {
    fn default() -> Self {
        Self::postgres()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("user"), "\"user\"");
        assert_eq!(escape_identifier("has\"quote"), "\"has\"\"quote\"");
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("user"), "\"user\"");
        assert_eq!(quote_identifier("my_table"), "my_table");
        assert_eq!(quote_identifier("createdAt"), "\"createdAt\"");
    }

    #[test]
    fn test_safe_name() {
        assert_eq!(safe_name("order", Some(DatabaseType::PostgreSQL)), "_order");
        assert_eq!(safe_name("user", Some(DatabaseType::PostgreSQL)), "_user");
        assert_eq!(safe_name("user", Some(DatabaseType::SQLite)), "user");
        assert_eq!(safe_name("post", Some(DatabaseType::MySQL)), "post");
        assert_eq!(safe_name("order", None), "order");
    }

    #[test]
    fn test_database_placeholder() {
        assert_eq!(DatabaseType::PostgreSQL.placeholder(5), "$5");
        assert_eq!(DatabaseType::MySQL.placeholder(1), "?");
    }

    #[test]
    fn test_platform_quote() {
        assert_eq!(DatabaseType::MySQL.quote("order"), "`order`");
        assert_eq!(DatabaseType::PostgreSQL.quote("createdBy"), "\"createdBy\"");
        assert_eq!(DatabaseType::PostgreSQL.quote("created_at"), "created_at");
        assert_eq!(DatabaseType::SQLite.quote("post.title"), "\"post.title\"");
    }

    #[test]
    fn test_sql_builder() {
        let mut builder = SqlBuilder::postgres();
        builder
            .push("SELECT * FROM ")
            .push_identifier("user")
            .push(" WHERE ")
            .push_identifier("id")
            .push(" = ")
            .push_param(42i32);

        let (sql, params) = builder.build();
        assert_eq!(sql, "SELECT * FROM \"user\" WHERE id = $1");
        assert_eq!(params.len(), 1);
    }
}
