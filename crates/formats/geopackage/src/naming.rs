//! Table name validation rules for GeoPackage containers.
//!
//! Names are made legal first (character set, leading digit, reserved
//! prefixes, SQL keywords, length) and then made unique against the names
//! already taken in the container.

/// Maximum length of a table name, in characters.
pub const MAX_TABLE_NAME_LEN: usize = 160;

/// Prefixes reserved for GeoPackage and SQLite metadata tables.
const RESERVED_PREFIXES: &[&str] = &["gpkg_", "sqlite_", "rtree_"];

/// SQLite keywords. Table names matching one of these get an `_` suffix.
const SQL_KEYWORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS", "ASC",
    "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST",
    "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS",
    "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT",
    "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH",
    "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL",
    "FILTER", "FIRST", "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB",
    "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED",
    "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN",
    "KEY", "LAST", "LEFT", "LIKE", "LIMIT", "MATCH", "MATERIALIZED", "NATURAL", "NO", "NOT",
    "NOTHING", "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "OR", "ORDER", "OTHERS",
    "OUTER", "OVER", "PARTITION", "PLAN", "PRAGMA", "PRECEDING", "PRIMARY", "QUERY", "RAISE",
    "RANGE", "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE", "RENAME", "REPLACE",
    "RESTRICT", "RETURNING", "RIGHT", "ROLLBACK", "ROW", "ROWS", "SAVEPOINT", "SELECT", "SET",
    "TABLE", "TEMP", "TEMPORARY", "THEN", "TIES", "TO", "TRANSACTION", "TRIGGER", "UNBOUNDED",
    "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN",
    "WHERE", "WINDOW", "WITH", "WITHOUT",
];

/// Returns `true` if `name` is an SQLite keyword (case-insensitive).
#[must_use]
pub fn is_sql_keyword(name: &str) -> bool {
    SQL_KEYWORDS
        .iter()
        .any(|keyword| keyword.eq_ignore_ascii_case(name))
}

/// Makes a candidate identifier legal as a GeoPackage table name.
///
/// A name that is already legal is returned unchanged.
///
/// ```
/// use arcrest_geopackage::naming::legalize_table_name;
///
/// assert_eq!(legalize_table_name("Parcels"), "Parcels");
/// assert_eq!(legalize_table_name("2020_Census"), "T2020_Census");
/// assert_eq!(legalize_table_name("select"), "select_");
/// ```
#[must_use]
pub fn legalize_table_name(candidate: &str) -> String {
    let mut name: String = candidate
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if name.is_empty() {
        name.push('T');
    }
    if name.starts_with(|c: char| c.is_numeric()) {
        name.insert(0, 'T');
    }

    let lower = name.to_lowercase();
    if RESERVED_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
    {
        name.insert_str(0, "T_");
    }
    if is_sql_keyword(&name) {
        name.push('_');
    }

    truncate_chars(&name, MAX_TABLE_NAME_LEN)
}

/// Makes a legal name unique by appending `_1`, `_2`, ... until `is_taken`
/// rejects it no longer. The base is shortened so the suffixed name still
/// fits [`MAX_TABLE_NAME_LEN`].
#[must_use]
pub fn unique_table_name(legal: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(legal) {
        return legal.to_string();
    }

    let mut counter = 1usize;
    loop {
        let suffix = format!("_{counter}");
        let base = truncate_chars(legal, MAX_TABLE_NAME_LEN - suffix.len());
        let candidate = format!("{base}{suffix}");
        if !is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

fn truncate_chars(name: &str, max: usize) -> String {
    name.chars().take(max).collect()
}
