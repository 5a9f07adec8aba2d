//! Building blocks of the SQL run on the daily tables.
//!
//! Schemas, tables and field paths are interpolated into the statements, so they are
//! checked to be plain identifiers first. A field path addresses a sub-field of a composite
//! column with dots (`prec24.flag.wht`).
use regex::Regex;
use std::sync::OnceLock;

use crate::db::DbError;

fn identifier_path() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").ok())
        .as_ref()
}

fn is_identifier_path(text: &str) -> bool {
    identifier_path().is_some_and(|re| re.is_match(text))
}

/// A field path usable as an INSERT or SET target
pub fn field_path(path: &str) -> Result<&str, DbError> {
    if is_identifier_path(path) {
        Ok(path)
    } else {
        Err(DbError::InvalidIdentifier(path.to_string()))
    }
}

/// `schema.table`, both being single identifiers
pub fn qualified(schema: &str, table: &str) -> Result<String, DbError> {
    for name in [schema, table] {
        if !is_identifier_path(name) || name.contains('.') {
            return Err(DbError::InvalidIdentifier(name.to_string()));
        }
    }
    Ok(format!("{}.{}", schema, table))
}

/// Expression reading a field path of `source` (a column prefix such as `EXCLUDED.` or
/// `s.`, possibly empty): `((prec24).flag).wht`
pub fn read_expr(source: &str, path: &str) -> String {
    let mut parts = path.split('.');
    let mut expr = format!("{}{}", source, parts.next().unwrap_or_default());
    for part in parts {
        expr = format!("({}).{}", expr, part);
    }
    expr
}

/// Flag of an indicator field
pub fn flag_path(field: &str) -> String {
    format!("{}.flag.wht", field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_expr() {
        assert_eq!(read_expr("", "prec24"), "prec24");
        assert_eq!(read_expr("", "prec24.val_tot"), "(prec24).val_tot");
        assert_eq!(read_expr("", "prec24.flag.wht"), "((prec24).flag).wht");
        assert_eq!(
            read_expr("EXCLUDED.", "prec24.flag.ndati"),
            "((EXCLUDED.prec24).flag).ndati"
        );
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(
            qualified("dailypdbanpacarica", "ds__t200").unwrap(),
            "dailypdbanpacarica.ds__t200"
        );
        assert!(qualified("a.b", "ds__t200").is_err());
        assert!(qualified("x; DROP TABLE y", "ds__t200").is_err());
        assert_eq!(field_path("tmxgg.flag.wht").unwrap(), "tmxgg.flag.wht");
        assert!(field_path("tmxgg.val_md = 0 --").is_err());
        assert!(field_path("").is_err());
    }
}
