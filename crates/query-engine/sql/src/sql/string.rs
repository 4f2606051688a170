//! Type definitions of a low-level SQL string representation.

use super::ast::Value;

/// A SQL string with `?` placeholders, and the values bound to them in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SQL {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SQL {
    pub fn new() -> SQL {
        SQL {
            sql: String::new(),
            params: vec![],
        }
    }

    pub fn append_syntax(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// Append a double-quoted identifier.
    pub fn append_identifier(&mut self, identifier: &str) {
        self.sql.push('"');
        self.sql.push_str(&identifier.replace('"', "\"\""));
        self.sql.push('"');
    }

    /// Append a single-quoted string literal.
    pub fn append_string_literal(&mut self, literal: &str) {
        self.sql.push('\'');
        self.sql.push_str(&literal.replace('\'', "''"));
        self.sql.push('\'');
    }

    pub fn append_param(&mut self, param: Value) {
        self.sql.push('?');
        self.params.push(param);
    }

    /// Append a fragment that carries its own placeholders.
    pub fn append_fragment(&mut self, sql: &str, params: &[Value]) {
        self.sql.push_str(sql);
        self.params.extend_from_slice(params);
    }
}

/// Count the `?` placeholders of a raw fragment.
pub fn count_placeholders(sql: &str) -> usize {
    sql.matches('?').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_identifiers_and_literals() {
        let mut sql = SQL::new();
        sql.append_identifier("weird\"name");
        sql.append_syntax(" = ");
        sql.append_string_literal("O'Brien");
        assert_eq!(sql.sql, r#""weird""name" = 'O''Brien'"#);
        assert!(sql.params.is_empty());
    }

    #[test]
    fn params_follow_placeholders() {
        let mut sql = SQL::new();
        sql.append_param(Value::Int(1));
        sql.append_syntax(" AND ");
        sql.append_fragment("x BETWEEN ? AND ?", &[Value::Int(2), Value::Int(3)]);
        assert_eq!(sql.sql, "? AND x BETWEEN ? AND ?");
        assert_eq!(count_placeholders(&sql.sql), sql.params.len());
        assert_eq!(
            sql.params,
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }
}
