//! Placeholder translation between SQL dialects.
//!
//! Queries throughout the crate are written with ordinal `?` markers. SQLite
//! accepts them natively; PostgreSQL expects numbered `$1, $2, ...` markers.

use std::borrow::Cow;
use std::fmt;

/// SQL dialect spoken by the active backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Embedded single-file engine (SQLite).
    Embedded,
    /// Networked relational server (PostgreSQL).
    Networked,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Embedded => write!(f, "sqlite"),
            Dialect::Networked => write!(f, "postgresql"),
        }
    }
}

/// Rewrite `sql` so its parameter markers suit `dialect`.
///
/// Every `?` is treated as a marker; the SQL itself is never parsed, so a `?`
/// inside a string literal is rewritten too. Callers bind such values as
/// parameters instead of inlining them.
pub fn translate(sql: &str, dialect: Dialect) -> Cow<'_, str> {
    match dialect {
        Dialect::Embedded => Cow::Borrowed(sql),
        Dialect::Networked => {
            if !sql.contains('?') {
                return Cow::Borrowed(sql);
            }

            let mut out = String::with_capacity(sql.len() + 8);
            let mut index = 0usize;
            for ch in sql.chars() {
                if ch == '?' {
                    index += 1;
                    out.push('$');
                    out.push_str(&index.to_string());
                } else {
                    out.push(ch);
                }
            }
            Cow::Owned(out)
        }
    }
}
