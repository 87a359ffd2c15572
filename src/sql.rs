//! SQL quoting helpers for catalog queries.
//!
//! The schema walk embeds schema and table names it read from the catalog
//! back into follow-up queries. These helpers keep those embeddings inert
//! by escape-doubling the delimiter.

/// Quote a string literal with single quotes, doubling embedded quotes.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quote an identifier with double quotes, doubling embedded quotes.
pub fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
