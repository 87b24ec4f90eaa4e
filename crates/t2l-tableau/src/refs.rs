//! Pest-based parser for bracketed references

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::parser::ParseError;

#[derive(Parser)]
#[grammar = "refs.pest"]
pub struct RefParser;

/// `[datasource].[name]` as used on shelves and in pane encodings
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedRef {
    pub datasource: String,
    pub name: String,
}

impl QualifiedRef {
    pub fn new(datasource: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            datasource: datasource.into(),
            name: name.into(),
        }
    }
}

/// Parse a dotted path like `[dbo].[Orders]` into its segments.
pub fn parse_path(source: &str) -> Result<Vec<String>, ParseError> {
    let mut pairs = RefParser::parse(Rule::table_ref, source.trim())?;
    let table_ref = pairs
        .next()
        .ok_or_else(|| ParseError::Syntax(format!("Empty reference: {source}")))?;

    let mut segments = Vec::new();
    for pair in table_ref.into_inner() {
        if pair.as_rule() == Rule::path {
            segments.extend(pair.into_inner().map(bracketed_name));
        }
    }
    Ok(segments)
}

/// Parse a single `[datasource].[name]` reference.
pub fn parse_qualified(source: &str) -> Result<QualifiedRef, ParseError> {
    match parse_path(source)?.as_slice() {
        [datasource, name] => Ok(QualifiedRef::new(datasource.as_str(), name.as_str())),
        _ => Err(ParseError::Syntax(format!("Expected [datasource].[name], got {source}"))),
    }
}

/// Every `[datasource].[name]` pair embedded in a shelf expression, in order.
pub fn parse_shelf(source: &str) -> Result<Vec<QualifiedRef>, ParseError> {
    let mut pairs = RefParser::parse(Rule::shelf, source)?;
    let Some(shelf) = pairs.next() else {
        return Ok(Vec::new());
    };

    let mut refs = Vec::new();
    for item in shelf.into_inner() {
        if item.as_rule() != Rule::shelf_item {
            continue;
        }
        let mut parts = item.into_inner().map(bracketed_name);
        if let (Some(datasource), Some(name)) = (parts.next(), parts.next()) {
            refs.push(QualifiedRef { datasource, name });
        }
    }
    Ok(refs)
}

fn bracketed_name(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|name| name.as_str().replace("]]", "]"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_path() {
        assert_eq!(parse_path("[dbo].[Orders]").unwrap(), vec!["dbo", "Orders"]);
        assert_eq!(parse_path("[Orders$]").unwrap(), vec!["Orders$"]);
    }

    #[test]
    fn test_escaped_bracket() {
        assert_eq!(parse_path("[a]]b].[c]").unwrap(), vec!["a]b", "c"]);
    }

    #[test]
    fn test_unbracketed_is_error() {
        assert!(parse_path("Orders").is_err());
    }

    #[test]
    fn test_qualified() {
        let r = parse_qualified("[federated.0abc].[sum:Sales:qk]").unwrap();
        assert_eq!(r, QualifiedRef::new("federated.0abc", "sum:Sales:qk"));
        assert!(parse_qualified("[only]").is_err());
    }

    #[test]
    fn test_shelf_expression() {
        let refs = parse_shelf("([ds].[sum:Sales:qk] / [ds].[none:Region:nk])").unwrap();
        assert_eq!(
            refs,
            vec![
                QualifiedRef::new("ds", "sum:Sales:qk"),
                QualifiedRef::new("ds", "none:Region:nk"),
            ]
        );
        assert!(parse_shelf("").unwrap().is_empty());
    }
}
