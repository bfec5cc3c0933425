//! The restricted JSON-Logic filter language.
//!
//! Accepted forms:
//!
//! ```json
//! {"==": [{"var": "Bill Status"}, "<option id>"]}
//! {"!=": [{"var": "Name"}, null]}
//! {"<":  [{"var": "Total Cost"}, 100]}
//! {">=": [{"var": "Invoice Date"}, "2024-01-01"]}
//! {"and": [<expr>, ...]}
//! ```
//!
//! A `var` names a Field by its Schema name. Anything else is rejected.

use super::QueryError;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value as Json;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gte,
}

impl CompareOp {
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            ">=" => Some(CompareOp::Gte),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gte => ">=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(Decimal),
    Boolean(bool),
    Null,
}

impl Literal {
    fn parse(json: &Json) -> Result<Self, QueryError> {
        match json {
            Json::String(s) => Ok(Literal::String(s.clone())),
            Json::Bool(b) => Ok(Literal::Boolean(*b)),
            Json::Null => Ok(Literal::Null),
            Json::Number(n) => {
                let text = n.to_string();
                Decimal::from_str(&text)
                    .or_else(|_| Decimal::from_scientific(&text))
                    .map(Literal::Number)
                    .map_err(|_| QueryError::Malformed(format!("number {text} is out of range")))
            }
            other => Err(QueryError::Malformed(format!("expected a literal, got {other}"))),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "{s:?}"),
            Literal::Number(n) => write!(f, "{n}"),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Null => f.write_str("null"),
        }
    }
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonLogic {
    Compare { op: CompareOp, var: String, literal: Literal },
    And(Vec<JsonLogic>),
}

impl JsonLogic {
    /// Parses a filter expression.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnsupportedOperator`] for operators outside the
    /// accepted set and [`QueryError::Malformed`] for any other shape error.
    pub fn parse(json: &Json) -> Result<Self, QueryError> {
        let object = json
            .as_object()
            .ok_or_else(|| QueryError::Malformed(format!("expected an object, got {json}")))?;
        let mut entries = object.iter();
        let (op, args) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(QueryError::Malformed(
                    "an expression must have exactly one operator".to_string(),
                ))
            }
        };
        let args = args
            .as_array()
            .ok_or_else(|| QueryError::Malformed(format!("arguments of {op:?} must be an array")))?;

        if op == "and" {
            return args.iter().map(JsonLogic::parse).collect::<Result<_, _>>().map(JsonLogic::And);
        }

        let op = CompareOp::parse(op).ok_or_else(|| QueryError::UnsupportedOperator(op.clone()))?;
        let [var, literal] = args.as_slice() else {
            return Err(QueryError::Malformed(format!("{op} takes exactly two arguments")));
        };
        let var = var
            .get("var")
            .and_then(Json::as_str)
            .ok_or_else(|| QueryError::Malformed(format!("first argument of {op} must be {{\"var\": name}}")))?;
        Ok(JsonLogic::Compare {
            op,
            var: var.to_string(),
            literal: Literal::parse(literal)?,
        })
    }

    /// Every comparison, with nested `and`s flattened.
    pub fn comparisons(&self) -> Vec<(CompareOp, &str, &Literal)> {
        match self {
            JsonLogic::Compare { op, var, literal } => vec![(*op, var.as_str(), literal)],
            JsonLogic::And(exprs) => exprs.iter().flat_map(JsonLogic::comparisons).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// One `orderBy` entry: `{"var": "Name", "dir": "desc"}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderBy {
    pub var: String,
    #[serde(default)]
    pub dir: Direction,
}

impl OrderBy {
    pub fn asc(var: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            dir: Direction::Asc,
        }
    }

    pub fn desc(var: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            dir: Direction::Desc,
        }
    }

    /// Parses an `orderBy` list.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Malformed`] if the JSON is not a list of order entries.
    pub fn parse_list(json: &Json) -> Result<Vec<Self>, QueryError> {
        serde_json::from_value(json.clone()).map_err(|e| QueryError::Malformed(format!("orderBy: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_and() {
        let expr = JsonLogic::parse(&json!({
            "and": [
                {"==": [{"var": "Bill Status"}, "abc"]},
                {"and": [{">=": [{"var": "Total Cost"}, 12.5]}, {"!=": [{"var": "Name"}, null]}]}
            ]
        }))
        .unwrap();
        let comparisons = expr.comparisons();
        assert_eq!(comparisons.len(), 3);
        assert_eq!(comparisons[1], (CompareOp::Gte, "Total Cost", &Literal::Number(Decimal::new(125, 1))));
        assert_eq!(comparisons[2].2, &Literal::Null);
    }

    #[test]
    fn test_rejects_unsupported_operator() {
        let err = JsonLogic::parse(&json!({"in": [{"var": "Name"}, ["a"]]})).unwrap_err();
        assert_eq!(err, QueryError::UnsupportedOperator("in".to_string()));
    }

    #[test]
    fn test_rejects_malformed_shapes() {
        for bad in [
            json!([]),
            json!({"==": [{"var": "Name"}]}),
            json!({"==": ["Name", {"var": "Name"}]}),
            json!({"==": [{"var": "Name"}, "a"], "!=": [{"var": "Name"}, "b"]}),
            json!({"==": [{"var": "Name"}, ["a"]]}),
        ] {
            assert!(
                matches!(JsonLogic::parse(&bad), Err(QueryError::Malformed(_))),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn test_parse_order_by() {
        let order = OrderBy::parse_list(&json!([{"var": "Name"}, {"var": "Total Cost", "dir": "desc"}])).unwrap();
        assert_eq!(order, vec![OrderBy::asc("Name"), OrderBy::desc("Total Cost")]);
    }
}
