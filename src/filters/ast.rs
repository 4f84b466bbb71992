//! Filter expression AST.

use std::fmt;
use std::str::FromStr;

use super::FilterError;

/// `eq`, `neq`, `gt`, `gte`, `lt`, `lte`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ComparisonOp {
    pub fn sql(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Neq => "<>",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
        }
    }
}

/// `in`, `not_in`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionOp {
    In,
    NotIn,
}

/// `like`, `ilike`, `contains`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOp {
    Like,
    ILike,
    Contains,
}

/// `and`, `or`, `not`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

/// Any operator that may appear between the two colons of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Comparison(ComparisonOp),
    Collection(CollectionOp),
    Between,
    Text(TextOp),
}

impl FromStr for Operator {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s {
            "eq" => Operator::Comparison(ComparisonOp::Eq),
            "neq" => Operator::Comparison(ComparisonOp::Neq),
            "gt" => Operator::Comparison(ComparisonOp::Gt),
            "gte" => Operator::Comparison(ComparisonOp::Gte),
            "lt" => Operator::Comparison(ComparisonOp::Lt),
            "lte" => Operator::Comparison(ComparisonOp::Lte),
            "in" => Operator::Collection(CollectionOp::In),
            "not_in" => Operator::Collection(CollectionOp::NotIn),
            "between" => Operator::Between,
            "like" => Operator::Text(TextOp::Like),
            "ilike" => Operator::Text(TextOp::ILike),
            "contains" => Operator::Text(TextOp::Contains),
            _ => return Err(FilterError::UnknownOperator(s.to_string())),
        };
        Ok(op)
    }
}

/// A literal on the right-hand side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(f64),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Text(s) => f.write_str(s),
            FilterValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Comparison {
        field: String,
        op: ComparisonOp,
        value: FilterValue,
    },
    Collection {
        field: String,
        op: CollectionOp,
        values: Vec<FilterValue>,
    },
    Range {
        field: String,
        start: FilterValue,
        end: FilterValue,
    },
    TextSearch {
        field: String,
        op: TextOp,
        pattern: String,
    },
    Logical {
        op: LogicalOp,
        operands: Vec<FilterNode>,
    },
}

impl FilterNode {
    /// Field names referenced anywhere in the expression.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FilterNode::Comparison { field, .. }
            | FilterNode::Collection { field, .. }
            | FilterNode::Range { field, .. }
            | FilterNode::TextSearch { field, .. } => out.push(field),
            FilterNode::Logical { operands, .. } => {
                for operand in operands {
                    operand.collect_fields(out);
                }
            }
        }
    }
}
