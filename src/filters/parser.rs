//! Recursive-descent parser for filter expressions.
//!
//! ```text
//! expr       := and_expr ("or" and_expr)*
//! and_expr   := unary ("and" unary)*
//! unary      := "not" unary | "(" expr ")" | condition
//! condition  := FIELD ":" OPERATOR ":" value ("," value)*
//! value      := STRING | NUMBER | NAME
//! ```

use super::ast::{FilterNode, FilterValue, LogicalOp, Operator};
use super::lexer::{tokenize, Token, TokenKind};
use super::FilterError;

/// Maximum nesting of `not` and parenthesised groups.
pub const MAX_DEPTH: usize = 64;

/// Maximum number of conditions in one expression.
pub const MAX_CONDITIONS: usize = 256;

/// Parse a filter expression into an AST.
pub fn parse(input: &str) -> Result<FilterNode, FilterError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(FilterError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        conditions: 0,
    };
    let node = parser.expr()?;
    match parser.peek() {
        None => Ok(node),
        Some(tok) => Err(FilterError::UnexpectedToken {
            found: tok.kind.describe(),
            pos: tok.pos,
        }),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    conditions: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, FilterError> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(FilterError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(tok)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().map(|t| &t.kind) == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), FilterError> {
        let tok = self.next()?;
        if tok.kind == kind {
            Ok(())
        } else {
            Err(FilterError::UnexpectedToken {
                found: tok.kind.describe(),
                pos: tok.pos,
            })
        }
    }

    fn expr(&mut self) -> Result<FilterNode, FilterError> {
        let mut operands = vec![self.and_expr()?];
        while self.eat(&TokenKind::Or) {
            operands.push(self.and_expr()?);
        }
        Ok(logical(LogicalOp::Or, operands))
    }

    fn and_expr(&mut self) -> Result<FilterNode, FilterError> {
        let mut operands = vec![self.unary()?];
        while self.eat(&TokenKind::And) {
            operands.push(self.unary()?);
        }
        Ok(logical(LogicalOp::And, operands))
    }

    fn unary(&mut self) -> Result<FilterNode, FilterError> {
        let pos = self.peek().map(|t| t.pos).unwrap_or_default();
        if self.eat(&TokenKind::Not) {
            self.descend(pos)?;
            let operand = self.unary()?;
            self.depth -= 1;
            return Ok(FilterNode::Logical {
                op: LogicalOp::Not,
                operands: vec![operand],
            });
        }
        if self.eat(&TokenKind::LParen) {
            self.descend(pos)?;
            let inner = self.expr()?;
            self.expect(TokenKind::RParen)?;
            self.depth -= 1;
            return Ok(inner);
        }
        self.condition()
    }

    fn descend(&mut self, pos: usize) -> Result<(), FilterError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FilterError::TooDeep { pos });
        }
        Ok(())
    }

    fn condition(&mut self) -> Result<FilterNode, FilterError> {
        self.conditions += 1;
        if self.conditions > MAX_CONDITIONS {
            let pos = self.peek().map(|t| t.pos).unwrap_or_default();
            return Err(FilterError::TooLarge { pos });
        }

        let field = match self.next()? {
            Token {
                kind: TokenKind::Name(name),
                ..
            } => name,
            tok => {
                return Err(FilterError::UnexpectedToken {
                    found: tok.kind.describe(),
                    pos: tok.pos,
                })
            }
        };
        self.expect(TokenKind::Colon)?;

        let op = match self.next()? {
            Token {
                kind: TokenKind::Name(name),
                ..
            } => name.parse::<Operator>()?,
            tok => {
                return Err(FilterError::UnexpectedToken {
                    found: tok.kind.describe(),
                    pos: tok.pos,
                })
            }
        };
        self.expect(TokenKind::Colon)?;

        let mut values = vec![self.value()?];
        while self.eat(&TokenKind::Comma) {
            values.push(self.value()?);
        }

        build_condition(field, op, values)
    }

    fn value(&mut self) -> Result<FilterValue, FilterError> {
        let tok = self.next()?;
        match tok.kind {
            TokenKind::Str(s) | TokenKind::Name(s) => Ok(FilterValue::Text(s)),
            TokenKind::Number(raw) => raw
                .parse::<f64>()
                .map(FilterValue::Number)
                .map_err(|_| FilterError::UnexpectedToken {
                    found: format!("number {}", raw),
                    pos: tok.pos,
                }),
            other => Err(FilterError::UnexpectedToken {
                found: other.describe(),
                pos: tok.pos,
            }),
        }
    }
}

/// Collapse single-operand `and`/`or` groups to the operand itself.
fn logical(op: LogicalOp, mut operands: Vec<FilterNode>) -> FilterNode {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        FilterNode::Logical { op, operands }
    }
}

fn build_condition(
    field: String,
    op: Operator,
    mut values: Vec<FilterValue>,
) -> Result<FilterNode, FilterError> {
    match op {
        Operator::Comparison(op) => {
            let value = single(values, "comparison")?;
            Ok(FilterNode::Comparison { field, op, value })
        }
        Operator::Collection(op) => Ok(FilterNode::Collection { field, op, values }),
        Operator::Between => {
            if values.len() != 2 {
                return Err(FilterError::Arity {
                    operator: "between".to_string(),
                    expected: "exactly two values",
                    found: values.len(),
                });
            }
            let end = values.remove(1);
            let start = values.remove(0);
            Ok(FilterNode::Range { field, start, end })
        }
        Operator::Text(op) => {
            let pattern = single(values, "text search")?.to_string();
            Ok(FilterNode::TextSearch { field, op, pattern })
        }
    }
}

fn single(mut values: Vec<FilterValue>, operator: &str) -> Result<FilterValue, FilterError> {
    if values.len() != 1 {
        return Err(FilterError::Arity {
            operator: operator.to_string(),
            expected: "exactly one value",
            found: values.len(),
        });
    }
    Ok(values.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::ast::{CollectionOp, ComparisonOp, TextOp};

    fn eq(field: &str, value: &str) -> FilterNode {
        FilterNode::Comparison {
            field: field.into(),
            op: ComparisonOp::Eq,
            value: FilterValue::Text(value.into()),
        }
    }

    #[test]
    fn test_single_comparison() {
        assert_eq!(parse("active:eq:Y").unwrap(), eq("active", "Y"));
    }

    #[test]
    fn test_whitespace_is_ignored() {
        assert_eq!(parse("  active : eq : Y ").unwrap(), eq("active", "Y"));
    }

    #[test]
    fn test_and_of_two() {
        assert_eq!(
            parse("active:eq:Y and admin:eq:Y").unwrap(),
            FilterNode::Logical {
                op: LogicalOp::And,
                operands: vec![eq("active", "Y"), eq("admin", "Y")],
            }
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let node = parse("a:eq:1 or b:eq:2 and c:eq:3").unwrap();
        let FilterNode::Logical { op, operands } = node else {
            panic!("expected logical node");
        };
        assert_eq!(op, LogicalOp::Or);
        assert_eq!(operands.len(), 2);
        assert!(matches!(
            &operands[1],
            FilterNode::Logical {
                op: LogicalOp::And,
                ..
            }
        ));
    }

    #[test]
    fn test_chained_and_is_flat() {
        let node = parse("a:eq:1 and b:eq:2 and c:eq:3").unwrap();
        let FilterNode::Logical { op, operands } = node else {
            panic!("expected logical node");
        };
        assert_eq!(op, LogicalOp::And);
        assert_eq!(operands.len(), 3);
    }

    #[test]
    fn test_not_and_parentheses() {
        let node = parse("not (active:eq:Y or admin:eq:Y)").unwrap();
        let FilterNode::Logical { op, operands } = node else {
            panic!("expected logical node");
        };
        assert_eq!(op, LogicalOp::Not);
        assert_eq!(operands.len(), 1);
        assert!(matches!(
            &operands[0],
            FilterNode::Logical {
                op: LogicalOp::Or,
                ..
            }
        ));
    }

    #[test]
    fn test_numbers_and_strings() {
        assert_eq!(
            parse("id:gte:10").unwrap(),
            FilterNode::Comparison {
                field: "id".into(),
                op: ComparisonOp::Gte,
                value: FilterValue::Number(10.0),
            }
        );
        assert_eq!(
            parse(r#"city:eq:"New York""#).unwrap(),
            eq("city", "New York")
        );
    }

    #[test]
    fn test_collection_wraps_single_value() {
        assert_eq!(
            parse("state:in:CA").unwrap(),
            FilterNode::Collection {
                field: "state".into(),
                op: CollectionOp::In,
                values: vec![FilterValue::Text("CA".into())],
            }
        );
        assert_eq!(
            parse("id:not_in:1,2,3").unwrap(),
            FilterNode::Collection {
                field: "id".into(),
                op: CollectionOp::NotIn,
                values: vec![
                    FilterValue::Number(1.0),
                    FilterValue::Number(2.0),
                    FilterValue::Number(3.0),
                ],
            }
        );
    }

    #[test]
    fn test_between() {
        assert_eq!(
            parse("id:between:5,10").unwrap(),
            FilterNode::Range {
                field: "id".into(),
                start: FilterValue::Number(5.0),
                end: FilterValue::Number(10.0),
            }
        );
        assert!(matches!(
            parse("id:between:5").unwrap_err(),
            FilterError::Arity { found: 1, .. }
        ));
    }

    #[test]
    fn test_text_search_renders_numbers() {
        assert_eq!(
            parse("postcode:contains:90").unwrap(),
            FilterNode::TextSearch {
                field: "postcode".into(),
                op: TextOp::Contains,
                pattern: "90".into(),
            }
        );
    }

    #[test]
    fn test_comparison_rejects_lists() {
        assert!(matches!(
            parse("id:eq:1,2").unwrap_err(),
            FilterError::Arity { found: 2, .. }
        ));
    }

    #[test]
    fn test_unknown_operator() {
        assert_eq!(
            parse("id:approx:1").unwrap_err(),
            FilterError::UnknownOperator("approx".into())
        );
        assert_eq!("not_in".parse::<Operator>(), Ok(Operator::Collection(CollectionOp::NotIn)));
        assert!("NOT_IN".parse::<Operator>().is_err());
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(parse("   ").unwrap_err(), FilterError::Empty);
        assert_eq!(parse("active:eq").unwrap_err(), FilterError::UnexpectedEnd);
        assert!(matches!(
            parse("active:eq:Y admin:eq:Y").unwrap_err(),
            FilterError::UnexpectedToken { pos: 12, .. }
        ));
        assert!(matches!(
            parse("(active:eq:Y").unwrap_err(),
            FilterError::UnexpectedEnd
        ));
        assert!(matches!(
            parse("and:eq:Y").unwrap_err(),
            FilterError::UnexpectedToken { pos: 0, .. }
        ));
    }

    #[test]
    fn test_fields_lists_every_condition() {
        let node = parse("a:eq:1 and (b:eq:2 or not c:eq:3)").unwrap();
        assert_eq!(node.fields(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_nesting_limit() {
        let ok = format!("{}a:eq:1{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert!(parse(&ok).is_ok());

        let deep = format!("{}a:eq:1{}", "(".repeat(1_000), ")".repeat(1_000));
        assert_eq!(
            parse(&deep).unwrap_err(),
            FilterError::TooDeep { pos: MAX_DEPTH }
        );

        let nots = format!("{}a:eq:1", "not ".repeat(200_000));
        assert!(matches!(
            parse(&nots).unwrap_err(),
            FilterError::TooDeep { .. }
        ));
    }

    #[test]
    fn test_condition_limit() {
        let within = vec!["a:eq:1"; MAX_CONDITIONS].join(" or ");
        assert!(parse(&within).is_ok());

        let over = vec!["a:eq:1"; MAX_CONDITIONS + 1].join(" or ");
        assert!(matches!(
            parse(&over).unwrap_err(),
            FilterError::TooLarge { .. }
        ));
    }
}
