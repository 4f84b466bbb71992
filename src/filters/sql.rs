//! Compile filter ASTs into parameterised SQLite `WHERE` fragments.

use sqlx::{QueryBuilder, Sqlite};

use super::ast::{CollectionOp, FilterNode, FilterValue, LogicalOp, TextOp};
use super::FilterError;

/// A table that filter expressions can be applied to.
pub trait FilterTarget {
    /// Table name, used in error messages.
    const TABLE: &'static str;

    /// Map a field name from an expression to a column, or `None` if not filterable.
    fn column(field: &str) -> Option<&'static str>;
}

/// Check every field in `node` against the target's column whitelist.
pub fn validate<T: FilterTarget>(node: &FilterNode) -> Result<(), FilterError> {
    for field in node.fields() {
        if T::column(field).is_none() {
            return Err(FilterError::UnknownField {
                field: field.to_string(),
                table: T::TABLE,
            });
        }
    }
    Ok(())
}

/// Append the SQL for `node` to `qb`, binding all literal values.
pub fn push_filter<T: FilterTarget>(
    qb: &mut QueryBuilder<'_, Sqlite>,
    node: &FilterNode,
) -> Result<(), FilterError> {
    validate::<T>(node)?;
    push_node::<T>(qb, node);
    Ok(())
}

fn push_node<T: FilterTarget>(qb: &mut QueryBuilder<'_, Sqlite>, node: &FilterNode) {
    match node {
        FilterNode::Comparison { field, op, value } => {
            qb.push(column::<T>(field))
                .push(" ")
                .push(op.sql())
                .push(" ");
            push_value(qb, value);
        }
        FilterNode::Collection { field, op, values } => {
            qb.push(column::<T>(field));
            qb.push(match op {
                CollectionOp::In => " IN (",
                CollectionOp::NotIn => " NOT IN (",
            });
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_value(qb, value);
            }
            qb.push(")");
        }
        FilterNode::Range { field, start, end } => {
            qb.push(column::<T>(field)).push(" BETWEEN ");
            push_value(qb, start);
            qb.push(" AND ");
            push_value(qb, end);
        }
        FilterNode::TextSearch { field, op, pattern } => {
            let col = column::<T>(field);
            match op {
                TextOp::Like => {
                    qb.push(col).push(" LIKE ").push_bind(pattern.clone());
                }
                TextOp::ILike => {
                    qb.push("LOWER(")
                        .push(col)
                        .push(") LIKE LOWER(")
                        .push_bind(pattern.clone())
                        .push(")");
                }
                TextOp::Contains => {
                    qb.push(col)
                        .push(" LIKE '%' || ")
                        .push_bind(pattern.clone())
                        .push(" || '%'");
                }
            }
        }
        FilterNode::Logical { op, operands } => match op {
            LogicalOp::Not => {
                qb.push("NOT (");
                for operand in operands {
                    push_node::<T>(qb, operand);
                }
                qb.push(")");
            }
            LogicalOp::And | LogicalOp::Or => {
                let joiner = if *op == LogicalOp::And { " AND " } else { " OR " };
                qb.push("(");
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        qb.push(joiner);
                    }
                    push_node::<T>(qb, operand);
                }
                qb.push(")");
            }
        },
    }
}

fn push_value(qb: &mut QueryBuilder<'_, Sqlite>, value: &FilterValue) {
    match value {
        FilterValue::Text(s) => qb.push_bind(s.clone()),
        // Whole numbers bind as INTEGER
        FilterValue::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => qb.push_bind(*n as i64),
        FilterValue::Number(n) => qb.push_bind(*n),
    };
}

// Only called after `validate`, so the lookup cannot fail.
fn column<T: FilterTarget>(field: &str) -> &'static str {
    T::column(field).unwrap_or("NULL")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::parser::parse;

    struct People;

    impl FilterTarget for People {
        const TABLE: &'static str = "people";

        fn column(field: &str) -> Option<&'static str> {
            match field {
                "id" => Some("id"),
                "name" => Some("name"),
                "active" => Some("active"),
                _ => None,
            }
        }
    }

    fn compile(expr: &str) -> String {
        let node = parse(expr).unwrap();
        let mut qb = QueryBuilder::<Sqlite>::new("WHERE ");
        push_filter::<People>(&mut qb, &node).unwrap();
        qb.sql().to_string()
    }

    #[test]
    fn test_comparison() {
        assert_eq!(compile("active:eq:Y"), "WHERE active = ?");
        assert_eq!(compile("id:lte:3"), "WHERE id <= ?");
        assert_eq!(compile("id:neq:3"), "WHERE id <> ?");
    }

    #[test]
    fn test_collection_and_range() {
        assert_eq!(compile("id:in:1,2,3"), "WHERE id IN (?, ?, ?)");
        assert_eq!(compile("id:not_in:1"), "WHERE id NOT IN (?)");
        assert_eq!(compile("id:between:1,9"), "WHERE id BETWEEN ? AND ?");
    }

    #[test]
    fn test_text_search() {
        assert_eq!(compile(r#"name:like:"A%""#), "WHERE name LIKE ?");
        assert_eq!(compile("name:ilike:a"), "WHERE LOWER(name) LIKE LOWER(?)");
        assert_eq!(
            compile("name:contains:ann"),
            "WHERE name LIKE '%' || ? || '%'"
        );
    }

    #[test]
    fn test_logical_nesting() {
        assert_eq!(
            compile("active:eq:Y and not (id:eq:1 or id:eq:2)"),
            "WHERE (active = ? AND NOT ((id = ? OR id = ?)))"
        );
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let node = parse("passwd:eq:secret").unwrap();
        let mut qb = QueryBuilder::<Sqlite>::new("WHERE ");
        let err = push_filter::<People>(&mut qb, &node).unwrap_err();
        assert_eq!(
            err,
            FilterError::UnknownField {
                field: "passwd".into(),
                table: "people",
            }
        );
    }
}
