//! Step condition evaluation.
//!
//! The field is resolved with the same path rules as input templates; a
//! missing field compares as `null`. Ordering operators require both sides to
//! be numeric (numbers or numeric strings) and report a `ConditionError`
//! otherwise instead of quietly evaluating to false.

use agentflow_types::workflow::{ConditionOperator, StepCondition};
use serde_json::Value;
use thiserror::Error;

use super::context::ExecutionContext;

#[derive(Debug, Error, PartialEq)]
pub enum ConditionError {
    #[error("{operator} on field '{field}' requires numeric operands, got {value}")]
    NotNumeric {
        field: String,
        operator: &'static str,
        value: String,
    },
}

/// Evaluate `condition` against the current context.
pub fn evaluate(condition: &StepCondition, ctx: &ExecutionContext) -> Result<bool, ConditionError> {
    let resolved = ctx.resolve_path(&condition.field);
    let actual = resolved.unwrap_or(&Value::Null);

    let outcome = match condition.operator {
        ConditionOperator::Equals => values_equal(actual, &condition.value),
        ConditionOperator::NotEquals => !values_equal(actual, &condition.value),
        ConditionOperator::Contains => match resolved {
            Some(haystack) => string_form(haystack).contains(&string_form(&condition.value)),
            None => false,
        },
        ConditionOperator::GreaterThan => {
            let (lhs, rhs) = numeric_operands(condition, actual, "greater_than")?;
            lhs > rhs
        }
        ConditionOperator::LessThan => {
            let (lhs, rhs) = numeric_operands(condition, actual, "less_than")?;
            lhs < rhs
        }
        ConditionOperator::Unsupported => {
            tracing::warn!(field = %condition.field, "unsupported condition operator, evaluating to false");
            false
        }
    };

    Ok(outcome)
}

/// Numbers compare by value (`1 == 1.0`); everything else structurally.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

/// Strings without quotes; other values as compact JSON.
fn string_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn numeric_operands(
    condition: &StepCondition,
    actual: &Value,
    operator: &'static str,
) -> Result<(f64, f64), ConditionError> {
    let not_numeric = |value: &Value| ConditionError::NotNumeric {
        field: condition.field.clone(),
        operator,
        value: value.to_string(),
    };
    let lhs = as_number(actual).ok_or_else(|| not_numeric(actual))?;
    let rhs = as_number(&condition.value).ok_or_else(|| not_numeric(&condition.value))?;
    Ok((lhs, rhs))
}
