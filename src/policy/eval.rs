//! Tree-walking interpreter for parsed policies.

use super::parser::{BinaryOp, Builtin, Expr, LedgerQuery, Program};
use super::{ErrorKind, ScriptError};
use crate::ledger::Ledger;
use crate::transaction::{Operation, Transaction};
use serde_json::Value;
use std::cmp::Ordering;

/// Evaluates one policy against one transaction. Holds no state beyond the
/// remaining lookup budget, so a fresh interpreter is built per evaluation.
pub struct Interpreter<'a> {
    ledger: &'a dyn Ledger,
    tx: Value,
    lookups_left: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(ledger: &'a dyn Ledger, tx: Value, max_ledger_lookups: usize) -> Self {
        Self {
            ledger,
            tx,
            lookups_left: max_ledger_lookups,
        }
    }

    /// Fails on the first condition that does not evaluate to `true`.
    pub fn run(&mut self, program: &Program) -> Result<(), ScriptError> {
        for (position, condition) in program.conditions.iter().enumerate() {
            match self.eval(condition)? {
                Value::Bool(true) => {}
                Value::Bool(false) => {
                    return Err(ScriptError::new(
                        ErrorKind::AssertionError,
                        format!("condition {} does not hold", position + 1),
                    ))
                }
                other => {
                    return Err(type_error(format!(
                        "condition {} evaluated to {} instead of a boolean",
                        position + 1,
                        type_name(&other)
                    )))
                }
            }
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, ScriptError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Tx => Ok(self.tx.clone()),
            Expr::Field(base, name) => {
                let base = self.eval(base)?;
                field(&base, name)
            }
            Expr::Index(base, index) => {
                let base = self.eval(base)?;
                let index = self.eval(index)?;
                match (&base, &index) {
                    (Value::Array(items), _) => {
                        let position = index
                            .as_i64()
                            .ok_or_else(|| type_error("list index must be an integer"))?;
                        usize::try_from(position)
                            .ok()
                            .and_then(|p| items.get(p))
                            .cloned()
                            .ok_or_else(|| {
                                ScriptError::new(
                                    ErrorKind::IndexError,
                                    format!(
                                        "index {} out of range for list of length {}",
                                        position,
                                        items.len()
                                    ),
                                )
                            })
                    }
                    (Value::Object(_), Value::String(key)) => field(&base, key),
                    _ => Err(type_error(format!(
                        "cannot index {} with {}",
                        type_name(&base),
                        type_name(&index)
                    ))),
                }
            }
            Expr::Not(operand) => {
                let value = self.eval(operand)?;
                Ok(Value::Bool(!expect_bool(&value, "!")?))
            }
            Expr::Binary(BinaryOp::And, left, right) => {
                if !expect_bool(&self.eval(left)?, "&&")? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(expect_bool(&self.eval(right)?, "&&")?))
            }
            Expr::Binary(BinaryOp::Or, left, right) => {
                if expect_bool(&self.eval(left)?, "||")? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(expect_bool(&self.eval(right)?, "||")?))
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, &left, &right)
            }
            Expr::Call(builtin, args) => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                call(*builtin, &args)
            }
            Expr::Ledger(query, argument) => {
                let argument = self.eval(argument)?;
                let txid = argument.as_str().ok_or_else(|| {
                    type_error(format!(
                        "ledger lookups take a transaction id string, got {}",
                        type_name(&argument)
                    ))
                })?;
                self.lookup(*query, txid)
            }
        }
    }

    fn fetch(&mut self, txid: &str) -> Result<Option<Transaction>, ScriptError> {
        if self.lookups_left == 0 {
            return Err(ScriptError::new(
                ErrorKind::LimitExceeded,
                "ledger lookup budget exhausted",
            ));
        }
        self.lookups_left -= 1;
        self.ledger
            .get_transaction(txid)
            .map_err(|e| ScriptError::new(ErrorKind::LookupError, e.to_string()))
    }

    fn lookup(&mut self, query: LedgerQuery, txid: &str) -> Result<Value, ScriptError> {
        let Some(found) = self.fetch(txid)? else {
            return Ok(Value::Null);
        };

        let tx = match (query, found.operation) {
            (LedgerQuery::GetTransaction, _) => return to_value(&found),
            (LedgerQuery::GetAsset, Operation::Create) => found,
            (LedgerQuery::GetAsset, Operation::Transfer) => {
                let asset_id = found
                    .asset_id()
                    .map_err(|e| ScriptError::new(ErrorKind::LookupError, e.to_string()))?;
                match self.fetch(&asset_id)? {
                    Some(create) => create,
                    None => return Ok(Value::Null),
                }
            }
        };
        match &tx.asset {
            Some(asset) => to_value(asset),
            None => Ok(Value::Null),
        }
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ScriptError> {
    serde_json::to_value(value).map_err(|e| ScriptError::new(ErrorKind::LookupError, e.to_string()))
}

fn type_error(message: impl Into<String>) -> ScriptError {
    ScriptError::new(ErrorKind::TypeError, message)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn expect_bool(value: &Value, context: &str) -> Result<bool, ScriptError> {
    value.as_bool().ok_or_else(|| {
        type_error(format!(
            "`{}` expects a boolean, got {}",
            context,
            type_name(value)
        ))
    })
}

fn as_int(value: &Value) -> Option<i128> {
    value
        .as_i64()
        .map(i128::from)
        .or_else(|| value.as_u64().map(i128::from))
}

fn from_int(n: i128) -> Result<Value, ScriptError> {
    if let Ok(n) = i64::try_from(n) {
        return Ok(Value::from(n));
    }
    u64::try_from(n)
        .map(Value::from)
        .map_err(|_| type_error("integer overflow"))
}

fn field(base: &Value, name: &str) -> Result<Value, ScriptError> {
    match base {
        Value::Object(map) => map
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptError::new(ErrorKind::KeyError, format!("'{}'", name))),
        other => Err(type_error(format!(
            "cannot read field `{}` of {}",
            name,
            type_name(other)
        ))),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (as_int(left), as_int(right)) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Result<Ordering, ScriptError> {
    if let (Some(l), Some(r)) = (as_int(left), as_int(right)) {
        return Ok(l.cmp(&r));
    }
    if let (Value::String(l), Value::String(r)) = (left, right) {
        return Ok(l.cmp(r));
    }
    if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
        if let Some(ordering) = l.partial_cmp(&r) {
            return Ok(ordering);
        }
    }
    Err(type_error(format!(
        "cannot order {} and {}",
        type_name(left),
        type_name(right)
    )))
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ScriptError> {
    let result = match op {
        BinaryOp::Eq => values_equal(left, right),
        BinaryOp::Ne => !values_equal(left, right),
        BinaryOp::Lt => compare(left, right)? == Ordering::Less,
        BinaryOp::Le => compare(left, right)? != Ordering::Greater,
        BinaryOp::Gt => compare(left, right)? == Ordering::Greater,
        BinaryOp::Ge => compare(left, right)? != Ordering::Less,
        BinaryOp::Add => {
            if let (Value::String(l), Value::String(r)) = (left, right) {
                return Ok(Value::String(format!("{}{}", l, r)));
            }
            return arithmetic(left, right, i128::checked_add, "+");
        }
        BinaryOp::Sub => return arithmetic(left, right, i128::checked_sub, "-"),
        BinaryOp::And => expect_bool(left, "&&")? && expect_bool(right, "&&")?,
        BinaryOp::Or => expect_bool(left, "||")? || expect_bool(right, "||")?,
    };
    Ok(Value::Bool(result))
}

fn arithmetic(
    left: &Value,
    right: &Value,
    apply: fn(i128, i128) -> Option<i128>,
    symbol: &str,
) -> Result<Value, ScriptError> {
    match (as_int(left), as_int(right)) {
        (Some(l), Some(r)) => from_int(apply(l, r).ok_or_else(|| type_error("integer overflow"))?),
        _ => Err(type_error(format!(
            "unsupported operands for `{}`: {} and {}",
            symbol,
            type_name(left),
            type_name(right)
        ))),
    }
}

fn list<'v>(value: &'v Value, builtin: &str) -> Result<&'v Vec<Value>, ScriptError> {
    value.as_array().ok_or_else(|| {
        type_error(format!(
            "`{}` expects a list, got {}",
            builtin,
            type_name(value)
        ))
    })
}

static NULL: Value = Value::Null;

fn call(builtin: Builtin, args: &[Value]) -> Result<Value, ScriptError> {
    let arg = |position: usize| args.get(position).unwrap_or(&NULL);

    match builtin {
        Builtin::Len => match arg(0) {
            Value::Array(items) => Ok(Value::from(items.len())),
            Value::Object(map) => Ok(Value::from(map.len())),
            Value::String(s) => Ok(Value::from(s.chars().count())),
            other => Err(type_error(format!(
                "`len` expects a list, object or string, got {}",
                type_name(other)
            ))),
        },
        Builtin::Sum => {
            let total = list(arg(0), "sum")?.iter().try_fold(0i128, |acc, item| {
                let n = as_int(item).ok_or_else(|| {
                    type_error(format!("`sum` expects integers, got {}", type_name(item)))
                })?;
                acc.checked_add(n).ok_or_else(|| type_error("integer overflow"))
            })?;
            from_int(total)
        }
        Builtin::Pluck => {
            let key = arg(1)
                .as_str()
                .ok_or_else(|| type_error("`pluck` expects a string key"))?;
            list(arg(0), "pluck")?
                .iter()
                .map(|item| field(item, key))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        Builtin::Contains => match (arg(0), arg(1)) {
            (Value::Array(items), needle) => {
                Ok(Value::Bool(items.iter().any(|item| values_equal(item, needle))))
            }
            (Value::String(hay), Value::String(needle)) => {
                Ok(Value::Bool(hay.contains(needle.as_str())))
            }
            (Value::Object(map), Value::String(key)) => Ok(Value::Bool(map.contains_key(key))),
            (hay, needle) => Err(type_error(format!(
                "`contains` cannot search {} for {}",
                type_name(hay),
                type_name(needle)
            ))),
        },
        Builtin::Has => match (arg(0), arg(1)) {
            (Value::Object(map), Value::String(key)) => Ok(Value::Bool(map.contains_key(key))),
            (base, _) => Err(type_error(format!(
                "`has` expects an object and a string key, got {}",
                type_name(base)
            ))),
        },
        Builtin::All | Builtin::Any => {
            let name = if builtin == Builtin::All { "all" } else { "any" };
            let flags = list(arg(0), name)?
                .iter()
                .map(|item| expect_bool(item, name))
                .collect::<Result<Vec<_>, _>>()?;
            let result = if builtin == Builtin::All {
                flags.iter().all(|flag| *flag)
            } else {
                flags.iter().any(|flag| *flag)
            };
            Ok(Value::Bool(result))
        }
        Builtin::Reject => {
            let message = match arg(0) {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Err(ScriptError::new(ErrorKind::Rejected, message))
        }
    }
}
