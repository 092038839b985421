//! Structural equality for `enum`/`const` membership and
//! `uniqueItems`, with numbers compared by value across integer and
//! float representations.
use num_cmp::NumCmp;
use serde_json::{Map, Number, Value};

fn number_eq(left: &Number, right: &Number) -> bool {
    macro_rules! against {
        ($left:expr) => {
            if let Some(b) = right.as_u64() {
                NumCmp::num_eq($left, b)
            } else if let Some(b) = right.as_i64() {
                NumCmp::num_eq($left, b)
            } else if let Some(b) = right.as_f64() {
                NumCmp::num_eq($left, b)
            } else {
                false
            }
        };
    }
    if let Some(a) = left.as_u64() {
        against!(a)
    } else if let Some(a) = left.as_i64() {
        against!(a)
    } else if let Some(a) = left.as_f64() {
        against!(a)
    } else {
        false
    }
}

pub(crate) fn equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => number_eq(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => objects_equal(a, b),
        _ => false,
    }
}

fn objects_equal(left: &Map<String, Value>, right: &Map<String, Value>) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .all(|(key, value)| right.get(key).map(|other| equal(value, other)).unwrap_or(false))
}
