//! Property value model
//!
//! `PropertyValue` is the tagged sum stored on vertices and edges. Two
//! orderings live on it:
//!
//! - the **total ordering** (`Ord`): ranks values by type class with `Int`
//!   and `Double` merged into one numeric class. This is the order the
//!   label-property index is keyed by, so it must be total — `Double` uses
//!   IEEE total ordering and cross-type comparisons never fail.
//! - the **checked comparison** (`try_cmp`): the query-facing comparison
//!   that refuses mixed-type operands (except the numeric pair) with a
//!   `ValueError`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

/// A property value attached to a vertex or an edge.
///
/// `Null` is a first-class value at the API surface but is never stored in
/// a property map and never indexed; setting a property to `Null` clears it.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    /// Absence of a value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered list of values.
    List(Vec<PropertyValue>),
    /// String-keyed map of values.
    Map(BTreeMap<String, PropertyValue>),
}

/// Error produced by the checked value comparison.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The two operands are of types that have no defined comparison.
    #[error("cannot compare {lhs} to {rhs}")]
    IncomparableTypes {
        /// Type name of the left operand.
        lhs: &'static str,
        /// Type name of the right operand.
        rhs: &'static str,
    },
}

impl PropertyValue {
    /// Whether this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    /// Human-readable type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Null => "Null",
            PropertyValue::Bool(_) => "Bool",
            PropertyValue::Int(_) => "Int",
            PropertyValue::Double(_) => "Double",
            PropertyValue::String(_) => "String",
            PropertyValue::List(_) => "List",
            PropertyValue::Map(_) => "Map",
        }
    }

    /// Rank of the type class in the total ordering.
    ///
    /// `Int` and `Double` share a class and are compared numerically.
    fn type_rank(&self) -> u8 {
        match self {
            PropertyValue::Null => 0,
            PropertyValue::Bool(_) => 1,
            PropertyValue::Int(_) | PropertyValue::Double(_) => 2,
            PropertyValue::String(_) => 3,
            PropertyValue::List(_) => 4,
            PropertyValue::Map(_) => 5,
        }
    }

    /// Checked comparison: errors on operands of different type classes.
    ///
    /// `Int` and `Double` compare numerically; everything else requires the
    /// same variant on both sides.
    pub fn try_cmp(&self, other: &PropertyValue) -> Result<Ordering, ValueError> {
        if self.type_rank() != other.type_rank()
            || matches!(self, PropertyValue::Null)
            || matches!(other, PropertyValue::Null)
        {
            return Err(ValueError::IncomparableTypes {
                lhs: self.type_name(),
                rhs: other.type_name(),
            });
        }
        Ok(self.cmp(other))
    }
}

/// Exact comparison of an `i64` against an `f64` on the real number line.
///
/// A cast to `f64` loses precision past 2^53, so the integer part is
/// compared as an integer and only the fractional part decides ties.
/// NaN sorts the way IEEE total ordering places it: above everything when
/// positive, below everything when negative.
fn cmp_int_double(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return if f.is_sign_positive() {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    // 2^63 is exactly representable; anything at or above it exceeds i64
    if f >= 9_223_372_036_854_775_808.0 {
        return Ordering::Less;
    }
    if f < -9_223_372_036_854_775_808.0 {
        return Ordering::Greater;
    }
    let trunc = f.trunc() as i64;
    match i.cmp(&trunc) {
        Ordering::Equal => {
            // Same integer part; the sign of the fraction decides
            if f > trunc as f64 {
                Ordering::Less
            } else if f < trunc as f64 {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
        other => other,
    }
}

impl Ord for PropertyValue {
    fn cmp(&self, other: &PropertyValue) -> Ordering {
        use PropertyValue::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Double(a), Double(b)) => a.total_cmp(b),
            (Int(a), Double(b)) => cmp_int_double(*a, *b),
            (Double(a), Int(b)) => cmp_int_double(*b, *a).reverse(),
            (String(a), String(b)) => a.cmp(b),
            (List(a), List(b)) => a.cmp(b),
            (Map(a), Map(b)) => a.cmp(b),
            (a, b) => a.type_rank().cmp(&b.type_rank()),
        }
    }
}

impl PartialOrd for PropertyValue {
    fn partial_cmp(&self, other: &PropertyValue) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &PropertyValue) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PropertyValue {}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Double(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}
