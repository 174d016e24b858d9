//! JavaScript value representation
//!
//! The core `Value` type and the abstract operations over it: type
//! predicates, equality, and the specification coercions.

use std::fmt;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::cast::{FromPrimitive, ToPrimitive};
use num_traits::{Num, Zero};

use crate::agent::Agent;
use crate::error::EngineError;
use crate::interpreter::call_value;
use crate::object::{JsObjectRef, PropertyKey};

/// Trait for types that have cheap (O(1), reference-counted) clones.
///
/// Makes it explicit when a clone is just a reference-count increment.
pub trait CheapClone: Clone {
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized> CheapClone for Rc<T> {}

/// A JavaScript value.
///
/// `Empty` is the sentinel for uninitialized bindings (the temporal dead
/// zone). It is never observable from JavaScript: reads of an `Empty`
/// binding throw before the value escapes.
#[derive(Clone, Default)]
pub enum Value {
    Empty,
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    BigInt(Rc<BigInt>),
    String(JsString),
    Symbol(JsSymbol),
    Object(JsObjectRef),
}

/// Hint passed to the ToPrimitive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredType {
    Default,
    Number,
    String,
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn as_object(&self) -> Option<&JsObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Check if this value is callable (a function object).
    pub fn is_callable(&self) -> bool {
        match self {
            Value::Object(obj) => obj.borrow().is_callable(),
            _ => false,
        }
    }

    /// Check if this value is a constructor.
    pub fn is_constructor(&self) -> bool {
        match self {
            Value::Object(obj) => obj.borrow().is_constructor(),
            _ => false,
        }
    }

    /// The `typeof` result for this value.
    ///
    /// Never fails, for any value. `Empty` is unreachable here because TDZ
    /// reads throw before `typeof` sees the sentinel.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Empty => "undefined",
            Value::Undefined => "undefined",
            Value::Null => "object", // Historical quirk
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Object(obj) => {
                if obj.borrow().is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// ToBoolean. Total; never throws.
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Empty | Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::BigInt(b) => !b.is_zero(),
            Value::String(s) => !s.is_empty(),
            Value::Symbol(_) => true,
            Value::Object(_) => true,
        }
    }

    /// SameValue.
    ///
    /// Distinguishes +0 from -0; NaN does not equal itself.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() || b.is_nan() {
                    false
                } else {
                    a.to_bits() == b.to_bits()
                }
            }
            _ => self.same_value_non_numeric(other),
        }
    }

    /// SameValueZero: like SameValue but +0 equals -0 and NaN equals NaN.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => (a.is_nan() && b.is_nan()) || a == b,
            _ => self.same_value_non_numeric(other),
        }
    }

    /// Strict equality (`===`).
    pub fn is_strictly_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self.same_value_non_numeric(other),
        }
    }

    fn same_value_non_numeric(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Empty, Value::Empty) => true,
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => write!(f, "<empty>"),
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", number_to_string(*n)),
            Value::BigInt(b) => write!(f, "{}n", b),
            Value::String(s) => write!(f, "{:?}", s.as_str()),
            Value::Symbol(s) => match s.description() {
                Some(desc) => write!(f, "Symbol({})", desc),
                None => write!(f, "Symbol()"),
            },
            Value::Object(obj) => {
                let obj = obj.borrow();
                if let Some(name) = obj.function_name() {
                    write!(f, "[Function: {}]", name)
                } else if obj.is_array() {
                    write!(f, "[...]")
                } else {
                    write!(f, "{{...}}")
                }
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.is_strictly_equal(other)
    }
}

// Conversions from Rust types

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(JsString::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(JsString::from(s))
    }
}

impl From<JsString> for Value {
    fn from(s: JsString) -> Self {
        Value::String(s)
    }
}

impl From<JsObjectRef> for Value {
    fn from(obj: JsObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl From<BigInt> for Value {
    fn from(b: BigInt) -> Self {
        Value::BigInt(Rc::new(b))
    }
}

/// Reference-counted immutable string.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsString(Rc<str>);

impl CheapClone for JsString {}

impl JsString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Length in UTF-16 code units, the unit JavaScript strings count in.
    pub fn utf16_len(&self) -> usize {
        self.0.encode_utf16().count()
    }

    pub fn concat(&self, other: &JsString) -> JsString {
        let mut s = String::with_capacity(self.0.len() + other.0.len());
        s.push_str(&self.0);
        s.push_str(&other.0);
        JsString::from(s)
    }
}

impl AsRef<str> for JsString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for JsString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        JsString(s.into())
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        JsString(s.into())
    }
}

impl From<char> for JsString {
    fn from(c: char) -> Self {
        JsString(c.to_string().into())
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// JavaScript Symbol primitive: unique identity with an optional description.
#[derive(Clone, Debug)]
pub struct JsSymbol {
    id: u64,
    description: Option<JsString>,
}

impl JsSymbol {
    pub fn new(id: u64, description: Option<JsString>) -> Self {
        Self { id, description }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn description(&self) -> Option<&JsString> {
        self.description.as_ref()
    }
}

impl PartialEq for JsSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for JsSymbol {}

impl std::hash::Hash for JsSymbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Abstract operations that may run user code (valueOf / toString / [Symbol.toPrimitive])
// ═══════════════════════════════════════════════════════════════════════════════

/// ToPrimitive.
pub fn to_primitive(
    agent: &mut Agent,
    value: &Value,
    hint: PreferredType,
) -> Result<Value, EngineError> {
    let Value::Object(obj) = value else {
        return Ok(value.clone());
    };

    // @@toPrimitive takes precedence over the OrdinaryToPrimitive order.
    let to_prim_sym = agent.well_known_symbols().to_primitive.clone();
    let exotic = crate::object::get(agent, obj, &PropertyKey::Symbol(to_prim_sym))?;
    if !exotic.is_nullish() {
        let hint_str = match hint {
            PreferredType::Default => "default",
            PreferredType::Number => "number",
            PreferredType::String => "string",
        };
        let result = call_value(agent, &exotic, value.clone(), &[Value::from(hint_str)])?;
        if !result.is_object() {
            return Ok(result);
        }
        return Err(agent.type_error("Cannot convert object to primitive value"));
    }

    let method_names: [&str; 2] = match hint {
        PreferredType::String => ["toString", "valueOf"],
        _ => ["valueOf", "toString"],
    };
    for name in method_names {
        let method = crate::object::get(agent, obj, &PropertyKey::from(name))?;
        if method.is_callable() {
            let result = call_value(agent, &method, value.clone(), &[])?;
            if !result.is_object() {
                return Ok(result);
            }
        }
    }
    Err(agent.type_error("Cannot convert object to primitive value"))
}

/// ToNumber.
pub fn to_number(agent: &mut Agent, value: &Value) -> Result<f64, EngineError> {
    match value {
        Value::Empty => Err(EngineError::internal("ToNumber on the empty sentinel")),
        Value::Undefined => Ok(f64::NAN),
        Value::Null => Ok(0.0),
        Value::Boolean(true) => Ok(1.0),
        Value::Boolean(false) => Ok(0.0),
        Value::Number(n) => Ok(*n),
        Value::BigInt(_) => Err(agent.type_error("Cannot convert a BigInt to a number")),
        Value::String(s) => Ok(string_to_number(s.as_str())),
        Value::Symbol(_) => Err(agent.type_error("Cannot convert a Symbol to a number")),
        Value::Object(_) => {
            let prim = to_primitive(agent, value, PreferredType::Number)?;
            to_number(agent, &prim)
        }
    }
}

/// ToNumeric: like ToNumber but passes BigInts through.
pub fn to_numeric(agent: &mut Agent, value: &Value) -> Result<Value, EngineError> {
    let prim = to_primitive(agent, value, PreferredType::Number)?;
    if let Value::BigInt(_) = prim {
        return Ok(prim);
    }
    Ok(Value::Number(to_number(agent, &prim)?))
}

/// ToString.
pub fn to_string(agent: &mut Agent, value: &Value) -> Result<JsString, EngineError> {
    match value {
        Value::Empty => Err(EngineError::internal("ToString on the empty sentinel")),
        Value::Undefined => Ok(JsString::from("undefined")),
        Value::Null => Ok(JsString::from("null")),
        Value::Boolean(true) => Ok(JsString::from("true")),
        Value::Boolean(false) => Ok(JsString::from("false")),
        Value::Number(n) => Ok(JsString::from(number_to_string(*n))),
        Value::BigInt(b) => Ok(JsString::from(b.to_string())),
        Value::String(s) => Ok(s.cheap_clone()),
        Value::Symbol(_) => Err(agent.type_error("Cannot convert a Symbol to a string")),
        Value::Object(_) => {
            let prim = to_primitive(agent, value, PreferredType::String)?;
            to_string(agent, &prim)
        }
    }
}

/// ToPropertyKey.
pub fn to_property_key(agent: &mut Agent, value: &Value) -> Result<PropertyKey, EngineError> {
    let key = to_primitive(agent, value, PreferredType::String)?;
    match key {
        Value::Symbol(s) => Ok(PropertyKey::Symbol(s)),
        Value::Number(n) => {
            let idx = n as u32;
            if idx as f64 == n && n.is_sign_positive() {
                Ok(PropertyKey::Index(idx))
            } else {
                Ok(PropertyKey::from(JsString::from(number_to_string(n))))
            }
        }
        other => Ok(PropertyKey::from(to_string(agent, &other)?)),
    }
}

/// ToObject: box primitives, error on null/undefined.
pub fn to_object(agent: &mut Agent, value: &Value) -> Result<JsObjectRef, EngineError> {
    match value {
        Value::Object(obj) => Ok(obj.clone()),
        Value::Undefined | Value::Null | Value::Empty => {
            Err(agent.type_error("Cannot convert undefined or null to object"))
        }
        prim => Ok(crate::builtins::box_primitive(agent, prim)),
    }
}

/// Abstract relational comparison, three-valued: `None` when either side is
/// NaN.
pub fn is_less_than(
    agent: &mut Agent,
    left: &Value,
    right: &Value,
) -> Result<Option<bool>, EngineError> {
    let px = to_primitive(agent, left, PreferredType::Number)?;
    let py = to_primitive(agent, right, PreferredType::Number)?;

    if let (Value::String(a), Value::String(b)) = (&px, &py) {
        return Ok(Some(a.as_str() < b.as_str()));
    }

    match (&px, &py) {
        (Value::BigInt(a), Value::BigInt(b)) => Ok(Some(a < b)),
        (Value::BigInt(a), _) => {
            let n = to_number(agent, &py)?;
            Ok(compare_bigint_f64(a, n))
        }
        (_, Value::BigInt(b)) => {
            let n = to_number(agent, &px)?;
            Ok(compare_f64_bigint(n, b))
        }
        _ => {
            let nx = to_number(agent, &px)?;
            let ny = to_number(agent, &py)?;
            if nx.is_nan() || ny.is_nan() {
                Ok(None)
            } else {
                Ok(Some(nx < ny))
            }
        }
    }
}

fn compare_bigint_f64(a: &BigInt, n: f64) -> Option<bool> {
    if n.is_nan() {
        return None;
    }
    if n == f64::INFINITY {
        return Some(true);
    }
    if n == f64::NEG_INFINITY {
        return Some(false);
    }
    match a.to_f64() {
        Some(af) => Some(af < n),
        None => Some(a.sign() == num_bigint::Sign::Minus),
    }
}

fn compare_f64_bigint(n: f64, b: &BigInt) -> Option<bool> {
    if n.is_nan() {
        return None;
    }
    if n == f64::INFINITY {
        return Some(false);
    }
    if n == f64::NEG_INFINITY {
        return Some(true);
    }
    match b.to_f64() {
        Some(bf) => Some(n < bf),
        None => Some(b.sign() != num_bigint::Sign::Minus),
    }
}

/// Abstract equality (`==`).
pub fn is_loosely_equal(
    agent: &mut Agent,
    left: &Value,
    right: &Value,
) -> Result<bool, EngineError> {
    match (left, right) {
        // Same-type comparisons collapse to strict equality.
        (Value::Undefined, Value::Undefined)
        | (Value::Null, Value::Null)
        | (Value::Boolean(_), Value::Boolean(_))
        | (Value::Number(_), Value::Number(_))
        | (Value::BigInt(_), Value::BigInt(_))
        | (Value::String(_), Value::String(_))
        | (Value::Symbol(_), Value::Symbol(_))
        | (Value::Object(_), Value::Object(_)) => Ok(left.is_strictly_equal(right)),

        (Value::Null, Value::Undefined) | (Value::Undefined, Value::Null) => Ok(true),

        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            Ok(*n == string_to_number(s.as_str()))
        }

        (Value::BigInt(b), Value::String(s)) | (Value::String(s), Value::BigInt(b)) => {
            Ok(match string_to_bigint(s.as_str()) {
                Some(parsed) => **b == parsed,
                None => false,
            })
        }

        (Value::BigInt(b), Value::Number(n)) | (Value::Number(n), Value::BigInt(b)) => {
            Ok(bigint_equals_number(b, *n))
        }

        (Value::Boolean(b), _) => {
            let n = Value::Number(if *b { 1.0 } else { 0.0 });
            is_loosely_equal(agent, &n, right)
        }
        (_, Value::Boolean(b)) => {
            let n = Value::Number(if *b { 1.0 } else { 0.0 });
            is_loosely_equal(agent, left, &n)
        }

        (
            Value::Object(_),
            Value::Number(_) | Value::String(_) | Value::BigInt(_) | Value::Symbol(_),
        ) => {
            let prim = to_primitive(agent, left, PreferredType::Default)?;
            is_loosely_equal(agent, &prim, right)
        }
        (
            Value::Number(_) | Value::String(_) | Value::BigInt(_) | Value::Symbol(_),
            Value::Object(_),
        ) => {
            let prim = to_primitive(agent, right, PreferredType::Default)?;
            is_loosely_equal(agent, left, &prim)
        }

        _ => Ok(false),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Number ↔ string conversions
// ═══════════════════════════════════════════════════════════════════════════════

/// The Number-to-String algorithm for radix 10, covering the canonical
/// forms: "NaN", signed infinities, "-0" collapses to "0", integers without
/// a decimal point, exponential form past 1e21.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == f64::INFINITY {
        return "Infinity".to_string();
    }
    if n == f64::NEG_INFINITY {
        return "-Infinity".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        // Rust prints "1e21"; JavaScript wants "1e+21".
        let s = format!("{:e}", n);
        if let Some(pos) = s.find('e') {
            let (mantissa, exp) = s.split_at(pos);
            let exp = &exp[1..];
            if !exp.starts_with('-') {
                return format!("{}e+{}", mantissa, exp);
            }
        }
        return s;
    }
    if n.fract() == 0.0 && abs < 9.007_199_254_740_992e15 {
        return format!("{}", n as i64);
    }
    format!("{}", n)
}

/// The String-to-Number conversion: trimmed, empty means zero, radix
/// prefixes and the infinities recognized.
pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }
    if let Some(oct) = t.strip_prefix("0o").or_else(|| t.strip_prefix("0O")) {
        return u64::from_str_radix(oct, 8)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }
    if let Some(bin) = t.strip_prefix("0b").or_else(|| t.strip_prefix("0B")) {
        return u64::from_str_radix(bin, 2)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// StringToBigInt: empty or whitespace-only text is zero, radix prefixes
/// are accepted (unsigned), a sign is only valid on decimal digits.
/// `None` marks text with no BigInt value.
pub fn string_to_bigint(s: &str) -> Option<BigInt> {
    let t = s.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    if t.is_empty() {
        return Some(BigInt::from(0));
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return BigInt::from_str_radix(hex, 16).ok();
    }
    if let Some(oct) = t.strip_prefix("0o").or_else(|| t.strip_prefix("0O")) {
        return BigInt::from_str_radix(oct, 8).ok();
    }
    if let Some(bin) = t.strip_prefix("0b").or_else(|| t.strip_prefix("0B")) {
        return BigInt::from_str_radix(bin, 2).ok();
    }
    t.parse::<BigInt>().ok()
}

/// Exact mathematical equality between a BigInt and a Number. The integral
/// double converts losslessly, so magnitudes beyond the i64 range compare
/// correctly.
pub fn bigint_equals_number(b: &BigInt, n: f64) -> bool {
    if !n.is_finite() || n.fract() != 0.0 {
        return false;
    }
    match BigInt::from_f64(n) {
        Some(converted) => converted == *b,
        None => false,
    }
}

/// ToInt32, used by the bitwise operators.
pub fn to_int32(n: f64) -> i32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let m = n.trunc().rem_euclid(4_294_967_296.0);
    if m >= 2_147_483_648.0 {
        (m - 4_294_967_296.0) as i32
    } else {
        m as i32
    }
}

/// ToUint32, used by `>>>` and array index conversion.
pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_boolean() {
        assert!(!Value::Undefined.to_boolean());
        assert!(!Value::Null.to_boolean());
        assert!(!Value::Boolean(false).to_boolean());
        assert!(Value::Boolean(true).to_boolean());
        assert!(!Value::Number(0.0).to_boolean());
        assert!(!Value::Number(-0.0).to_boolean());
        assert!(Value::Number(1.0).to_boolean());
        assert!(!Value::Number(f64::NAN).to_boolean());
        assert!(!Value::String(JsString::from("")).to_boolean());
        assert!(Value::String(JsString::from("hello")).to_boolean());
        assert!(!Value::from(BigInt::from(0)).to_boolean());
        assert!(Value::from(BigInt::from(-3)).to_boolean());
    }

    #[test]
    fn test_same_value_signed_zero_and_nan() {
        assert!(!Value::Number(0.0).same_value(&Value::Number(-0.0)));
        assert!(Value::Number(0.0).same_value_zero(&Value::Number(-0.0)));
        assert!(!Value::Number(f64::NAN).same_value(&Value::Number(f64::NAN)));
        assert!(Value::Number(f64::NAN).same_value_zero(&Value::Number(f64::NAN)));
    }

    #[test]
    fn test_same_value_implies_same_value_zero() {
        let values = [
            Value::Undefined,
            Value::Null,
            Value::Boolean(true),
            Value::Number(1.5),
            Value::Number(-0.0),
            Value::from("x"),
            Value::from(BigInt::from(7)),
        ];
        for a in &values {
            for b in &values {
                if a.same_value(b) {
                    assert!(a.same_value_zero(b));
                }
            }
        }
    }

    #[test]
    fn test_strict_equals() {
        assert!(Value::Undefined.is_strictly_equal(&Value::Undefined));
        assert!(Value::Null.is_strictly_equal(&Value::Null));
        assert!(!Value::Undefined.is_strictly_equal(&Value::Null));
        assert!(Value::Number(1.0).is_strictly_equal(&Value::Number(1.0)));
        assert!(Value::Number(0.0).is_strictly_equal(&Value::Number(-0.0)));
        assert!(!Value::Number(f64::NAN).is_strictly_equal(&Value::Number(f64::NAN)));
        assert!(Value::from("a").is_strictly_equal(&Value::from("a")));
    }

    #[test]
    fn test_type_of() {
        assert_eq!(Value::Undefined.type_of(), "undefined");
        assert_eq!(Value::Null.type_of(), "object");
        assert_eq!(Value::Boolean(true).type_of(), "boolean");
        assert_eq!(Value::Number(1.0).type_of(), "number");
        assert_eq!(Value::from(BigInt::from(1)).type_of(), "bigint");
        assert_eq!(Value::from("s").type_of(), "string");
    }

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::INFINITY), "Infinity");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(42.0), "42");
        assert_eq!(number_to_string(-7.0), "-7");
        assert_eq!(number_to_string(0.5), "0.5");
        assert_eq!(number_to_string(1e21), "1e+21");
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("  42  "), 42.0);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert_eq!(string_to_number("Infinity"), f64::INFINITY);
        assert!(string_to_number("pear").is_nan());
    }

    #[test]
    fn test_string_to_bigint() {
        assert_eq!(string_to_bigint(""), Some(BigInt::from(0)));
        assert_eq!(string_to_bigint("   "), Some(BigInt::from(0)));
        assert_eq!(string_to_bigint("42"), Some(BigInt::from(42)));
        assert_eq!(string_to_bigint("-42"), Some(BigInt::from(-42)));
        assert_eq!(string_to_bigint("0x10"), Some(BigInt::from(16)));
        assert_eq!(string_to_bigint("0o17"), Some(BigInt::from(15)));
        assert_eq!(string_to_bigint("0b101"), Some(BigInt::from(5)));
        assert_eq!(string_to_bigint("1.5"), None);
        assert_eq!(string_to_bigint("pear"), None);
    }

    #[test]
    fn test_bigint_equals_number() {
        assert!(bigint_equals_number(&BigInt::from(3), 3.0));
        assert!(!bigint_equals_number(&BigInt::from(3), 3.5));
        assert!(!bigint_equals_number(&BigInt::from(3), f64::NAN));
        assert!(!bigint_equals_number(&BigInt::from(3), f64::INFINITY));
        // Past the i64 range, the comparison stays exact.
        let big: BigInt = "100000000000000000000".parse().unwrap();
        assert!(bigint_equals_number(&big, 1e20));
        assert!(!bigint_equals_number(&(big + 1), 1e20));
    }

    #[test]
    fn test_to_int32() {
        assert_eq!(to_int32(0.0), 0);
        assert_eq!(to_int32(f64::NAN), 0);
        assert_eq!(to_int32(4_294_967_296.0), 0);
        assert_eq!(to_int32(2_147_483_648.0), -2_147_483_648);
        assert_eq!(to_int32(-1.0), -1);
        assert_eq!(to_uint32(-1.0), 4_294_967_295);
    }
}
