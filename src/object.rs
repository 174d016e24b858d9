//! Ordinary objects, property keys, and property descriptors
//!
//! Implements the ECMAScript internal methods over a two-part property
//! store: integer-indexed entries (dense or sparse, picked by density) and
//! named entries in insertion order.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::agent::Agent;
use crate::env::EnvId;
use crate::error::EngineError;
use crate::ir::FunctionInfo;
use crate::realm::Realm;
use crate::value::{CheapClone, JsString, JsSymbol, Value};

/// Reference to a heap-allocated object. Clone is a reference-count bump.
pub type JsObjectRef = Rc<RefCell<JsObject>>;

/// Property key: string, integer index, or symbol.
///
/// Keys whose string form is a canonical non-negative integer below 2^32-1
/// are normalized to `Index` so they route to the indexed store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(JsString),
    Index(u32),
    Symbol(JsSymbol),
}

impl PropertyKey {
    pub fn is_symbol(&self) -> bool {
        matches!(self, PropertyKey::Symbol(_))
    }

    /// The key as a string value ("5" for Index(5)); symbols have none.
    pub fn as_string_value(&self) -> Option<JsString> {
        match self {
            PropertyKey::String(s) => Some(s.cheap_clone()),
            PropertyKey::Index(i) => Some(JsString::from(i.to_string())),
            PropertyKey::Symbol(_) => None,
        }
    }

    /// Key as a value (for Reflect-style APIs and for-in).
    pub fn to_value(&self) -> Value {
        match self {
            PropertyKey::String(s) => Value::String(s.cheap_clone()),
            PropertyKey::Index(i) => Value::String(JsString::from(i.to_string())),
            PropertyKey::Symbol(s) => Value::Symbol(s.clone()),
        }
    }
}

fn canonical_index(s: &str) -> Option<u32> {
    if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
        return None;
    }
    let idx: u32 = s.parse().ok()?;
    if idx == u32::MAX {
        return None;
    }
    Some(idx)
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        match canonical_index(s) {
            Some(idx) => PropertyKey::Index(idx),
            None => PropertyKey::String(JsString::from(s)),
        }
    }
}

impl From<JsString> for PropertyKey {
    fn from(s: JsString) -> Self {
        match canonical_index(s.as_str()) {
            Some(idx) => PropertyKey::Index(idx),
            None => PropertyKey::String(s),
        }
    }
}

impl From<u32> for PropertyKey {
    fn from(idx: u32) -> Self {
        PropertyKey::Index(idx)
    }
}

impl std::fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{}", s),
            PropertyKey::Index(i) => write!(f, "{}", i),
            PropertyKey::Symbol(s) => match s.description() {
                Some(desc) => write!(f, "Symbol({})", desc),
                None => write!(f, "Symbol()"),
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Property descriptors
// ═══════════════════════════════════════════════════════════════════════════════

/// A complete own-property descriptor. Data and accessor shapes are
/// distinguished by construction, so `is_data != is_accessor` always holds.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub kind: DescriptorKind,
    pub enumerable: bool,
    pub configurable: bool,
}

#[derive(Debug, Clone)]
pub enum DescriptorKind {
    Data {
        value: Value,
        writable: bool,
    },
    Accessor {
        get: Option<JsObjectRef>,
        set: Option<JsObjectRef>,
    },
}

impl PropertyDescriptor {
    pub fn data(value: Value) -> Self {
        Self {
            kind: DescriptorKind::Data {
                value,
                writable: true,
            },
            enumerable: true,
            configurable: true,
        }
    }

    /// Built-in method attributes: writable + configurable, not enumerable.
    pub fn builtin(value: Value) -> Self {
        Self {
            kind: DescriptorKind::Data {
                value,
                writable: true,
            },
            enumerable: false,
            configurable: true,
        }
    }

    /// Fully pinned value (e.g. `undefined`, `NaN` on the global).
    pub fn frozen_data(value: Value) -> Self {
        Self {
            kind: DescriptorKind::Data {
                value,
                writable: false,
            },
            enumerable: false,
            configurable: false,
        }
    }

    pub fn with_attributes(value: Value, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            kind: DescriptorKind::Data { value, writable },
            enumerable,
            configurable,
        }
    }

    pub fn accessor(get: Option<JsObjectRef>, set: Option<JsObjectRef>) -> Self {
        Self {
            kind: DescriptorKind::Accessor { get, set },
            enumerable: false,
            configurable: true,
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self.kind, DescriptorKind::Data { .. })
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self.kind, DescriptorKind::Accessor { .. })
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.kind {
            DescriptorKind::Data { value, .. } => Some(value),
            DescriptorKind::Accessor { .. } => None,
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(self.kind, DescriptorKind::Data { writable: true, .. })
    }
}

/// A possibly-incomplete descriptor, the input shape of
/// `[[DefineOwnProperty]]`. Absent fields are `None`.
#[derive(Debug, Clone, Default)]
pub struct PartialDescriptor {
    pub value: Option<Value>,
    pub writable: Option<bool>,
    pub get: Option<Option<JsObjectRef>>,
    pub set: Option<Option<JsObjectRef>>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PartialDescriptor {
    pub fn data(value: Value, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            value: Some(value),
            writable: Some(writable),
            enumerable: Some(enumerable),
            configurable: Some(configurable),
            ..Default::default()
        }
    }

    pub fn value_only(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn is_data(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    pub fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    pub fn is_generic(&self) -> bool {
        !self.is_data() && !self.is_accessor()
    }
}

/// The 9-step validate-and-apply of `[[DefineOwnProperty]]`.
///
/// Returns the resulting full descriptor on success, `None` on rejection.
/// Pure: caller supplies the current descriptor and the extensible flag.
pub fn validate_and_apply(
    current: Option<&PropertyDescriptor>,
    extensible: bool,
    desc: &PartialDescriptor,
) -> Option<PropertyDescriptor> {
    let Some(current) = current else {
        if !extensible {
            return None;
        }
        // Creation: absent fields default per the standard.
        let kind = if desc.is_accessor() {
            DescriptorKind::Accessor {
                get: desc.get.clone().unwrap_or(None),
                set: desc.set.clone().unwrap_or(None),
            }
        } else {
            DescriptorKind::Data {
                value: desc.value.clone().unwrap_or(Value::Undefined),
                writable: desc.writable.unwrap_or(false),
            }
        };
        return Some(PropertyDescriptor {
            kind,
            enumerable: desc.enumerable.unwrap_or(false),
            configurable: desc.configurable.unwrap_or(false),
        });
    };

    if !current.configurable {
        if desc.configurable == Some(true) {
            return None;
        }
        if let Some(e) = desc.enumerable {
            if e != current.enumerable {
                return None;
            }
        }
        if !desc.is_generic() && desc.is_accessor() != current.is_accessor() {
            return None;
        }
        match &current.kind {
            DescriptorKind::Data { value, writable } => {
                if !*writable {
                    if desc.writable == Some(true) {
                        return None;
                    }
                    if let Some(v) = &desc.value {
                        if !v.same_value(value) && !v.is_strictly_equal(value) {
                            return None;
                        }
                    }
                }
            }
            DescriptorKind::Accessor { get, set } => {
                if let Some(new_get) = &desc.get {
                    if !same_accessor(new_get, get) {
                        return None;
                    }
                }
                if let Some(new_set) = &desc.set {
                    if !same_accessor(new_set, set) {
                        return None;
                    }
                }
            }
        }
    }

    // Apply: merge field by field, switching shape when the incoming
    // descriptor changes type (attributes carry over, the rest resets).
    let mut result = current.clone();
    if let Some(e) = desc.enumerable {
        result.enumerable = e;
    }
    if let Some(c) = desc.configurable {
        result.configurable = c;
    }
    if desc.is_accessor() && current.is_data() {
        result.kind = DescriptorKind::Accessor {
            get: desc.get.clone().unwrap_or(None),
            set: desc.set.clone().unwrap_or(None),
        };
    } else if desc.is_data() && current.is_accessor() {
        result.kind = DescriptorKind::Data {
            value: desc.value.clone().unwrap_or(Value::Undefined),
            writable: desc.writable.unwrap_or(false),
        };
    } else {
        match &mut result.kind {
            DescriptorKind::Data { value, writable } => {
                if let Some(v) = &desc.value {
                    *value = v.clone();
                }
                if let Some(w) = desc.writable {
                    *writable = w;
                }
            }
            DescriptorKind::Accessor { get, set } => {
                if let Some(g) = &desc.get {
                    *get = g.clone();
                }
                if let Some(s) = &desc.set {
                    *set = s.clone();
                }
            }
        }
    }
    Some(result)
}

fn same_accessor(a: &Option<JsObjectRef>, b: &Option<JsObjectRef>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Indexed storage
// ═══════════════════════════════════════════════════════════════════════════════

/// Density below which a dense indexed store migrates to a sparse map.
const DENSE_MIN_DENSITY: f64 = 0.25;
/// Never go sparse below this capacity.
const DENSE_MIN_LEN: usize = 64;

/// Storage for integer-keyed properties: a dense vector with holes, or a
/// sorted map once the population gets sparse.
#[derive(Debug, Clone)]
pub enum IndexedStorage {
    Dense(Vec<Option<PropertyDescriptor>>),
    Sparse(BTreeMap<u32, PropertyDescriptor>),
}

impl IndexedStorage {
    pub fn new() -> Self {
        IndexedStorage::Dense(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            IndexedStorage::Dense(v) => v.iter().all(|e| e.is_none()),
            IndexedStorage::Sparse(m) => m.is_empty(),
        }
    }

    pub fn get(&self, idx: u32) -> Option<&PropertyDescriptor> {
        match self {
            IndexedStorage::Dense(v) => v.get(idx as usize).and_then(|e| e.as_ref()),
            IndexedStorage::Sparse(m) => m.get(&idx),
        }
    }

    pub fn set(&mut self, idx: u32, desc: PropertyDescriptor) {
        match self {
            IndexedStorage::Dense(v) => {
                let i = idx as usize;
                if i < v.len() {
                    v[i] = Some(desc);
                    return;
                }
                let new_len = i + 1;
                let population = v.iter().filter(|e| e.is_some()).count() + 1;
                if new_len > DENSE_MIN_LEN && (population as f64) < new_len as f64 * DENSE_MIN_DENSITY
                {
                    self.to_sparse();
                    self.set(idx, desc);
                    return;
                }
                v.resize(new_len, None);
                v[i] = Some(desc);
            }
            IndexedStorage::Sparse(m) => {
                m.insert(idx, desc);
            }
        }
    }

    pub fn remove(&mut self, idx: u32) -> bool {
        match self {
            IndexedStorage::Dense(v) => {
                if let Some(slot) = v.get_mut(idx as usize) {
                    if slot.is_some() {
                        *slot = None;
                        return true;
                    }
                }
                false
            }
            IndexedStorage::Sparse(m) => m.remove(&idx).is_some(),
        }
    }

    /// Keys in ascending numeric order.
    pub fn keys(&self) -> Vec<u32> {
        match self {
            IndexedStorage::Dense(v) => v
                .iter()
                .enumerate()
                .filter_map(|(i, e)| e.as_ref().map(|_| i as u32))
                .collect(),
            IndexedStorage::Sparse(m) => m.keys().copied().collect(),
        }
    }

    /// One past the greatest present index; the array-iteration bound.
    pub fn array_like_size(&self) -> u32 {
        match self {
            IndexedStorage::Dense(v) => {
                let mut len = v.len();
                while len > 0 && v[len - 1].is_none() {
                    len -= 1;
                }
                len as u32
            }
            IndexedStorage::Sparse(m) => m.keys().next_back().map(|k| k + 1).unwrap_or(0),
        }
    }

    /// Append at the current array-like size, preserving iteration order.
    pub fn push(&mut self, desc: PropertyDescriptor) -> u32 {
        let idx = self.array_like_size();
        self.set(idx, desc);
        idx
    }

    fn to_sparse(&mut self) {
        if let IndexedStorage::Dense(v) = self {
            let m: BTreeMap<u32, PropertyDescriptor> = v
                .drain(..)
                .enumerate()
                .filter_map(|(i, e)| e.map(|d| (i as u32, d)))
                .collect();
            *self = IndexedStorage::Sparse(m);
        }
    }

    /// Remove all entries at or past `from`. Used by array length truncation.
    pub fn truncate(&mut self, from: u32) {
        match self {
            IndexedStorage::Dense(v) => v.truncate(from as usize),
            IndexedStorage::Sparse(m) => {
                m.split_off(&from);
            }
        }
    }
}

impl Default for IndexedStorage {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Named storage key
// ═══════════════════════════════════════════════════════════════════════════════

/// Key for the named store: strings and symbols share one insertion-ordered
/// map and are split apart again by `own_property_keys`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamedKey {
    String(JsString),
    Symbol(JsSymbol),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Function data
// ═══════════════════════════════════════════════════════════════════════════════

/// What kind of callable a function object is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Normal,
    Arrow,
    Generator,
    Async,
    AsyncGenerator,
    ClassConstructor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorKind {
    Base,
    Derived,
}

/// An interpreted (bytecode-backed) function.
#[derive(Clone)]
pub struct InterpretedFunction {
    pub info: Rc<FunctionInfo>,
    pub kind: FunctionKind,
    pub constructor_kind: ConstructorKind,
    /// Lexical environment captured at closure creation.
    pub env: EnvId,
    /// Home object for method `super` references.
    pub home_object: Option<JsObjectRef>,
    pub realm: Rc<Realm>,
}

impl std::fmt::Debug for InterpretedFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpretedFunction")
            .field("name", &self.info.name)
            .field("kind", &self.kind)
            .field("env", &self.env)
            .finish()
    }
}

/// Arguments packet handed to native functions.
pub struct NativeCallContext {
    pub receiver: Value,
    pub new_target: Value,
    pub args: Vec<Value>,
}

impl NativeCallContext {
    pub fn arg(&self, i: usize) -> Value {
        self.args.get(i).cloned().unwrap_or(Value::Undefined)
    }
}

pub type NativeFn = Rc<dyn Fn(&mut Agent, &NativeCallContext) -> Result<Value, EngineError>>;

/// Host function wrapper.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: JsString,
    pub arity: u32,
    pub func: NativeFn,
    pub is_constructor: bool,
    pub realm: Rc<Realm>,
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Data for a function produced by `Function.prototype.bind`.
#[derive(Debug, Clone)]
pub struct BoundFunctionData {
    pub target: JsObjectRef,
    pub this_arg: Value,
    pub bound_args: Vec<Value>,
}

/// Callable behavior attached to a function object.
#[derive(Debug, Clone)]
pub enum JsFunction {
    Interpreted(InterpretedFunction),
    Native(NativeFunction),
    Bound(Box<BoundFunctionData>),
}

impl JsFunction {
    pub fn name(&self) -> Option<JsString> {
        match self {
            JsFunction::Interpreted(f) => Some(f.info.name.cheap_clone()),
            JsFunction::Native(f) => Some(f.name.cheap_clone()),
            JsFunction::Bound(_) => Some(JsString::from("bound")),
        }
    }

    pub fn realm(&self) -> Option<Rc<Realm>> {
        match self {
            JsFunction::Interpreted(f) => Some(f.realm.clone()),
            JsFunction::Native(f) => Some(f.realm.clone()),
            JsFunction::Bound(b) => b.target.borrow().function().and_then(|f| f.realm()),
        }
    }

    pub fn is_constructor(&self) -> bool {
        match self {
            JsFunction::Interpreted(f) => match f.kind {
                FunctionKind::Normal | FunctionKind::ClassConstructor => true,
                FunctionKind::Arrow
                | FunctionKind::Generator
                | FunctionKind::Async
                | FunctionKind::AsyncGenerator => false,
            },
            JsFunction::Native(f) => f.is_constructor,
            JsFunction::Bound(b) => b.target.borrow().is_constructor(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Generator and promise state
// ═══════════════════════════════════════════════════════════════════════════════

/// Suspended-generator state, held by the generator object and read by the
/// generator coordination opcodes.
#[derive(Debug)]
pub struct GeneratorState {
    /// Resume point index for the re-entry jump table. `GENERATOR_DONE`
    /// means the generator has completed.
    pub phase: u32,
    /// Operand stack saved across the yield.
    pub stack: Vec<Value>,
    /// Local slots saved across the yield.
    pub locals: Vec<Value>,
    /// Environment pointer at the yield.
    pub env: EnvId,
    /// Value passed in through `next(value)`.
    pub sent: Value,
    /// The compiled body and its creation-time context.
    pub function: InterpretedFunction,
    /// The generator function object, re-installed as the active function
    /// on every resume (home object for `super`, self reference).
    pub callee: JsObjectRef,
}

pub const GENERATOR_DONE: u32 = u32::MAX;
/// Phase of a generator that has been created but never resumed.
pub const GENERATOR_START: u32 = 0;

/// Promise internal state.
#[derive(Debug)]
pub struct PromiseState {
    pub status: PromiseStatus,
    pub result: Value,
    pub reactions: Vec<PromiseReaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseStatus {
    Pending,
    Fulfilled,
    Rejected,
}

/// Handler pair registered by `then`, with the derived promise it settles.
#[derive(Debug, Clone)]
pub struct PromiseReaction {
    pub on_fulfilled: Option<Value>,
    pub on_rejected: Option<Value>,
    pub derived: JsObjectRef,
}

// ═══════════════════════════════════════════════════════════════════════════════
// The object itself
// ═══════════════════════════════════════════════════════════════════════════════

/// Behavior-bearing object variants beyond the ordinary case.
#[derive(Debug)]
pub enum ExoticObject {
    Ordinary,
    /// Array exotic object: `length` is synthesized from these fields and
    /// kept in sync with the indexed store. Freezing clears the writable
    /// flag, pinning the length like any other data property.
    Array { length: u32, length_writable: bool },
    Function(JsFunction),
    Generator(Rc<RefCell<GeneratorState>>),
    Promise(Rc<RefCell<PromiseState>>),
    /// Boxed primitive (`new Number(3)`, string boxes from ToObject).
    BoxedPrimitive(Value),
}

/// A JavaScript object.
pub struct JsObject {
    /// Stable identity from the agent's counter.
    pub id: u64,
    pub prototype: Option<JsObjectRef>,
    pub extensible: bool,
    indexed: IndexedStorage,
    named: IndexMap<NamedKey, PropertyDescriptor>,
    /// Typed internal slots, allocated on first use.
    internal: Option<Box<FxHashMap<&'static str, Value>>>,
    pub exotic: ExoticObject,
}

impl std::fmt::Debug for JsObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsObject")
            .field("id", &self.id)
            .field("exotic", &self.exotic)
            .finish()
    }
}

impl JsObject {
    pub fn new(id: u64, prototype: Option<JsObjectRef>) -> Self {
        Self {
            id,
            prototype,
            extensible: true,
            indexed: IndexedStorage::new(),
            named: IndexMap::new(),
            internal: None,
            exotic: ExoticObject::Ordinary,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.exotic, ExoticObject::Function(_))
    }

    pub fn is_constructor(&self) -> bool {
        match &self.exotic {
            ExoticObject::Function(f) => f.is_constructor(),
            _ => false,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.exotic, ExoticObject::Array { .. })
    }

    pub fn function(&self) -> Option<&JsFunction> {
        match &self.exotic {
            ExoticObject::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn function_name(&self) -> Option<JsString> {
        self.function().and_then(|f| f.name())
    }

    pub fn array_length(&self) -> Option<u32> {
        match &self.exotic {
            ExoticObject::Array { length, .. } => Some(*length),
            _ => None,
        }
    }

    /// One past the greatest present index in the indexed store.
    pub fn array_like_size(&self) -> u32 {
        match &self.exotic {
            ExoticObject::Array { length, .. } => *length,
            _ => self.indexed.array_like_size(),
        }
    }

    // ─── internal slots ────────────────────────────────────────────────────

    pub fn set_internal(&mut self, name: &'static str, value: Value) {
        self.internal
            .get_or_insert_with(Default::default)
            .insert(name, value);
    }

    pub fn internal(&self, name: &str) -> Option<Value> {
        self.internal.as_ref().and_then(|m| m.get(name).cloned())
    }

    // ─── [[GetPrototypeOf]] / [[SetPrototypeOf]] / extensibility ───────────

    pub fn get_prototype_of(&self) -> Option<JsObjectRef> {
        self.prototype.clone()
    }

    pub fn is_extensible(&self) -> bool {
        self.extensible
    }

    pub fn prevent_extensions(&mut self) -> bool {
        self.extensible = false;
        true
    }

    // ─── own property access ───────────────────────────────────────────────

    /// `[[GetOwnProperty]]`: `None` when the key has no own entry.
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        // Array `length` is synthesized rather than stored.
        if let ExoticObject::Array {
            length,
            length_writable,
        } = &self.exotic
        {
            if matches!(key, PropertyKey::String(s) if s == "length") {
                return Some(PropertyDescriptor::with_attributes(
                    Value::from(*length),
                    *length_writable,
                    false,
                    false,
                ));
            }
        }
        match key {
            PropertyKey::Index(idx) => self.indexed.get(*idx).cloned(),
            PropertyKey::String(s) => self.named.get(&NamedKey::String(s.cheap_clone())).cloned(),
            PropertyKey::Symbol(s) => self.named.get(&NamedKey::Symbol(s.clone())).cloned(),
        }
    }

    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        self.get_own_property(key).is_some()
    }

    /// `[[HasProperty]]`: prototype-walking existence check.
    pub fn has_property(&self, key: &PropertyKey) -> bool {
        if self.has_own_property(key) {
            return true;
        }
        let mut proto = self.prototype.clone();
        while let Some(p) = proto {
            let b = p.borrow();
            if b.has_own_property(key) {
                return true;
            }
            proto = b.prototype.clone();
        }
        false
    }

    /// `[[Delete]]`: true unless the own property exists and is
    /// non-configurable.
    pub fn delete(&mut self, key: &PropertyKey) -> bool {
        match self.get_own_property(key) {
            None => true,
            Some(desc) if !desc.configurable => false,
            Some(_) => {
                match key {
                    PropertyKey::Index(idx) => {
                        self.indexed.remove(*idx);
                    }
                    PropertyKey::String(s) => {
                        self.named.shift_remove(&NamedKey::String(s.cheap_clone()));
                    }
                    PropertyKey::Symbol(s) => {
                        self.named.shift_remove(&NamedKey::Symbol(s.clone()));
                    }
                }
                true
            }
        }
    }

    /// `[[DefineOwnProperty]]` via validate-and-apply.
    pub fn define_own_property(&mut self, key: &PropertyKey, desc: &PartialDescriptor) -> bool {
        // Array length redefinition truncates or extends.
        if self.is_array() {
            if let PropertyKey::String(s) = key {
                if s == "length" {
                    return self.define_array_length(desc);
                }
            }
        }
        let current = self.get_own_property(key);
        let Some(new_desc) = validate_and_apply(current.as_ref(), self.extensible, desc) else {
            return false;
        };
        self.store_own(key, new_desc);
        if let ExoticObject::Array { length, .. } = &mut self.exotic {
            if let PropertyKey::Index(idx) = key {
                if *idx >= *length {
                    *length = idx + 1;
                }
            }
        }
        true
    }

    fn define_array_length(&mut self, desc: &PartialDescriptor) -> bool {
        let ExoticObject::Array {
            length,
            length_writable,
        } = &self.exotic
        else {
            return false;
        };
        let (old, writable) = (*length, *length_writable);
        // Length is non-configurable; once non-writable it stays that way
        // and rejects every value change.
        if desc.writable == Some(true) && !writable {
            return false;
        }
        if desc.configurable == Some(true) || desc.is_accessor() {
            return false;
        }
        let new_len = match &desc.value {
            None => old,
            Some(Value::Number(n)) => {
                let v = *n as u32;
                if v as f64 != *n {
                    return false;
                }
                v
            }
            Some(_) => return false,
        };
        if new_len != old && !writable {
            return false;
        }
        if new_len < old {
            self.indexed.truncate(new_len);
        }
        self.exotic = ExoticObject::Array {
            length: new_len,
            length_writable: writable && desc.writable != Some(false),
        };
        true
    }

    fn store_own(&mut self, key: &PropertyKey, desc: PropertyDescriptor) {
        match key {
            PropertyKey::Index(idx) => self.indexed.set(*idx, desc),
            PropertyKey::String(s) => {
                self.named.insert(NamedKey::String(s.cheap_clone()), desc);
            }
            PropertyKey::Symbol(s) => {
                self.named.insert(NamedKey::Symbol(s.clone()), desc);
            }
        }
    }

    /// `[[OwnPropertyKeys]]`: ascending indices, then strings in insertion
    /// order, then symbols in insertion order.
    pub fn own_property_keys(&self) -> Vec<PropertyKey> {
        let mut keys: Vec<PropertyKey> = self
            .indexed
            .keys()
            .into_iter()
            .map(PropertyKey::Index)
            .collect();
        if self.is_array() {
            keys.push(PropertyKey::String(JsString::from("length")));
        }
        for key in self.named.keys() {
            if let NamedKey::String(s) = key {
                keys.push(PropertyKey::String(s.cheap_clone()));
            }
        }
        for key in self.named.keys() {
            if let NamedKey::Symbol(s) = key {
                keys.push(PropertyKey::Symbol(s.clone()));
            }
        }
        keys
    }

    /// Own enumerable string-keyed property keys, for for-in and
    /// `Object.keys`.
    pub fn own_enumerable_string_keys(&self) -> Vec<PropertyKey> {
        self.own_property_keys()
            .into_iter()
            .filter(|k| !k.is_symbol())
            .filter(|k| {
                self.get_own_property(k)
                    .map(|d| d.enumerable)
                    .unwrap_or(false)
            })
            .collect()
    }

    // ─── integrity levels ──────────────────────────────────────────────────

    pub fn set_integrity_level(&mut self, level: IntegrityLevel) -> bool {
        self.extensible = false;
        // The synthesized array `length` is pinned through its own flag,
        // not the named store.
        if level == IntegrityLevel::Frozen {
            if let ExoticObject::Array { length_writable, .. } = &mut self.exotic {
                *length_writable = false;
            }
        }
        let keys = self.own_property_keys();
        for key in keys {
            if matches!(key, PropertyKey::String(ref s) if s == "length") && self.is_array() {
                continue;
            }
            let Some(mut desc) = self.get_own_property(&key) else {
                continue;
            };
            desc.configurable = false;
            if level == IntegrityLevel::Frozen {
                if let DescriptorKind::Data { writable, .. } = &mut desc.kind {
                    *writable = false;
                }
            }
            self.store_own(&key, desc);
        }
        true
    }

    pub fn test_integrity_level(&self, level: IntegrityLevel) -> bool {
        if self.extensible {
            return false;
        }
        for key in self.own_property_keys() {
            let Some(desc) = self.get_own_property(&key) else {
                continue;
            };
            if desc.configurable {
                return false;
            }
            if level == IntegrityLevel::Frozen && desc.is_data() && desc.is_writable() {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityLevel {
    Sealed,
    Frozen,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Prototype-walking operations (free functions: they may run user code)
// ═══════════════════════════════════════════════════════════════════════════════

/// `[[SetPrototypeOf]]`: identity, extensibility, and acyclicity checks.
pub fn set_prototype_of(obj: &JsObjectRef, proto: Option<JsObjectRef>) -> bool {
    {
        let current = obj.borrow();
        match (&current.prototype, &proto) {
            (None, None) => return true,
            (Some(a), Some(b)) if Rc::ptr_eq(a, b) => return true,
            _ => {}
        }
        if !current.extensible {
            return false;
        }
    }
    // Walk the candidate chain; reaching `obj` would create a cycle.
    let mut walk = proto.clone();
    while let Some(p) = walk {
        if Rc::ptr_eq(&p, obj) {
            return false;
        }
        walk = p.borrow().prototype.clone();
    }
    obj.borrow_mut().prototype = proto;
    true
}

/// `[[Get]]` with an explicit receiver for accessor invocation.
pub fn get_with_receiver(
    agent: &mut Agent,
    obj: &JsObjectRef,
    key: &PropertyKey,
    receiver: &Value,
) -> Result<Value, EngineError> {
    let (desc, proto) = {
        let b = obj.borrow();
        (b.get_own_property(key), b.prototype.clone())
    };
    match desc {
        Some(desc) => match desc.kind {
            DescriptorKind::Data { value, .. } => Ok(value),
            DescriptorKind::Accessor { get, .. } => match get {
                Some(getter) => crate::interpreter::call_function(
                    agent,
                    &getter,
                    receiver.clone(),
                    &[],
                    Value::Undefined,
                ),
                None => Ok(Value::Undefined),
            },
        },
        None => match proto {
            Some(parent) => get_with_receiver(agent, &parent, key, receiver),
            None => Ok(Value::Undefined),
        },
    }
}

/// `[[Get]]`.
pub fn get(agent: &mut Agent, obj: &JsObjectRef, key: &PropertyKey) -> Result<Value, EngineError> {
    let receiver = Value::Object(obj.clone());
    get_with_receiver(agent, obj, key, &receiver)
}

/// OrdinarySetWithOwnDescriptor. Returns false on every rejection case;
/// strict-mode callers convert false into a TypeError.
pub fn set_with_receiver(
    agent: &mut Agent,
    obj: &JsObjectRef,
    key: &PropertyKey,
    value: Value,
    receiver: &Value,
) -> Result<bool, EngineError> {
    let (own, proto) = {
        let b = obj.borrow();
        (b.get_own_property(key), b.prototype.clone())
    };

    let own = match own {
        Some(d) => d,
        None => match proto {
            Some(parent) => return set_with_receiver(agent, &parent, key, value, receiver),
            None => PropertyDescriptor::data(Value::Undefined),
        },
    };

    match own.kind {
        DescriptorKind::Data { writable, .. } => {
            if !writable {
                return Ok(false);
            }
            let Value::Object(receiver_obj) = receiver else {
                return Ok(false);
            };
            let existing = receiver_obj.borrow().get_own_property(key);
            match existing {
                Some(existing) => {
                    if existing.is_accessor() || !existing.is_writable() {
                        return Ok(false);
                    }
                    Ok(receiver_obj
                        .borrow_mut()
                        .define_own_property(key, &PartialDescriptor::value_only(value)))
                }
                None => Ok(create_data_property(receiver_obj, key, value)),
            }
        }
        DescriptorKind::Accessor { set, .. } => match set {
            Some(setter) => {
                crate::interpreter::call_function(
                    agent,
                    &setter,
                    receiver.clone(),
                    &[value],
                    Value::Undefined,
                )?;
                Ok(true)
            }
            None => Ok(false),
        },
    }
}

/// `[[Set]]` with the object itself as receiver.
pub fn set(
    agent: &mut Agent,
    obj: &JsObjectRef,
    key: &PropertyKey,
    value: Value,
) -> Result<bool, EngineError> {
    let receiver = Value::Object(obj.clone());
    set_with_receiver(agent, obj, key, value, &receiver)
}

/// CreateDataProperty: define with the default data attributes.
pub fn create_data_property(obj: &JsObjectRef, key: &PropertyKey, value: Value) -> bool {
    obj.borrow_mut()
        .define_own_property(key, &PartialDescriptor::data(value, true, true, true))
}

/// Convert a JS descriptor-shaped object into a partial descriptor.
pub fn to_property_descriptor(
    agent: &mut Agent,
    value: &Value,
) -> Result<PartialDescriptor, EngineError> {
    let Value::Object(obj) = value else {
        return Err(agent.type_error("Property description must be an object"));
    };
    let mut desc = PartialDescriptor::default();
    for (field, key) in [
        ("enumerable", PropertyKey::from("enumerable")),
        ("configurable", PropertyKey::from("configurable")),
        ("writable", PropertyKey::from("writable")),
    ] {
        if obj.borrow().has_property(&key) {
            let v = get(agent, obj, &key)?.to_boolean();
            match field {
                "enumerable" => desc.enumerable = Some(v),
                "configurable" => desc.configurable = Some(v),
                _ => desc.writable = Some(v),
            }
        }
    }
    let value_key = PropertyKey::from("value");
    if obj.borrow().has_property(&value_key) {
        desc.value = Some(get(agent, obj, &value_key)?);
    }
    for (is_get, key) in [(true, PropertyKey::from("get")), (false, PropertyKey::from("set"))] {
        if obj.borrow().has_property(&key) {
            let v = get(agent, obj, &key)?;
            let func = match &v {
                Value::Undefined => None,
                Value::Object(f) if f.borrow().is_callable() => Some(f.clone()),
                _ => {
                    return Err(agent.type_error("Getter/setter must be callable or undefined"));
                }
            };
            if is_get {
                desc.get = Some(func);
            } else {
                desc.set = Some(func);
            }
        }
    }
    if (desc.value.is_some() || desc.writable.is_some())
        && (desc.get.is_some() || desc.set.is_some())
    {
        return Err(agent.type_error(
            "Invalid property descriptor. Cannot both specify accessors and a value or writable attribute",
        ));
    }
    Ok(desc)
}

/// Convert an internal descriptor into a JS descriptor object.
pub fn from_property_descriptor(agent: &mut Agent, desc: &PropertyDescriptor) -> JsObjectRef {
    let obj = agent.create_object();
    match &desc.kind {
        DescriptorKind::Data { value, writable } => {
            create_data_property(&obj, &PropertyKey::from("value"), value.clone());
            create_data_property(&obj, &PropertyKey::from("writable"), Value::from(*writable));
        }
        DescriptorKind::Accessor { get, set } => {
            let g = get
                .as_ref()
                .map(|f| Value::Object(f.clone()))
                .unwrap_or(Value::Undefined);
            let s = set
                .as_ref()
                .map(|f| Value::Object(f.clone()))
                .unwrap_or(Value::Undefined);
            create_data_property(&obj, &PropertyKey::from("get"), g);
            create_data_property(&obj, &PropertyKey::from("set"), s);
        }
    }
    create_data_property(
        &obj,
        &PropertyKey::from("enumerable"),
        Value::from(desc.enumerable),
    );
    create_data_property(
        &obj,
        &PropertyKey::from("configurable"),
        Value::from(desc.configurable),
    );
    obj
}

/// OrdinaryHasInstance, the default `instanceof` behavior.
pub fn ordinary_has_instance(
    agent: &mut Agent,
    constructor: &Value,
    value: &Value,
) -> Result<bool, EngineError> {
    let Value::Object(ctor) = constructor else {
        return Err(agent.type_error("Right-hand side of 'instanceof' is not callable"));
    };
    if !ctor.borrow().is_callable() {
        return Err(agent.type_error("Right-hand side of 'instanceof' is not callable"));
    }
    if let Some(JsFunction::Bound(bound)) = ctor.borrow().function().cloned() {
        let target = Value::Object(bound.target.clone());
        return ordinary_has_instance(agent, &target, value);
    }
    let Value::Object(obj) = value else {
        return Ok(false);
    };
    let proto = get(agent, ctor, &PropertyKey::from("prototype"))?;
    let Value::Object(proto) = proto else {
        return Err(agent.type_error("Function has non-object prototype in instanceof check"));
    };
    let mut walk = obj.borrow().prototype.clone();
    while let Some(p) = walk {
        if Rc::ptr_eq(&p, &proto) {
            return Ok(true);
        }
        walk = p.borrow().prototype.clone();
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj() -> JsObject {
        JsObject::new(1, None)
    }

    #[test]
    fn test_define_and_read_back() {
        let mut o = obj();
        let ok = o.define_own_property(
            &PropertyKey::from("x"),
            &PartialDescriptor::data(Value::from(1.0), true, true, true),
        );
        assert!(ok);
        let desc = o.get_own_property(&PropertyKey::from("x")).unwrap();
        assert!(desc.is_data());
        assert!(desc.enumerable);
        assert_eq!(desc.value().unwrap().as_number(), Some(1.0));
    }

    #[test]
    fn test_define_rejects_on_non_extensible() {
        let mut o = obj();
        o.prevent_extensions();
        let ok = o.define_own_property(
            &PropertyKey::from("x"),
            &PartialDescriptor::value_only(Value::from(1.0)),
        );
        assert!(!ok);
    }

    #[test]
    fn test_non_configurable_cannot_widen() {
        let mut o = obj();
        assert!(o.define_own_property(
            &PropertyKey::from("x"),
            &PartialDescriptor::data(Value::from(1.0), false, false, false),
        ));
        // Re-configuring configurability is rejected.
        let mut desc = PartialDescriptor::default();
        desc.configurable = Some(true);
        assert!(!o.define_own_property(&PropertyKey::from("x"), &desc));
        // Changing the value of a non-writable data property is rejected.
        assert!(!o.define_own_property(
            &PropertyKey::from("x"),
            &PartialDescriptor::value_only(Value::from(2.0)),
        ));
        // Writing the same value is allowed.
        assert!(o.define_own_property(
            &PropertyKey::from("x"),
            &PartialDescriptor::value_only(Value::from(1.0)),
        ));
    }

    #[test]
    fn test_key_ordering() {
        let mut o = obj();
        for key in ["b", "2", "a", "0"] {
            o.define_own_property(
                &PropertyKey::from(key),
                &PartialDescriptor::data(Value::Undefined, true, true, true),
            );
        }
        let keys: Vec<String> = o
            .own_property_keys()
            .iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(keys, vec!["0", "2", "b", "a"]);
    }

    #[test]
    fn test_integrity_levels() {
        let mut o = obj();
        o.define_own_property(
            &PropertyKey::from("x"),
            &PartialDescriptor::data(Value::from(1.0), true, true, true),
        );
        o.set_integrity_level(IntegrityLevel::Sealed);
        assert!(o.test_integrity_level(IntegrityLevel::Sealed));
        assert!(!o.test_integrity_level(IntegrityLevel::Frozen));
        // Sealed still allows writes.
        let desc = o.get_own_property(&PropertyKey::from("x")).unwrap();
        assert!(desc.is_writable());

        o.set_integrity_level(IntegrityLevel::Frozen);
        assert!(o.test_integrity_level(IntegrityLevel::Frozen));
        let desc = o.get_own_property(&PropertyKey::from("x")).unwrap();
        assert!(!desc.is_writable());
        assert!(!desc.configurable);
    }

    #[test]
    fn test_frozen_array_length_is_pinned() {
        let mut a = JsObject::new(1, None);
        a.exotic = ExoticObject::Array {
            length: 0,
            length_writable: true,
        };
        for i in 0..3u32 {
            a.define_own_property(
                &PropertyKey::Index(i),
                &PartialDescriptor::data(Value::from(i), true, true, true),
            );
        }
        assert_eq!(a.array_length(), Some(3));

        a.set_integrity_level(IntegrityLevel::Frozen);
        assert!(a.test_integrity_level(IntegrityLevel::Frozen));
        let length_desc = a.get_own_property(&PropertyKey::from("length")).unwrap();
        assert!(!length_desc.is_writable());
        // Truncation through the length property is rejected.
        assert!(!a.define_own_property(
            &PropertyKey::from("length"),
            &PartialDescriptor::value_only(Value::from(1u32)),
        ));
        assert_eq!(a.array_length(), Some(3));

        // Sealing leaves the length adjustable.
        let mut b = JsObject::new(2, None);
        b.exotic = ExoticObject::Array {
            length: 0,
            length_writable: true,
        };
        b.define_own_property(
            &PropertyKey::Index(0),
            &PartialDescriptor::data(Value::from(1.0), true, true, true),
        );
        b.set_integrity_level(IntegrityLevel::Sealed);
        assert!(b.test_integrity_level(IntegrityLevel::Sealed));
        assert!(b.define_own_property(
            &PropertyKey::from("length"),
            &PartialDescriptor::value_only(Value::from(0u32)),
        ));
        assert_eq!(b.array_length(), Some(0));
    }

    #[test]
    fn test_delete_non_configurable() {
        let mut o = obj();
        o.define_own_property(
            &PropertyKey::from("x"),
            &PartialDescriptor::data(Value::from(1.0), true, true, false),
        );
        assert!(!o.delete(&PropertyKey::from("x")));
        assert!(o.has_own_property(&PropertyKey::from("x")));
        assert!(o.delete(&PropertyKey::from("missing")));
    }

    #[test]
    fn test_indexed_storage_goes_sparse() {
        let mut storage = IndexedStorage::new();
        storage.set(100_000, PropertyDescriptor::data(Value::from(1.0)));
        assert!(matches!(storage, IndexedStorage::Sparse(_)));
        assert_eq!(storage.array_like_size(), 100_001);
        assert_eq!(storage.keys(), vec![100_000]);
    }

    #[test]
    fn test_data_to_accessor_transition_keeps_attributes() {
        let current = PropertyDescriptor {
            kind: DescriptorKind::Data {
                value: Value::from(1.0),
                writable: true,
            },
            enumerable: true,
            configurable: true,
        };
        let mut incoming = PartialDescriptor::default();
        incoming.get = Some(None);
        let merged = validate_and_apply(Some(&current), true, &incoming).unwrap();
        assert!(merged.is_accessor());
        assert!(merged.enumerable);
        assert!(merged.configurable);
    }
}
