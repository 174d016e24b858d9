//! Environment records
//!
//! Lexical scopes form a singly-linked chain of records held in an arena
//! and referenced by `EnvId` indices. Indices instead of `Rc<Environment>`
//! keep closure-captured chains from forming reference cycles; a capture
//! count tracks whether a record may be reused when its activation pops it.
//!
//! Declarative records are slot-indexed: the compiler resolves every
//! binding to a `(slot, distance)` pair, so lookups never hash names. The
//! global record is backed by the realm's global object plus a name-keyed
//! map for top-level lexical declarations.

use rustc_hash::FxHashMap;

use crate::object::JsObjectRef;
use crate::value::{CheapClone, JsString, Value};

/// Environment identifier: an index into the agent's environment arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId(pub usize);

/// A lexical binding installed by a top-level `let`/`const`.
#[derive(Debug, Clone)]
pub struct GlobalLexical {
    pub value: Value,
    pub mutable: bool,
}

/// Result of classifying a global name lookup.
#[derive(Debug, Clone)]
pub enum GlobalLookup {
    Lexical(GlobalLexical),
    ObjectProperty,
    Unresolvable,
}

/// An import binding points into the exporting module's environment and is
/// dereferenced on every read, so re-assignments in the exporting module
/// stay visible.
#[derive(Debug, Clone, Copy)]
pub struct ImportBinding {
    pub env: EnvId,
    pub slot: u32,
}

#[derive(Debug)]
pub enum EnvKind {
    /// Fixed-size slot array; slots start `Empty` to model the TDZ.
    Declarative { slots: Vec<Value> },
    /// Global environment: object-backed names plus lexical declarations.
    Object {
        object: JsObjectRef,
        lexicals: FxHashMap<JsString, GlobalLexical>,
    },
    /// Module root: declarative slots plus lazily-resolved imports.
    Module {
        slots: Vec<Value>,
        imports: FxHashMap<u32, ImportBinding>,
    },
}

#[derive(Debug)]
pub struct Environment {
    pub kind: EnvKind,
    pub outer: Option<EnvId>,
    /// Number of closures pinning this record alive.
    capture_count: usize,
}

/// Arena owning every environment record in the agent.
#[derive(Debug, Default)]
pub struct EnvironmentArena {
    envs: Vec<Environment>,
    free_list: Vec<usize>,
}

impl EnvironmentArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, kind: EnvKind, outer: Option<EnvId>) -> EnvId {
        let env = Environment {
            kind,
            outer,
            capture_count: 0,
        };
        if let Some(id) = self.free_list.pop() {
            self.envs[id] = env;
            EnvId(id)
        } else {
            let id = self.envs.len();
            self.envs.push(env);
            EnvId(id)
        }
    }

    pub fn alloc_declarative(&mut self, slot_count: u32, outer: Option<EnvId>) -> EnvId {
        self.alloc(
            EnvKind::Declarative {
                slots: vec![Value::Empty; slot_count as usize],
            },
            outer,
        )
    }

    pub fn alloc_module(&mut self, slot_count: u32, outer: Option<EnvId>) -> EnvId {
        self.alloc(
            EnvKind::Module {
                slots: vec![Value::Empty; slot_count as usize],
                imports: FxHashMap::default(),
            },
            outer,
        )
    }

    pub fn alloc_global(&mut self, object: JsObjectRef) -> EnvId {
        self.alloc(
            EnvKind::Object {
                object,
                lexicals: FxHashMap::default(),
            },
            None,
        )
    }

    pub fn get(&self, id: EnvId) -> &Environment {
        &self.envs[id.0]
    }

    pub fn get_mut(&mut self, id: EnvId) -> &mut Environment {
        &mut self.envs[id.0]
    }

    pub fn outer(&self, id: EnvId) -> Option<EnvId> {
        self.envs[id.0].outer
    }

    /// Walk `distance` outer links.
    pub fn ancestor(&self, id: EnvId, distance: u32) -> EnvId {
        let mut current = id;
        for _ in 0..distance {
            current = self.envs[current.0]
                .outer
                .expect("env distance exceeds chain length");
        }
        current
    }

    /// Read a slot at the given distance. Returns `Empty` for bindings still
    /// in the temporal dead zone; the caller turns that into a throw.
    pub fn get_slot(&self, id: EnvId, slot: u32, distance: u32) -> Value {
        let target = self.ancestor(id, distance);
        match &self.envs[target.0].kind {
            EnvKind::Declarative { slots } => slots[slot as usize].clone(),
            EnvKind::Module { slots, imports } => match imports.get(&slot) {
                Some(import) => self.get_slot(import.env, import.slot, 0),
                None => slots[slot as usize].clone(),
            },
            EnvKind::Object { .. } => Value::Empty,
        }
    }

    pub fn set_slot(&mut self, id: EnvId, slot: u32, distance: u32, value: Value) {
        let target = self.ancestor(id, distance);
        match &mut self.envs[target.0].kind {
            EnvKind::Declarative { slots } | EnvKind::Module { slots, .. } => {
                slots[slot as usize] = value;
            }
            EnvKind::Object { .. } => {}
        }
    }

    /// Register an import binding in a module environment.
    pub fn add_import(&mut self, id: EnvId, slot: u32, binding: ImportBinding) {
        if let EnvKind::Module { imports, .. } = &mut self.envs[id.0].kind {
            imports.insert(slot, binding);
        }
    }

    // ─── capture accounting ────────────────────────────────────────────────

    /// Pin a chain alive because a closure captured it.
    pub fn increment_capture(&mut self, id: EnvId) {
        let mut current = Some(id);
        while let Some(env_id) = current {
            let env = &mut self.envs[env_id.0];
            env.capture_count = env.capture_count.saturating_add(1);
            current = env.outer;
        }
    }

    pub fn decrement_capture(&mut self, id: EnvId) {
        let mut current = Some(id);
        while let Some(env_id) = current {
            let env = &mut self.envs[env_id.0];
            env.capture_count = env.capture_count.saturating_sub(1);
            current = env.outer;
        }
    }

    /// Release a record when the creating activation leaves it, unless a
    /// closure still pins it.
    pub fn try_free(&mut self, id: EnvId) -> bool {
        let env = &self.envs[id.0];
        if env.capture_count > 0 || matches!(env.kind, EnvKind::Object { .. }) {
            return false;
        }
        self.envs[id.0] = Environment {
            kind: EnvKind::Declarative { slots: Vec::new() },
            outer: None,
            capture_count: 0,
        };
        self.free_list.push(id.0);
        true
    }

    // ─── global (name-keyed) operations ────────────────────────────────────

    fn global_parts(&self, id: EnvId) -> (&JsObjectRef, &FxHashMap<JsString, GlobalLexical>) {
        match &self.envs[id.0].kind {
            EnvKind::Object { object, lexicals } => (object, lexicals),
            _ => panic!("global operation on non-global environment"),
        }
    }

    pub fn global_object(&self, id: EnvId) -> JsObjectRef {
        self.global_parts(id).0.clone()
    }

    pub fn has_binding(&self, id: EnvId, name: &JsString) -> bool {
        let (object, lexicals) = self.global_parts(id);
        if lexicals.contains_key(name) {
            return true;
        }
        object
            .borrow()
            .has_property(&crate::object::PropertyKey::from(name.cheap_clone()))
    }

    /// Classify a global name. The interpreter performs the actual object
    /// `[[Get]]`/`[[Set]]` (those may run accessors and need the agent).
    pub fn classify_global(&self, id: EnvId, name: &JsString) -> GlobalLookup {
        let (object, lexicals) = self.global_parts(id);
        if let Some(lexical) = lexicals.get(name) {
            return GlobalLookup::Lexical(lexical.clone());
        }
        let key = crate::object::PropertyKey::from(name.cheap_clone());
        if object.borrow().has_property(&key) {
            return GlobalLookup::ObjectProperty;
        }
        GlobalLookup::Unresolvable
    }

    /// Whether a lexical (declarative-part) global binding exists.
    pub fn has_lexical_binding(&self, id: EnvId, name: &JsString) -> bool {
        self.global_parts(id).1.contains_key(name)
    }

    pub fn lexical_binding(&self, id: EnvId, name: &JsString) -> Option<GlobalLexical> {
        self.global_parts(id).1.get(name).cloned()
    }

    pub fn declare_global_lexical(&mut self, id: EnvId, name: JsString, mutable: bool) {
        if let EnvKind::Object { lexicals, .. } = &mut self.envs[id.0].kind {
            lexicals.insert(
                name,
                GlobalLexical {
                    value: Value::Empty,
                    mutable,
                },
            );
        }
    }

    pub fn set_global_lexical(&mut self, id: EnvId, name: &JsString, value: Value) {
        if let EnvKind::Object { lexicals, .. } = &mut self.envs[id.0].kind {
            if let Some(lexical) = lexicals.get_mut(name) {
                lexical.value = value;
            }
        }
    }

    /// "Restricted global": an own, non-configurable property of the global
    /// object, which a lexical declaration must not shadow.
    pub fn has_restricted_global_property(&self, id: EnvId, name: &JsString) -> bool {
        let (object, _) = self.global_parts(id);
        match object
            .borrow()
            .get_own_property(&crate::object::PropertyKey::from(name.cheap_clone()))
        {
            Some(desc) => !desc.configurable,
            None => false,
        }
    }

    pub fn can_declare_global_var(&self, id: EnvId, name: &JsString) -> bool {
        let (object, _) = self.global_parts(id);
        let object = object.borrow();
        object.has_own_property(&crate::object::PropertyKey::from(name.cheap_clone()))
            || object.is_extensible()
    }

    pub fn can_declare_global_function(&self, id: EnvId, name: &JsString) -> bool {
        let (object, _) = self.global_parts(id);
        let object = object.borrow();
        match object.get_own_property(&crate::object::PropertyKey::from(name.cheap_clone())) {
            None => object.is_extensible(),
            Some(desc) => {
                desc.configurable
                    || (desc.is_data() && desc.is_writable() && desc.enumerable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_access_through_distance() {
        let mut arena = EnvironmentArena::new();
        let outer = arena.alloc_declarative(2, None);
        let inner = arena.alloc_declarative(1, Some(outer));

        arena.set_slot(outer, 1, 0, Value::from(42.0));
        assert_eq!(arena.get_slot(inner, 1, 1).as_number(), Some(42.0));

        arena.set_slot(inner, 0, 0, Value::from("x"));
        assert_eq!(arena.get_slot(inner, 0, 0).as_str(), Some("x"));
    }

    #[test]
    fn test_tdz_reads_return_empty() {
        let mut arena = EnvironmentArena::new();
        let env = arena.alloc_declarative(1, None);
        assert!(arena.get_slot(env, 0, 0).is_empty());
        arena.set_slot(env, 0, 0, Value::Undefined);
        assert!(!arena.get_slot(env, 0, 0).is_empty());
    }

    #[test]
    fn test_captured_env_is_not_freed() {
        let mut arena = EnvironmentArena::new();
        let outer = arena.alloc_declarative(1, None);
        let inner = arena.alloc_declarative(1, Some(outer));

        arena.increment_capture(inner);
        assert!(!arena.try_free(inner));
        assert!(!arena.try_free(outer));

        arena.decrement_capture(inner);
        assert!(arena.try_free(inner));
        assert!(arena.try_free(outer));

        // Freed ids are reused.
        let reused = arena.alloc_declarative(3, None);
        assert!(reused == inner || reused == outer);
    }

    #[test]
    fn test_module_import_binding_is_live() {
        let mut arena = EnvironmentArena::new();
        let exporter = arena.alloc_module(1, None);
        let importer = arena.alloc_module(1, None);
        arena.add_import(importer, 0, ImportBinding { env: exporter, slot: 0 });

        arena.set_slot(exporter, 0, 0, Value::from(1.0));
        assert_eq!(arena.get_slot(importer, 0, 0).as_number(), Some(1.0));

        arena.set_slot(exporter, 0, 0, Value::from(2.0));
        assert_eq!(arena.get_slot(importer, 0, 0).as_number(), Some(2.0));
    }
}
