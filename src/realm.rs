//! Realms
//!
//! A realm owns the intrinsics (built-in prototypes and constructors), a
//! global object, a global environment, the well-known symbol registry, and
//! the module resolver hook. Several realms may share one agent.

use std::cell::{OnceCell, RefCell};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::env::EnvId;
use crate::object::JsObjectRef;
use crate::value::{JsString, JsSymbol};

/// The intrinsic objects of a realm, created once in topological order
/// during realm setup and never replaced afterwards.
#[derive(Clone)]
pub struct Intrinsics {
    pub object_prototype: JsObjectRef,
    pub function_prototype: JsObjectRef,
    pub array_prototype: JsObjectRef,
    pub string_prototype: JsObjectRef,
    pub number_prototype: JsObjectRef,
    pub boolean_prototype: JsObjectRef,
    pub bigint_prototype: JsObjectRef,
    pub symbol_prototype: JsObjectRef,
    pub error_prototype: JsObjectRef,
    pub type_error_prototype: JsObjectRef,
    pub reference_error_prototype: JsObjectRef,
    pub range_error_prototype: JsObjectRef,
    pub syntax_error_prototype: JsObjectRef,
    pub uri_error_prototype: JsObjectRef,
    pub eval_error_prototype: JsObjectRef,
    pub iterator_prototype: JsObjectRef,
    pub array_iterator_prototype: JsObjectRef,
    pub generator_prototype: JsObjectRef,
    pub promise_prototype: JsObjectRef,
}

/// Well-known symbols, allocated from the agent's symbol counter at realm
/// creation.
#[derive(Clone)]
pub struct WellKnownSymbols {
    pub iterator: JsSymbol,
    pub to_primitive: JsSymbol,
    pub to_string_tag: JsSymbol,
    pub has_instance: JsSymbol,
}

/// Source returned by a module resolver.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub name: String,
    pub text: String,
    pub is_module: bool,
}

/// Host hook: map an import specifier (relative to a referrer) to source.
pub trait ModuleResolver {
    fn resolve(&mut self, specifier: &str, referrer: &str) -> Result<SourceInfo, String>;
}

/// Evaluation status of a module, for cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    Evaluating,
    Evaluated,
}

/// An instantiated module: its root environment and its named exports,
/// each a slot in that environment. The environment id is filled in when
/// the module prologue executes its `PushModuleEnvRecord`.
pub struct ModuleRecord {
    pub name: String,
    pub env: std::cell::Cell<EnvId>,
    pub exports: RefCell<FxHashMap<JsString, u32>>,
    pub status: RefCell<ModuleStatus>,
}

pub struct Realm {
    intrinsics: OnceCell<Intrinsics>,
    global_object: OnceCell<JsObjectRef>,
    global_env: OnceCell<EnvId>,
    pub well_known: WellKnownSymbols,
    pub module_resolver: RefCell<Option<Box<dyn ModuleResolver>>>,
    pub modules: RefCell<FxHashMap<String, Rc<ModuleRecord>>>,
}

impl Realm {
    /// A realm shell; `builtins::install` populates the intrinsics and the
    /// global before anything runs in it.
    pub fn new(well_known: WellKnownSymbols) -> Rc<Self> {
        Rc::new(Self {
            intrinsics: OnceCell::new(),
            global_object: OnceCell::new(),
            global_env: OnceCell::new(),
            well_known,
            module_resolver: RefCell::new(None),
            modules: RefCell::new(FxHashMap::default()),
        })
    }

    pub fn init(&self, intrinsics: Intrinsics, global_object: JsObjectRef, global_env: EnvId) {
        if self.intrinsics.set(intrinsics).is_err() {
            panic!("realm initialized twice");
        }
        let _ = self.global_object.set(global_object);
        let _ = self.global_env.set(global_env);
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        self.intrinsics.get().expect("realm not initialized")
    }

    pub fn global_object(&self) -> JsObjectRef {
        self.global_object
            .get()
            .expect("realm not initialized")
            .clone()
    }

    pub fn global_env(&self) -> EnvId {
        *self.global_env.get().expect("realm not initialized")
    }

    pub fn set_module_resolver(&self, resolver: Box<dyn ModuleResolver>) {
        *self.module_resolver.borrow_mut() = Some(resolver);
    }
}

impl std::fmt::Debug for Realm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Realm")
            .field("initialized", &self.intrinsics.get().is_some())
            .finish()
    }
}
