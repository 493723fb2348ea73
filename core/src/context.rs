//! # Generation Context
//!
//! The state threaded through lowering of one operation: the shared arena, a
//! read-only global scope, the operation's local scope, and the skip policy
//! that decides whether a recoverable error drops an entity or aborts.

use crate::error::{AppError, AppResult};
use crate::ir::{self, Checkpoint, Type, TypeArena, TypeId};
use crate::options::{ContentTypeAliases, NotImplementedHook};
use crate::spec::{Location, SchemaArena};
use crate::storage::{Storage, WrappedKey};
use tracing::info;

/// Decides what happens to recoverable errors.
#[derive(Debug, Default)]
pub struct SkipPolicy {
    ignore: Vec<String>,
    hook: Option<NotImplementedHook>,
}

impl SkipPolicy {
    /// A policy swallowing the `ignore` names (`all` matches everything).
    pub fn new(ignore: Vec<String>, hook: Option<NotImplementedHook>) -> Self {
        Self { ignore, hook }
    }

    /// Returns `Ok` when `err` is recoverable and ignored, `Err(err)` otherwise.
    ///
    /// The hook sees every recoverable error, ignored or not.
    pub fn fail(&mut self, err: AppError) -> AppResult<()> {
        let Some(name) = err.skip_name() else {
            return Err(err);
        };
        if let Some(NotImplementedHook(hook)) = &mut self.hook {
            hook(name, &err);
        }
        let ignored = self.ignore.iter().any(|n| n == "all" || n == name);
        if ignored {
            Ok(())
        } else {
            Err(err)
        }
    }

    /// Like [`SkipPolicy::fail`], logging `msg` when the error is swallowed.
    pub fn try_skip(&mut self, err: AppError, msg: &str, location: &Location) -> AppResult<()> {
        let reason = err.inner().to_string();
        self.fail(err)?;
        info!(location = %location, reason_error = %reason, "{msg}");
        Ok(())
    }
}

/// Knobs the lowerers read.
#[derive(Debug, Clone)]
pub struct LowerOptions {
    /// Maximum schema nesting.
    pub depth_limit: usize,
    /// Content type overrides.
    pub content_type_aliases: ContentTypeAliases,
    /// Default responses are handled by the shared error type.
    pub skip_default_response: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            depth_limit: 1000,
            content_type_aliases: ContentTypeAliases::default(),
            skip_default_response: false,
        }
    }
}

/// Snapshot of a context, for dropping a failed entity without artifacts.
#[derive(Debug)]
pub struct Savepoint {
    local: Storage,
    arena: Checkpoint,
}

/// Lowering context of one operation.
pub struct GenCtx<'a> {
    /// Type nodes.
    pub arena: &'a mut TypeArena,
    /// Document schemas.
    pub schemas: &'a SchemaArena,
    /// Committed scope.
    pub global: &'a Storage,
    /// Scope of the operation being lowered.
    pub local: Storage,
    /// Recoverable error handling.
    pub policy: &'a mut SkipPolicy,
    /// Lowering knobs.
    pub opts: &'a LowerOptions,
}

impl<'a> GenCtx<'a> {
    /// A context with an empty local scope.
    pub fn new(
        arena: &'a mut TypeArena,
        schemas: &'a SchemaArena,
        global: &'a Storage,
        policy: &'a mut SkipPolicy,
        opts: &'a LowerOptions,
    ) -> Self {
        Self {
            arena,
            schemas,
            global,
            local: Storage::new(),
            policy,
            opts,
        }
    }

    /// Consumes the context, returning the local scope.
    pub fn into_local(self) -> Storage {
        self.local
    }

    /// Allocates a node.
    pub fn alloc(&mut self, t: Type) -> TypeId {
        self.arena.alloc(t)
    }

    /// Allocates a nominal node and registers it in the local scope.
    pub fn alloc_saved(&mut self, t: Type) -> AppResult<TypeId> {
        let id = self.arena.alloc(t);
        self.save_type(id)?;
        Ok(id)
    }

    /// Registers a nominal type locally.
    pub fn save_type(&mut self, id: TypeId) -> AppResult<()> {
        self.local.save_type(self.arena, id)
    }

    /// Registers a shared type locally.
    pub fn save_ref(&mut self, reference: &str, id: TypeId) -> AppResult<()> {
        self.local.save_ref(self.arena, reference, id)
    }

    /// Registers a shared response locally.
    pub fn save_response(&mut self, reference: &str, response: ir::Response) -> AppResult<()> {
        self.local.save_response(reference, response)
    }

    /// Registers a wrapped response type locally.
    pub fn save_wtype(&mut self, key: WrappedKey, id: TypeId) -> AppResult<()> {
        self.local.save_wtype(self.arena, key, id)
    }

    /// Shared type of a schema `$ref`, global scope first.
    pub fn lookup_ref(&self, reference: &str) -> Option<TypeId> {
        self.global
            .refs
            .get(reference)
            .or_else(|| self.local.refs.get(reference))
            .copied()
    }

    /// Nominal type by name, global scope first.
    pub fn lookup_type(&self, name: &str) -> Option<TypeId> {
        self.global
            .lookup_type(name)
            .or_else(|| self.local.lookup_type(name))
    }

    /// Shared response by `$ref`, global scope first.
    pub fn lookup_response(&self, reference: &str) -> Option<&ir::Response> {
        self.global
            .responses
            .get(reference)
            .or_else(|| self.local.responses.get(reference))
    }

    /// Wrapped type, global scope first.
    pub fn lookup_wtype(&self, key: &WrappedKey) -> Option<TypeId> {
        self.global
            .wtypes
            .get(key)
            .or_else(|| self.local.wtypes.get(key))
            .copied()
    }

    /// Records the current state.
    pub fn savepoint(&self) -> Savepoint {
        Savepoint {
            local: self.local.clone(),
            arena: self.arena.checkpoint(),
        }
    }

    /// Returns to `sp`, dropping everything created since.
    pub fn restore(&mut self, sp: Savepoint) {
        self.local = sp.local;
        self.arena.rollback(sp.arena);
    }

    /// Runs `f`; on a swallowed recoverable error, drops what it created and
    /// returns `None`.
    pub fn skippable<T>(
        &mut self,
        msg: &str,
        location: &Location,
        f: impl FnOnce(&mut Self) -> AppResult<T>,
    ) -> AppResult<Option<T>> {
        let sp = self.savepoint();
        match f(self) {
            Ok(v) => Ok(Some(v)),
            Err(err) => {
                self.restore(sp);
                self.policy.try_skip(err, msg, location)?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Kind, PrimitiveType};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_fail_ignore_list() {
        let mut policy = SkipPolicy::new(vec!["complex anyOf".into()], None);
        assert!(policy.fail(AppError::not_implemented("complex anyOf")).is_ok());
        assert!(policy.fail(AppError::not_implemented("allOf")).is_err());
        assert!(policy.fail(AppError::NameConflict("X".into())).is_err());

        let mut all = SkipPolicy::new(vec!["all".into()], None);
        assert!(all
            .fail(AppError::UnsupportedContentTypes(vec!["image/png".into()]))
            .is_ok());
        assert!(all.fail(AppError::DepthExceeded(3)).is_err());
    }

    #[test]
    fn test_hook_sees_every_recoverable_error() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let hook = NotImplementedHook(Box::new(move |name: &str, _: &AppError| {
            sink.borrow_mut().push(name.to_string());
        }));
        let mut policy = SkipPolicy::new(Vec::new(), Some(hook));
        let _ = policy.fail(AppError::not_implemented("cookie parameters"));
        let _ = policy.fail(AppError::FieldsDiscriminatorInference(vec!["A".into()]));
        let _ = policy.fail(AppError::General("fatal".into()));
        assert_eq!(
            *seen.borrow(),
            vec!["cookie parameters", "discriminator inference"]
        );
    }

    #[test]
    fn test_skippable_leaves_no_artifacts() {
        let mut arena = TypeArena::new();
        let schemas = SchemaArena::new();
        let global = Storage::new();
        let mut policy = SkipPolicy::new(vec!["all".into()], None);
        let opts = LowerOptions::default();
        let mut ctx = GenCtx::new(&mut arena, &schemas, &global, &mut policy, &opts);

        let kept = ctx.alloc_saved(Type::new("Kept", Kind::empty_struct())).unwrap();
        let out = ctx
            .skippable("Skipping parameter", &Location::default(), |ctx| {
                ctx.alloc_saved(Type::new("Dropped", Kind::empty_struct()))?;
                ctx.alloc(Type::primitive(PrimitiveType::Int, None));
                Err::<(), _>(AppError::not_implemented("cookie parameters"))
            })
            .unwrap();
        assert!(out.is_none());
        assert_eq!(ctx.lookup_type("Kept"), Some(kept));
        assert!(ctx.lookup_type("Dropped").is_none());
        assert_eq!(ctx.arena.len(), 1);
    }
}
