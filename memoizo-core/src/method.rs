//! # Method Memoization
//!
//! A [`MethodMemo`] is built once per receiver type and shared by all its instances.
//! [`MethodMemo::bind`] yields a [`BoundMethod`] for one receiver; calls through it put
//! the receiver in front of the arguments, compared by identity. Two receivers with equal
//! fields therefore never share entries. [`MethodMemo::unbound`] runs the method without
//! consulting the cache.
//!
//! ```
//! use std::convert::Infallible;
//! use std::sync::Arc;
//! use memoizo_core::{BoundMethod, MemoOptions, MemoRegistry, MethodMemo};
//!
//! struct Grid {
//!     edge: u64,
//! }
//!
//! type Paths<'a> = BoundMethod<'a, Grid, (u64, u64), u64, Infallible>;
//!
//! fn paths(grid: &Paths<'_>, (x, y): (u64, u64)) -> Result<u64, Infallible> {
//!     if x == 0 || y == 0 {
//!         return Ok(grid.receiver().edge);
//!     }
//!     Ok(grid.call((x - 1, y))? + grid.call((x, y - 1))?)
//! }
//!
//! let registry = MemoRegistry::new();
//! let method = MethodMemo::new(&registry, paths, MemoOptions::default()).unwrap();
//!
//! let grid = Arc::new(Grid { edge: 1 });
//! assert_eq!(method.bind(&grid).call((16, 16)), Ok(601_080_390));
//! assert_eq!(method.name(), "paths");
//! ```

use std::fmt;
use std::sync::Arc;

use crate::keys::{Arguments, Component, InstanceRef, KeyPart, Kwargs};
use crate::memo::Memo;
use crate::options::MemoOptions;
use crate::registry::MemoRegistry;
use crate::utils::callable_name;
use crate::MemoError;

/// Argument set of a method call: the receiver followed by the method's own arguments.
pub struct Receiver<S, A> {
    instance: Arc<S>,
    args: A,
}

impl<S, A> Receiver<S, A> {
    pub fn new(instance: Arc<S>, args: A) -> Self {
        Self { instance, args }
    }

    pub fn instance(&self) -> &Arc<S> {
        &self.instance
    }

    pub fn args(&self) -> &A {
        &self.args
    }
}

impl<S, A> Arguments for Receiver<S, A>
where
    S: Send + Sync + 'static,
    A: Arguments,
{
    fn positional(&self) -> Vec<Component> {
        let rest = self.args.positional();
        let mut parts = Vec::with_capacity(rest.len() + 1);
        parts.push(Component::Direct(KeyPart::Instance(InstanceRef::new(
            &self.instance,
        ))));
        parts.extend(rest);
        parts
    }

    fn keywords(&self) -> Option<&Kwargs> {
        self.args.keywords()
    }
}

impl<S, A: fmt::Debug> fmt::Debug for Receiver<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("instance", &InstanceAddr(Arc::as_ptr(&self.instance) as *const ()))
            .field("args", &self.args)
            .finish()
    }
}

struct InstanceAddr(*const ());

impl fmt::Debug for InstanceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:p}", self.0)
    }
}

type MethodFn<S, A, R, E> =
    dyn Fn(&BoundMethod<'_, S, A, R, E>, A) -> Result<R, E> + Send + Sync;

/// A memoized method, shared across all receivers of type `S`.
pub struct MethodMemo<S, A, R, E> {
    memo: Arc<Memo<Receiver<S, A>, R, E>>,
    method: Arc<MethodFn<S, A, R, E>>,
}

impl<S, A, R, E> MethodMemo<S, A, R, E>
where
    S: Send + Sync + 'static,
    A: Arguments + 'static,
    R: Clone + Send + 'static,
    E: 'static,
{
    /// Wraps `method` and registers it in `registry`.
    ///
    /// # Errors
    ///
    /// [`MemoError::DuplicateRegistration`] if the slot name is taken.
    pub fn new<F>(registry: &MemoRegistry, method: F, options: MemoOptions) -> Result<Self, MemoError>
    where
        F: Fn(&BoundMethod<'_, S, A, R, E>, A) -> Result<R, E> + Send + Sync + 'static,
    {
        let name = match options.explicit_name() {
            Some(name) => name.to_owned(),
            None => callable_name::<F>(),
        };

        let method: Arc<MethodFn<S, A, R, E>> = Arc::new(method);
        let wrapped = Arc::clone(&method);
        let memo = Memo::new(
            registry,
            move |memo: &Memo<Receiver<S, A>, R, E>, call: Receiver<S, A>| {
                let bound = BoundMethod {
                    memo,
                    instance: &call.instance,
                };
                wrapped(&bound, call.args)
            },
            options.name(name),
        )?;

        Ok(Self { memo, method })
    }

    /// Binds the method to one receiver.
    pub fn bind<'a>(&'a self, instance: &'a Arc<S>) -> BoundMethod<'a, S, A, R, E> {
        BoundMethod {
            memo: &self.memo,
            instance,
        }
    }

    /// Runs the method for `instance` without reading or writing the cache.
    ///
    /// The call itself is invisible to the wrapper: it does not count toward the depth
    /// and never triggers an auto-clear. Calls the method makes through its binding are
    /// ordinary memoized calls.
    pub fn unbound(&self, instance: &Arc<S>, args: A) -> Result<R, E> {
        (self.method)(&self.bind(instance), args)
    }

    /// The shared wrapper behind every binding.
    pub fn memo(&self) -> &Arc<Memo<Receiver<S, A>, R, E>> {
        &self.memo
    }

    pub fn name(&self) -> &str {
        self.memo.name()
    }

    pub fn clear(&self) -> usize {
        self.memo.clear()
    }

    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }
}

/// A memoized method bound to one receiver.
pub struct BoundMethod<'a, S, A, R, E> {
    memo: &'a Memo<Receiver<S, A>, R, E>,
    instance: &'a Arc<S>,
}

impl<'a, S, A, R, E> BoundMethod<'a, S, A, R, E>
where
    S: Send + Sync + 'static,
    A: Arguments + 'static,
    R: Clone + Send + 'static,
    E: 'static,
{
    /// Calls the method on the bound receiver through the cache.
    pub fn call(&self, args: A) -> Result<R, E> {
        self.memo.call(Receiver::new(Arc::clone(self.instance), args))
    }
}

impl<'a, S, A, R, E> BoundMethod<'a, S, A, R, E> {
    pub fn receiver(&self) -> &'a S {
        self.instance
    }

    pub fn instance(&self) -> &'a Arc<S> {
        self.instance
    }
}
