use std::any::type_name;
use std::fmt;
use std::ptr::{self, NonNull};

use crate::{
    AppendArgs, CallableInterface, CaptureFirst, CaptureLast, ContainerKind, Error,
    FunctionPools, FunctorContainer, Invoke, MemberContainer, MethodFn, PooledContainer,
    PrependArgs, Result, StaticContainer, StaticFn,
};

/// A reference-counted handle to a callable stored in a pool slot.
///
/// `Args` is the tuple of arguments the callable takes and `R` is what it returns, so a
/// `Function<'a, (u32, bool), u8>` stands for `fn(u32, bool) -> u8`. The callable may be a plain
/// function pointer ([`from_fn()`][Self::from_fn]), a method bound to an object
/// ([`from_method()`][Self::from_method]), a small closure
/// ([`from_closure()`][Self::from_closure]) or another handle with some arguments already
/// supplied ([`bind_first()`][Self::bind_first] and [`bind_last()`][Self::bind_last]).
///
/// Cloning a handle only increments a reference count and dropping it only decrements one, so
/// both are constant-time and safe to do from interrupt context. When the last handle is
/// dropped, the callable is dropped and its slot goes back to the pool it came from.
///
/// A handle may also be empty, which is its [`Default`] state. Calling an empty handle panics.
///
/// # Examples
///
/// ```
/// use pooled_fn::{Function, FunctionPools};
///
/// fn add(a: i32, b: i32) -> i32 {
///     a + b
/// }
///
/// let pools = FunctionPools::new();
///
/// let add = Function::from_fn(&pools, add as fn(i32, i32) -> i32);
/// assert_eq!(add.call((2, 3)), 5);
///
/// let add_ten = add.bind_first((10,));
/// assert_eq!(add_ten.call((5,)), 15);
///
/// let offset = 100;
/// let shifted = Function::from_closure(&pools, move |value: i32| value + offset);
/// assert_eq!(shifted.call((1,)), 101);
/// ```
pub struct Function<'a, Args, R = ()> {
    target: Option<NonNull<dyn CallableInterface<'a, Args, R> + 'a>>,
}

impl<'a, Args, R> Function<'a, Args, R> {
    /// Creates an empty handle that refers to no callable.
    #[must_use]
    #[inline]
    pub const fn empty() -> Self {
        Self { target: None }
    }

    /// Creates a handle to a plain function pointer, stored in the static pool.
    ///
    /// Function items have to be cast to a function pointer type first, for example
    /// `add as fn(i32, i32) -> i32`.
    ///
    /// # Errors
    ///
    /// Returns an error if the static pool has no vacant slot and cannot grow.
    pub fn try_from_fn<P>(pools: &'a FunctionPools, function: P) -> Result<Self>
    where
        P: StaticFn<Args, R> + 'a,
    {
        Self::allocate(StaticContainer::new(pools, function))
    }

    /// Creates a handle to a plain function pointer, stored in the static pool.
    ///
    /// # Panics
    ///
    /// Panics if the static pool has no vacant slot and cannot grow.
    #[must_use]
    pub fn from_fn<P>(pools: &'a FunctionPools, function: P) -> Self
    where
        P: StaticFn<Args, R> + 'a,
    {
        Self::try_from_fn(pools, function)
            .unwrap_or_else(|error| allocation_failed(ContainerKind::Static, &error))
    }

    /// Creates a handle that calls `method` on `object`, stored in the member pool.
    ///
    /// The object is borrowed for as long as any handle to the callable exists. Methods have to
    /// be cast to a function pointer type first, for example
    /// `Counter::add as fn(&Counter, u32) -> u32`.
    ///
    /// # Errors
    ///
    /// Returns an error if the member pool has no vacant slot and cannot grow.
    pub fn try_from_method<C, M>(
        pools: &'a FunctionPools,
        object: &'a C,
        method: M,
    ) -> Result<Self>
    where
        C: ?Sized + Sync + 'a,
        M: MethodFn<C, Args, R> + 'a,
    {
        Self::allocate(MemberContainer::new(pools, object, method))
    }

    /// Creates a handle that calls `method` on `object`, stored in the member pool.
    ///
    /// # Panics
    ///
    /// Panics if the member pool has no vacant slot and cannot grow.
    #[must_use]
    pub fn from_method<C, M>(pools: &'a FunctionPools, object: &'a C, method: M) -> Self
    where
        C: ?Sized + Sync + 'a,
        M: MethodFn<C, Args, R> + 'a,
    {
        Self::try_from_method(pools, object, method)
            .unwrap_or_else(|error| allocation_failed(ContainerKind::Member, &error))
    }

    /// Creates a handle to a closure, stored inline in the functor pool.
    ///
    /// The closure may capture at most [`FUNCTOR_CAPACITY`][crate::FUNCTOR_CAPACITY] bytes and
    /// must not need more than [`SLOT_ALIGN`][crate::SLOT_ALIGN] alignment. Larger closures fail
    /// to compile. The check runs when the generic code is instantiated, so it is reported by
    /// `cargo build` and `cargo test` but not by `cargo check`. Closure parameters need type
    /// annotations.
    ///
    /// # Errors
    ///
    /// Returns an error if the functor pool has no vacant slot and cannot grow.
    pub fn try_from_closure<F>(pools: &'a FunctionPools, closure: F) -> Result<Self>
    where
        F: Invoke<Args, R> + Send + Sync + 'a,
    {
        Self::allocate(FunctorContainer::new(pools, closure))
    }

    /// Creates a handle to a closure, stored inline in the functor pool.
    ///
    /// # Panics
    ///
    /// Panics if the functor pool has no vacant slot and cannot grow.
    #[must_use]
    pub fn from_closure<F>(pools: &'a FunctionPools, closure: F) -> Self
    where
        F: Invoke<Args, R> + Send + Sync + 'a,
    {
        Self::try_from_closure(pools, closure)
            .unwrap_or_else(|error| allocation_failed(ContainerKind::Functor, &error))
    }

    /// Moves `container` into a slot of its pool and returns the first handle to it.
    fn allocate<C>(container: C) -> Result<Self>
    where
        C: CallableInterface<'a, Args, R> + PooledContainer + 'a,
    {
        let () = C::FITS;

        let pool = container.header().pools().pool(C::KIND);
        let slot = pool.try_allocate()?.cast::<C>();

        // SAFETY: The slot is vacant and at least as large and as aligned as `C`, which the
        // `FITS` check above guarantees at compile time.
        unsafe {
            slot.write(container);
        }

        let target: NonNull<dyn CallableInterface<'a, Args, R> + 'a> = slot;

        Ok(Self {
            target: Some(target),
        })
    }

    /// Whether the handle refers to no callable.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.target.is_none()
    }

    /// What kind of callable the handle refers to, or `None` if it is empty.
    #[must_use]
    pub fn kind(&self) -> Option<ContainerKind> {
        self.container().map(CallableInterface::kind)
    }

    /// Number of handles that refer to the same callable, or zero if this one is empty.
    ///
    /// Advisory only, as other handles may be cloned or dropped concurrently.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Advisory value, only used for diagnostics.
    pub fn ref_count(&self) -> usize {
        self.container().map_or(0, |container| container.header().refs())
    }

    /// Whether both handles refer to the same callable instance. Two empty handles are equal.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self.target, other.target) {
            (Some(ours), Some(theirs)) => ptr::addr_eq(ours.as_ptr(), theirs.as_ptr()),
            (None, None) => true,
            _ => false,
        }
    }

    /// Calls the callable with the given arguments, packed in a tuple.
    ///
    /// # Panics
    ///
    /// Panics if the handle is empty.
    pub fn call(&self, args: Args) -> R {
        let Some(container) = self.container() else {
            panic!("Function::call() requires a non-empty handle");
        };

        container.invoke(args)
    }

    fn container(&self) -> Option<&(dyn CallableInterface<'a, Args, R> + 'a)> {
        // SAFETY: While we hold a reference, the count is nonzero and the container stays alive
        // in its slot.
        self.target.map(|target| unsafe { target.as_ref() })
    }

    /// Creates a handle that calls this one with `captured` as the leading arguments.
    ///
    /// `captured` is a tuple matching the first parameters of this function and the new handle
    /// takes the remaining ones. The captured values are cloned for every call. The new callable
    /// keeps a clone of this handle and lives in the functor pool of the same pool set.
    ///
    /// ```
    /// use pooled_fn::{Function, FunctionPools};
    ///
    /// let pools = FunctionPools::new();
    /// let f = Function::from_closure(&pools, |a: u8, b: u8, c: u8| [a, b, c]);
    ///
    /// let g = f.bind_first((1, 2));
    /// assert_eq!(g.call((3,)), [1, 2, 3]);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the functor pool has no vacant slot and cannot grow.
    ///
    /// # Panics
    ///
    /// Panics if the handle is empty.
    pub fn try_bind_first<Captured>(
        &self,
        captured: Captured,
    ) -> Result<Function<'a, Args::Rest, R>>
    where
        Args: PrependArgs<Captured> + 'a,
        Captured: Clone + Send + Sync + 'a,
        R: 'a,
    {
        let pools = self.pools_for("bind_first");

        Function::allocate(CaptureFirst::new(pools, self.clone(), captured))
    }

    /// Creates a handle that calls this one with `captured` as the leading arguments.
    ///
    /// See [`try_bind_first()`][Self::try_bind_first].
    ///
    /// # Panics
    ///
    /// Panics if the handle is empty or if the functor pool has no vacant slot and cannot grow.
    #[must_use]
    pub fn bind_first<Captured>(&self, captured: Captured) -> Function<'a, Args::Rest, R>
    where
        Args: PrependArgs<Captured> + 'a,
        Captured: Clone + Send + Sync + 'a,
        R: 'a,
    {
        self.try_bind_first(captured)
            .unwrap_or_else(|error| allocation_failed(ContainerKind::Capture, &error))
    }

    /// Creates a handle that calls this one with `captured` as the trailing arguments.
    ///
    /// `captured` is a tuple matching the last parameters of this function and the new handle
    /// takes the preceding ones. Otherwise this works like
    /// [`try_bind_first()`][Self::try_bind_first].
    ///
    /// ```
    /// use pooled_fn::{Function, FunctionPools};
    ///
    /// let pools = FunctionPools::new();
    /// let f = Function::from_closure(&pools, |a: u8, b: u8, c: u8| [a, b, c]);
    ///
    /// let g = f.bind_last((3,));
    /// assert_eq!(g.call((1, 2)), [1, 2, 3]);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the functor pool has no vacant slot and cannot grow.
    ///
    /// # Panics
    ///
    /// Panics if the handle is empty.
    pub fn try_bind_last<Captured>(
        &self,
        captured: Captured,
    ) -> Result<Function<'a, Args::Rest, R>>
    where
        Args: AppendArgs<Captured> + 'a,
        Captured: Clone + Send + Sync + 'a,
        R: 'a,
    {
        let pools = self.pools_for("bind_last");

        Function::allocate(CaptureLast::new(pools, self.clone(), captured))
    }

    /// Creates a handle that calls this one with `captured` as the trailing arguments.
    ///
    /// See [`try_bind_last()`][Self::try_bind_last].
    ///
    /// # Panics
    ///
    /// Panics if the handle is empty or if the functor pool has no vacant slot and cannot grow.
    #[must_use]
    pub fn bind_last<Captured>(&self, captured: Captured) -> Function<'a, Args::Rest, R>
    where
        Args: AppendArgs<Captured> + 'a,
        Captured: Clone + Send + Sync + 'a,
        R: 'a,
    {
        self.try_bind_last(captured)
            .unwrap_or_else(|error| allocation_failed(ContainerKind::Capture, &error))
    }

    /// The pool set this handle's callable came from, for allocating derived callables.
    fn pools_for(&self, operation: &str) -> &'a FunctionPools {
        let Some(container) = self.container() else {
            panic!("Function::{operation}() requires a non-empty handle");
        };

        container.header().pools()
    }
}

fn allocation_failed(kind: ContainerKind, error: &Error) -> ! {
    panic!("failed to allocate {kind} callable container: {error}")
}

impl<Args, R> Clone for Function<'_, Args, R> {
    fn clone(&self) -> Self {
        if let Some(container) = self.container() {
            container.inc();
        }

        Self {
            target: self.target,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        // Assigning a handle to itself (or to another handle to the same callable) must not
        // release the callable.
        if self.ptr_eq(source) {
            return;
        }

        *self = source.clone();
    }
}

impl<Args, R> Drop for Function<'_, Args, R> {
    fn drop(&mut self) {
        let Some(target) = self.target.take() else {
            return;
        };

        // SAFETY: We held a reference until now, so the container is still alive.
        let container = unsafe { target.as_ref() };

        if container.dec() != 0 {
            return;
        }

        let pool = container.get_allocator();

        // SAFETY: The count reached zero, so no other handle can reach the container and we
        // are the only one dropping it. It was written into the slot by `allocate()`.
        unsafe {
            target.as_ptr().drop_in_place();
        }

        // SAFETY: The slot came from this pool in `allocate()` and its content was just dropped.
        unsafe {
            pool.free(target.cast());
        }
    }
}

impl<Args, R> Default for Function<'_, Args, R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<Args, R> PartialEq for Function<'_, Args, R> {
    /// Handles are equal if they refer to the same callable instance, or if both refer to
    /// plain function pointers with the same address.
    ///
    /// Pointer equality is best-effort. The compiler may give one function several addresses
    /// (for example across codegen units) or merge distinct functions into one, so two handles
    /// created from separate casts of the same function are not guaranteed to compare equal.
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }

        match (self.container(), other.container()) {
            (Some(ours), Some(theirs)) => ours
                .static_address()
                .zip(theirs.static_address())
                .is_some_and(|(ours, theirs)| ours == theirs),
            _ => false,
        }
    }
}

impl<Args, R> fmt::Debug for Function<'_, Args, R> {
    #[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("kind", &self.kind())
            .field("ref_count", &self.ref_count())
            .finish_non_exhaustive()
    }
}

// SAFETY: Every container kind requires its contents to be `Send + Sync` and the reference
// count is atomic, so handles to the same container may live on and be used from any thread.
unsafe impl<Args, R> Send for Function<'_, Args, R> {}
// SAFETY: See above. Calling through a shared handle only requires `&` access to the container.
unsafe impl<Args, R> Sync for Function<'_, Args, R> {}
