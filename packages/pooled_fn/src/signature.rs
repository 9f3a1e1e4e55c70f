//! Traits that let a [`Function`][crate::Function] call targets of any arity through a single
//! tuple of arguments.
//!
//! They are implemented for arities 0 through 6 and are sealed, so no other implementations
//! can be added.

// Supertraits that keep the public traits below from being implemented outside this crate.
trait InvokeSealed<Args, R> {}
trait StaticFnSealed<Args, R> {}
trait MethodFnSealed<C: ?Sized, Args, R> {}

/// A closure that can be called with its arguments packed in a tuple.
///
/// Implemented for every `Fn(A0, A1, ..) -> R` with up to six parameters. Other types cannot
/// implement it:
///
/// ```compile_fail
/// use pooled_fn::Invoke;
///
/// struct Custom;
///
/// impl Invoke<(), ()> for Custom {
///     fn call_with(&self, (): ()) {}
/// }
/// ```
pub trait Invoke<Args, R>: InvokeSealed<Args, R> {
    /// Calls the closure, unpacking `args` into its parameters.
    fn call_with(&self, args: Args) -> R;
}

/// A plain function pointer that can be called with its arguments packed in a tuple.
///
/// Implemented for every `fn(A0, A1, ..) -> R` with up to six parameters. Function items have
/// to be cast to a function pointer type, for example `add as fn(i32, i32) -> i32`.
pub trait StaticFn<Args, R>: StaticFnSealed<Args, R> + Copy + Send + Sync {
    /// Calls the function, unpacking `args` into its parameters.
    fn call_static(self, args: Args) -> R;

    /// The address of the function, used to compare handles.
    fn address(self) -> *const ();
}

/// A method pointer (a function taking the object by shared reference first) that can be
/// called with its remaining arguments packed in a tuple.
///
/// Implemented for every `fn(&C, A0, A1, ..) -> R` with up to six parameters after the object.
/// Methods have to be cast to a function pointer type, for example
/// `Counter::add as fn(&Counter, u32) -> u32`.
pub trait MethodFn<C: ?Sized, Args, R>: MethodFnSealed<C, Args, R> + Copy + Send + Sync {
    /// Calls the method on `object`, unpacking `args` into its remaining parameters.
    fn call_method(self, object: &C, args: Args) -> R;
}

macro_rules! impl_signatures {
    ($($arg:ident),*) => {
        impl<F, R, $($arg,)*> InvokeSealed<($($arg,)*), R> for F where F: Fn($($arg),*) -> R {}

        impl<R, $($arg,)*> StaticFnSealed<($($arg,)*), R> for fn($($arg),*) -> R {}

        impl<C: ?Sized, R, $($arg,)*> MethodFnSealed<C, ($($arg,)*), R> for fn(&C, $($arg),*) -> R {}

        impl<F, R, $($arg,)*> Invoke<($($arg,)*), R> for F
        where
            F: Fn($($arg),*) -> R,
        {
            #[allow(non_snake_case, reason = "argument names mirror their type parameters")]
            #[inline]
            fn call_with(&self, ($($arg,)*): ($($arg,)*)) -> R {
                self($($arg),*)
            }
        }

        impl<R, $($arg,)*> StaticFn<($($arg,)*), R> for fn($($arg),*) -> R {
            #[allow(non_snake_case, reason = "argument names mirror their type parameters")]
            #[inline]
            fn call_static(self, ($($arg,)*): ($($arg,)*)) -> R {
                self($($arg),*)
            }

            #[inline]
            fn address(self) -> *const () {
                self as *const ()
            }
        }

        impl<C: ?Sized, R, $($arg,)*> MethodFn<C, ($($arg,)*), R> for fn(&C, $($arg),*) -> R {
            #[allow(non_snake_case, reason = "argument names mirror their type parameters")]
            #[inline]
            fn call_method(self, object: &C, ($($arg,)*): ($($arg,)*)) -> R {
                self(object, $($arg),*)
            }
        }
    };
}

impl_signatures!();
impl_signatures!(A0);
impl_signatures!(A0, A1);
impl_signatures!(A0, A1, A2);
impl_signatures!(A0, A1, A2, A3);
impl_signatures!(A0, A1, A2, A3, A4);
impl_signatures!(A0, A1, A2, A3, A4, A5);
