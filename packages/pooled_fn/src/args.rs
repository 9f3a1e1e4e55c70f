//! Splitting argument tuples into a captured part and a part supplied at call time.

/// An argument tuple that starts with the tuple `Captured`.
///
/// [`Function::bind_first()`][crate::Function::bind_first] requires this of the function's
/// argument tuple. It is implemented for every split of a tuple of up to six elements, so binding
/// arguments of the wrong type or count fails to compile.
pub trait PrependArgs<Captured> {
    /// The arguments that remain after `Captured`.
    type Rest;

    /// Joins captured and remaining arguments into the full argument tuple.
    fn prepend(captured: Captured, rest: Self::Rest) -> Self;
}

/// An argument tuple that ends with the tuple `Captured`.
///
/// [`Function::bind_last()`][crate::Function::bind_last] requires this of the function's
/// argument tuple. It is implemented for every split of a tuple of up to six elements, so binding
/// arguments of the wrong type or count fails to compile.
pub trait AppendArgs<Captured> {
    /// The arguments that come before `Captured`.
    type Rest;

    /// Joins remaining and captured arguments into the full argument tuple.
    fn append(rest: Self::Rest, captured: Captured) -> Self;
}

macro_rules! impl_split {
    ([$($head:ident),*] [$($tail:ident),*]) => {
        impl<$($head,)* $($tail,)*> PrependArgs<($($head,)*)> for ($($head,)* $($tail,)*) {
            type Rest = ($($tail,)*);

            #[allow(non_snake_case, reason = "argument names mirror their type parameters")]
            #[inline]
            fn prepend(($($head,)*): ($($head,)*), ($($tail,)*): Self::Rest) -> Self {
                ($($head,)* $($tail,)*)
            }
        }

        impl<$($head,)* $($tail,)*> AppendArgs<($($tail,)*)> for ($($head,)* $($tail,)*) {
            type Rest = ($($head,)*);

            #[allow(non_snake_case, reason = "argument names mirror their type parameters")]
            #[inline]
            fn append(($($head,)*): Self::Rest, ($($tail,)*): ($($tail,)*)) -> Self {
                ($($head,)* $($tail,)*)
            }
        }
    };
}

impl_split!([] []);
impl_split!([] [T0]);
impl_split!([T0] []);
impl_split!([] [T0, T1]);
impl_split!([T0] [T1]);
impl_split!([T0, T1] []);
impl_split!([] [T0, T1, T2]);
impl_split!([T0] [T1, T2]);
impl_split!([T0, T1] [T2]);
impl_split!([T0, T1, T2] []);
impl_split!([] [T0, T1, T2, T3]);
impl_split!([T0] [T1, T2, T3]);
impl_split!([T0, T1] [T2, T3]);
impl_split!([T0, T1, T2] [T3]);
impl_split!([T0, T1, T2, T3] []);
impl_split!([] [T0, T1, T2, T3, T4]);
impl_split!([T0] [T1, T2, T3, T4]);
impl_split!([T0, T1] [T2, T3, T4]);
impl_split!([T0, T1, T2] [T3, T4]);
impl_split!([T0, T1, T2, T3] [T4]);
impl_split!([T0, T1, T2, T3, T4] []);
impl_split!([] [T0, T1, T2, T3, T4, T5]);
impl_split!([T0] [T1, T2, T3, T4, T5]);
impl_split!([T0, T1] [T2, T3, T4, T5]);
impl_split!([T0, T1, T2] [T3, T4, T5]);
impl_split!([T0, T1, T2, T3] [T4, T5]);
impl_split!([T0, T1, T2, T3, T4] [T5]);
impl_split!([T0, T1, T2, T3, T4, T5] []);

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn prepend_puts_captured_first() {
        let args = <(u8, &str, char) as PrependArgs<(u8,)>>::prepend((1,), ("two", '3'));

        assert_eq!(args, (1, "two", '3'));
    }

    #[test]
    fn append_puts_captured_last() {
        let args = <(u8, &str, char) as AppendArgs<(&str, char)>>::append((1,), ("two", '3'));

        assert_eq!(args, (1, "two", '3'));
    }

    #[test]
    fn empty_splits() {
        let nothing_captured = <(u8, u16) as PrependArgs<()>>::prepend((), (1, 2));
        let everything_captured = <(u8, u16) as AppendArgs<(u8, u16)>>::append((), (1, 2));

        assert_eq!(nothing_captured, everything_captured);

        <() as PrependArgs<()>>::prepend((), ());
    }
}
