use crate::{
    AppendArgs, CallableInterface, ContainerHeader, ContainerKind, FUNCTOR_SLOT_SIZE, Function,
    FunctionPools, PooledContainer, PrependArgs,
};

/// Calls an inner function with captured arguments placed before the ones supplied at call time.
pub(crate) struct CaptureFirst<'a, Args, Captured, R> {
    header: ContainerHeader<'a>,
    inner: Function<'a, Args, R>,
    captured: Captured,
}

impl<'a, Args, Captured, R> CaptureFirst<'a, Args, Captured, R> {
    pub(crate) fn new(
        pools: &'a FunctionPools,
        inner: Function<'a, Args, R>,
        captured: Captured,
    ) -> Self {
        Self {
            header: ContainerHeader::new(pools),
            inner,
            captured,
        }
    }
}

impl<'a, Args, Captured, R> CallableInterface<'a, Args::Rest, R>
    for CaptureFirst<'a, Args, Captured, R>
where
    Args: PrependArgs<Captured>,
    Captured: Clone + Send + Sync,
{
    fn invoke(&self, rest: Args::Rest) -> R {
        // The function may be called any number of times, so each call gets its own copy.
        self.inner.call(Args::prepend(self.captured.clone(), rest))
    }

    fn header(&self) -> &ContainerHeader<'a> {
        &self.header
    }

    fn kind(&self) -> ContainerKind {
        ContainerKind::Capture
    }
}

impl<Args, Captured, R> PooledContainer for CaptureFirst<'_, Args, Captured, R> {
    const KIND: ContainerKind = ContainerKind::Capture;
    const SLOT_SIZE: usize = FUNCTOR_SLOT_SIZE;
}

/// Calls an inner function with captured arguments placed after the ones supplied at call time.
pub(crate) struct CaptureLast<'a, Args, Captured, R> {
    header: ContainerHeader<'a>,
    inner: Function<'a, Args, R>,
    captured: Captured,
}

impl<'a, Args, Captured, R> CaptureLast<'a, Args, Captured, R> {
    pub(crate) fn new(
        pools: &'a FunctionPools,
        inner: Function<'a, Args, R>,
        captured: Captured,
    ) -> Self {
        Self {
            header: ContainerHeader::new(pools),
            inner,
            captured,
        }
    }
}

impl<'a, Args, Captured, R> CallableInterface<'a, Args::Rest, R>
    for CaptureLast<'a, Args, Captured, R>
where
    Args: AppendArgs<Captured>,
    Captured: Clone + Send + Sync,
{
    fn invoke(&self, rest: Args::Rest) -> R {
        self.inner.call(Args::append(rest, self.captured.clone()))
    }

    fn header(&self) -> &ContainerHeader<'a> {
        &self.header
    }

    fn kind(&self) -> ContainerKind {
        ContainerKind::Capture
    }
}

impl<Args, Captured, R> PooledContainer for CaptureLast<'_, Args, Captured, R> {
    const KIND: ContainerKind = ContainerKind::Capture;
    const SLOT_SIZE: usize = FUNCTOR_SLOT_SIZE;
}
