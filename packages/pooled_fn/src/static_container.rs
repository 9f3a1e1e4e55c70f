use crate::{
    CallableInterface, ContainerHeader, ContainerKind, FunctionPools, PooledContainer,
    STATIC_SLOT_SIZE, StaticFn,
};

/// Holds a plain function pointer.
pub(crate) struct StaticContainer<'a, P> {
    header: ContainerHeader<'a>,
    function: P,
}

impl<'a, P> StaticContainer<'a, P> {
    pub(crate) fn new(pools: &'a FunctionPools, function: P) -> Self {
        Self {
            header: ContainerHeader::new(pools),
            function,
        }
    }
}

impl<'a, P, Args, R> CallableInterface<'a, Args, R> for StaticContainer<'a, P>
where
    P: StaticFn<Args, R>,
{
    #[inline]
    fn invoke(&self, args: Args) -> R {
        self.function.call_static(args)
    }

    fn header(&self) -> &ContainerHeader<'a> {
        &self.header
    }

    fn kind(&self) -> ContainerKind {
        ContainerKind::Static
    }

    fn static_address(&self) -> Option<*const ()> {
        Some(self.function.address())
    }
}

impl<P> PooledContainer for StaticContainer<'_, P> {
    const KIND: ContainerKind = ContainerKind::Static;
    const SLOT_SIZE: usize = STATIC_SLOT_SIZE;
}
