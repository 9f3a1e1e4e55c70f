use crate::{
    CallableInterface, ContainerHeader, ContainerKind, FUNCTOR_SLOT_SIZE, FunctionPools, Invoke,
    PooledContainer,
};

/// Holds a closure inline.
pub(crate) struct FunctorContainer<'a, F> {
    header: ContainerHeader<'a>,
    functor: F,
}

impl<'a, F> FunctorContainer<'a, F> {
    pub(crate) fn new(pools: &'a FunctionPools, functor: F) -> Self {
        Self {
            header: ContainerHeader::new(pools),
            functor,
        }
    }
}

impl<'a, F, Args, R> CallableInterface<'a, Args, R> for FunctorContainer<'a, F>
where
    F: Invoke<Args, R> + Send + Sync,
{
    #[inline]
    fn invoke(&self, args: Args) -> R {
        self.functor.call_with(args)
    }

    fn header(&self) -> &ContainerHeader<'a> {
        &self.header
    }

    fn kind(&self) -> ContainerKind {
        ContainerKind::Functor
    }
}

impl<F> PooledContainer for FunctorContainer<'_, F> {
    const KIND: ContainerKind = ContainerKind::Functor;
    const SLOT_SIZE: usize = FUNCTOR_SLOT_SIZE;
}
