use crate::{
    CallableInterface, ContainerHeader, ContainerKind, FunctionPools, MEMBER_SLOT_SIZE, MethodFn,
    PooledContainer,
};

/// Holds a reference to an object plus a method to call on it.
pub(crate) struct MemberContainer<'a, C: ?Sized, M> {
    header: ContainerHeader<'a>,
    object: &'a C,
    method: M,
}

impl<'a, C: ?Sized, M> MemberContainer<'a, C, M> {
    pub(crate) fn new(pools: &'a FunctionPools, object: &'a C, method: M) -> Self {
        Self {
            header: ContainerHeader::new(pools),
            object,
            method,
        }
    }
}

impl<'a, C, M, Args, R> CallableInterface<'a, Args, R> for MemberContainer<'a, C, M>
where
    C: ?Sized + Sync,
    M: MethodFn<C, Args, R>,
{
    #[inline]
    fn invoke(&self, args: Args) -> R {
        self.method.call_method(self.object, args)
    }

    fn header(&self) -> &ContainerHeader<'a> {
        &self.header
    }

    fn kind(&self) -> ContainerKind {
        ContainerKind::Member
    }
}

impl<C: ?Sized, M> PooledContainer for MemberContainer<'_, C, M> {
    const KIND: ContainerKind = ContainerKind::Member;
    const SLOT_SIZE: usize = MEMBER_SLOT_SIZE;
}
