/// Implements `RpcFunction::call` from an async body returning
/// `Result<Range, HandlerError>`. The argument may be any pattern that is a
/// single token tree, e.g. `(a, b)` or `_`.
#[macro_export]
macro_rules! call {
    (async fn call(& $self:ident, $domain_pat:tt : $domain_ty:ty) -> $range_ty:ty { $($body:tt)* }) => {
        type Domain = $domain_ty;
        type Range = $range_ty;

        fn call<'call>(
            &'call $self,
            args: $domain_ty,
        ) -> $crate::BoxFuture<'call, ::std::result::Result<Self::Range, $crate::HandlerError>> {
            let body = async move {
                let $domain_pat = args;
                $($body)*
            };
            Box::pin(body)
        }
    };
}

#[macro_export]
macro_rules! name {
    ($name:expr) => {
        fn name(&self) -> &str {
            $name
        }
    };
}
