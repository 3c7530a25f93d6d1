macro_rules! all_the_tuples {
    ($name:ident) => {
        $name!([]);
        $name!([T1]);
        $name!([T1, T2]);
        $name!([T1, T2, T3]);
        $name!([T1, T2, T3, T4]);
        $name!([T1, T2, T3, T4, T5]);
        $name!([T1, T2, T3, T4, T5, T6]);
        $name!([T1, T2, T3, T4, T5, T6, T7]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9, T10]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12]);
    };
}

/// Declares that a concrete type can be handed out under one or more trait-object contracts.
///
/// # Examples
/// ```rust
/// use rivet::{implements, Container, Injectable, Constructor};
///
/// trait UserRepo: Send + Sync {}
///
/// struct PostgresUserRepo;
///
/// impl UserRepo for PostgresUserRepo {}
///
/// impl Injectable for PostgresUserRepo {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new(|| PostgresUserRepo)]
///     }
/// }
///
/// implements!(PostgresUserRepo: dyn UserRepo);
///
/// let container = Container::new();
/// container.register_type::<dyn UserRepo, PostgresUserRepo>().unwrap();
/// let _repo = container.resolve::<dyn UserRepo>().unwrap();
/// ```
#[macro_export]
macro_rules! implements {
    ($ty:ty : $($contract:ty),+ $(,)?) => {
        $(
            impl $crate::Upcast<$contract> for $ty {
                #[inline]
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$contract> {
                    self
                }
            }
        )+
    };
}
