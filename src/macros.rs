#![allow(unused_macros)]

/// Generates by-value builder setters for the listed fields, forwarding their doc comments.
macro_rules! builder_setters {
    ($(#[$attr:meta])* $name:ident : $ty:ty $(, $($tt:tt)*)?) => {
        $(#[$attr])*
        #[must_use = "builder setters take the entire structure and return the result"]
        #[inline(always)]
        pub fn $name(mut self, $name: $ty) -> Self {
            self.$name = $name;
            self
        }
        $(builder_setters!($($tt)*);)?
    };
    () => {};
}

/// Emits a `Debug` impl that only shows the listed fields, for structs holding closures or trait
/// objects.
macro_rules! debug_fields {
    ($ty:ty, $($field:ident),+ $(,)?) => {
        impl ::std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_struct(stringify!($ty))
                    $(.field(stringify!($field), &self.$field))+
                    .finish_non_exhaustive()
            }
        }
    };
}
