use std::sync::Once;

pub type TestResult<T = ()> = color_eyre::eyre::Result<T>;

pub(super) fn install() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let _ = color_eyre::install();
    });
}

macro_rules! ensure_eq {
    ($left:expr, $right:expr $(,)?) => {
        match (&$left, &$right) {
            (left_val, right_val) => {
                ::color_eyre::eyre::ensure!((left_val == right_val), r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`"#, left_val, right_val);
            }
        }
    };
    ($left:expr, $right:expr, $($arg:tt)+) => {
        match (&$left, &$right) {
            (left_val, right_val) => {
                ::color_eyre::eyre::ensure!((left_val == right_val), r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`: {}"#, left_val, right_val, ::core::format_args!($($arg)+));
            }
        }
    };
}

/// Fails with the value's `Debug` rendering if it doesn't match the pattern.
macro_rules! ensure_matches {
    ($val:expr, $($pat:pat_param)|+ $(if $guard:expr)? $(,)?) => {
        match &$val {
            $($pat)|+ $(if $guard)? => {}
            other => ::color_eyre::eyre::bail!(
                "assertion failed: `{:?}` does not match `{}`",
                other,
                stringify!($($pat)|+),
            ),
        }
    };
}
