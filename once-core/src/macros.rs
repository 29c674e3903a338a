//! Call-site front end. Every expansion owns one private `static` guard,
//! so identity is per call site and never per invocation. The matching arm
//! is the variant selection: an `async` block, an `async` closure or a
//! closure returning an `async` block can suspend and gets a
//! [`CooperativeGuard`](crate::CooperativeGuard), anything else gets a
//! [`BlockingGuard`](crate::BlockingGuard).

/// Run a block at most once per process.
///
/// ```ignore
/// fn warm_up() {
///     once!(|| load_tables());
/// }
///
/// async fn connect() {
///     once!(async { register_metrics().await }).await;
/// }
/// ```
///
/// Evaluates to `Option<T>` for a closure, and to a future of `Option<T>`
/// for an `async` block. The async closure forms (`async || ..` and
/// `|| async { .. }`) are unwrapped into the block they would produce.
#[macro_export]
macro_rules! once {
    (async move || $($body:tt)+) => {
        $crate::__once_site!(cooperative, run, async move { $($body)+ })
    };
    (async || $($body:tt)+) => {
        $crate::__once_site!(cooperative, run, async { $($body)+ })
    };
    ($(move)? || async $($block:tt)+) => {
        $crate::__once_site!(cooperative, run, async $($block)+)
    };
    (async $($block:tt)+) => {
        $crate::__once_site!(cooperative, run, async $($block)+)
    };
    ($block:expr $(,)?) => {
        $crate::__once_site!(blocking, run, $block)
    };
}

/// Fallible form of [`once!`]: the block yields `Result<T, E>` and the
/// expansion yields `Result<Option<T>, E>` (or a future of it). The error
/// reaches only the one caller that executed the block; the call site is
/// spent either way.
#[macro_export]
macro_rules! try_once {
    (async move || $($body:tt)+) => {
        $crate::__once_site!(cooperative, try_run, async move { $($body)+ })
    };
    (async || $($body:tt)+) => {
        $crate::__once_site!(cooperative, try_run, async { $($body)+ })
    };
    ($(move)? || async $($block:tt)+) => {
        $crate::__once_site!(cooperative, try_run, async $($block)+)
    };
    (async $($block:tt)+) => {
        $crate::__once_site!(cooperative, try_run, async $($block)+)
    };
    ($block:expr $(,)?) => {
        $crate::__once_site!(blocking, try_run, $block)
    };
}

/// One private guard for the expanding call site.
#[doc(hidden)]
#[macro_export]
macro_rules! __once_site {
    (cooperative, $method:ident, $future:expr) => {{
        static GUARD: $crate::CooperativeGuard = $crate::CooperativeGuard::labeled(
            ::core::concat!(::core::file!(), ":", ::core::line!(), ":", ::core::column!()),
        );
        GUARD.$method($future)
    }};
    (blocking, $method:ident, $block:expr) => {{
        static GUARD: $crate::BlockingGuard = $crate::BlockingGuard::labeled(
            ::core::concat!(::core::file!(), ":", ::core::line!(), ":", ::core::column!()),
        );
        GUARD.$method($block)
    }};
}
