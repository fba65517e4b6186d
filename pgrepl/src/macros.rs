//! Macros for provider error handling.

/// Creates a [`crate::error::ProviderError`] from error kind and description.
///
/// An optional third argument is converted with `to_string` and attached as detail.
#[macro_export]
macro_rules! provider_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::ProviderError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::ProviderError::from(($kind, $desc, $detail.to_string()))
    };
}

/// Creates and returns a [`crate::error::ProviderError`] from the current function.
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return Err($crate::provider_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return Err($crate::provider_error!($kind, $desc, $detail))
    };
}
