//! Error handling foundation for campus-console.
//!
//! Only the `Result` alias lives here. Each crate defines its own error
//! enums and wraps them in rootcause reports where context is layered.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
///
/// Each layer adds its own context via `.context()` as errors propagate.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_alias_carries_values() {
        let ok: Result<&str> = Ok("branches");
        assert_eq!(ok.expect("should be ok"), "branches");
    }
}
