//! Error types shared by the reactive layer and the reconciler.

use thiserror::Error;

use crate::vnode::Key;

/// Errors produced by Trellis core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A children list contained the same key twice.
    #[error("duplicate key `{key}` in children list")]
    DuplicateKey {
        /// The repeated key.
        key: Key,
    },

    /// A component resolved to neither a setup-returned render function nor
    /// a `render` option.
    #[error("component `{component}` has no render function")]
    MissingRender {
        /// Name of the offending component.
        component: String,
    },

    /// Attempted to write a prop through the render context.
    #[error("prop `{key}` is readonly")]
    ReadonlyProp {
        /// The prop that was written.
        key: String,
    },

    /// Attempted to write a computed value that has no setter.
    #[error("computed value is readonly")]
    ReadonlyComputed,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_culprit() {
        let err = Error::DuplicateKey { key: Key::from("row-1") };
        assert_eq!(err.to_string(), "duplicate key `row-1` in children list");

        let err = Error::MissingRender {
            component: "Counter".into(),
        };
        assert!(err.to_string().contains("Counter"));
    }
}
