use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

impl Error {
    #[must_use]
    pub fn unknown_variant(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.into(),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// ── Shared context trait ────────────────────────────────────────────────────

/// Error types buildable from a bare message.
///
/// Pair with [`impl_context!`] to give a crate `.with_context()` on foreign
/// `Result`s.
pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;
}

/// Expand to a `Context` trait for the calling module's `Error` and `Result`.
///
/// The module must define `Error: FromMessage` and a one-parameter `Result`
/// alias.
///
/// ```ignore
/// // crates/comms/src/error.rs
/// wisp_common::impl_context!();
/// ```
#[macro_export]
macro_rules! impl_context {
    () => {
        /// Prefix a foreign error with a lazily built message.
        pub trait Context<T> {
            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C;
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C,
            {
                self.map_err(|source| {
                    let message = format!("{}: {source}", f().into());
                    <Error as $crate::FromMessage>::from_message(message)
                })
            }
        }
    };
}
