// SPDX-License-Identifier: MIT

//! Declarative macros for reducing boilerplate.
//!
//! - [`display_tags!`]: stable string tags for the fieldless kind/state
//!   enums (error kinds, update kinds, queue and breaker states)

/// Give a fieldless enum a stable string tag per variant.
///
/// Generates `as_str(&self) -> &'static str` and a `Display` impl that
/// writes the same tag. The tags are operator-facing (status output, log
/// fields) and should match the enum's serde rename so the wire form and
/// the printed form never diverge.
///
/// ```ignore
/// msq_core::display_tags! {
///     MyKind {
///         Foo => "foo",
///         BarBaz => "bar-baz",
///     }
/// }
/// ```
#[macro_export]
macro_rules! display_tags {
    ($enum:ty { $( $variant:ident => $tag:literal ),+ $(,)? }) => {
        impl $enum {
            /// Stable tag for this variant, as printed and serialized.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $tag, )+
                }
            }
        }

        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}
