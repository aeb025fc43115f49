//! Macro for implementing Display and FromStr for status-like enums
//!
//! Used by configuration enums (`Environment`, `CacheBackend`) and by the
//! authentication step label so parsing stays case-insensitive everywhere.
//!
//! # Example
//!
//! ```rust
//! use siilink_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Channel {
//!     Soap,
//!     Upload,
//! }
//!
//! impl_domain_status_conversions!(Channel {
//!     Soap => "soap",
//!     Upload => "upload",
//! });
//!
//! assert_eq!("SOAP".parse::<Channel>().unwrap(), Channel::Soap);
//! assert_eq!(Channel::Upload.to_string(), "upload");
//! ```

/// Implements Display and FromStr traits for status enums
///
/// This macro generates:
/// - Display trait: converts enum variants to their lowercase label
/// - FromStr trait: parses case-insensitive (and surrounding-whitespace
///   tolerant) strings to enum variants
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    $(Self::$variant => ::std::write!(f, $str),)+
                }
            }
        }

        impl ::std::str::FromStr for $enum_name {
            type Err = ::std::string::String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => ::std::result::Result::Ok(Self::$variant),)+
                    _ => ::std::result::Result::Err(::std::format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
