//! Bootward Ignition Translation
//!
//! This crate converts human-authored Butane documents (YAML) into the
//! Ignition JSON a machine consumes on first boot.
//!
//! # Variants
//!
//! - `fcos` 1.0.0 - 1.6.0 (Ignition 3.0.0 - 3.5.0)
//! - `flatcar` 1.0.0 - 1.1.0 (Ignition 3.3.0 - 3.4.0)
//!
//! # Example
//!
//! ```
//! use bootward_ignition::{ButaneTranslator, TranslateOptions, Translator};
//!
//! let translator = ButaneTranslator::new(TranslateOptions::default());
//! let butane = b"variant: fcos\nversion: 1.4.0\n";
//! let translation = translator.translate(butane).unwrap();
//!
//! assert_eq!(translation.output, br#"{"ignition":{"version":"3.3.0"}}"#.to_vec());
//! ```
//!
//! Output is compact JSON and depends only on the input bytes, so clients
//! may cache rendered documents by content.

pub mod convert;
pub mod error;
pub mod translate;
pub mod variant;

pub use error::*;
pub use translate::*;
pub use variant::*;
