#![deny(missing_docs)]

//! # OASC Core
//!
//! Front-end compiler from OpenAPI 3.x documents to a language-neutral IR:
//! schema lowering, operation envelopes, route trees and equality plans.

/// Shared error types.
pub mod error;

/// Resolved input document and its loader.
pub mod spec;

/// Identifier conversion.
pub mod naming;

/// Type graph and operation envelopes.
pub mod ir;

/// Named type stores and scope merging.
pub mod storage;

/// Generation features.
pub mod features;

/// Parser and generator options.
pub mod options;

/// Per-operation lowering state and the skip policy.
pub mod context;

/// Schema lowering.
pub mod schema;

/// Operation lowering.
pub mod ops;

/// Post-lowering passes.
pub mod passes;

/// Route tree.
pub mod router;

/// Pipeline driver.
pub mod generator;

/// Emitter input.
pub mod template;

pub use error::{AppError, AppResult};
pub use features::{FeatureOptions, FeatureSet, GenFeature};
pub use generator::{lower_component, Generator};
pub use naming::{camel, pascal, pascal_special};
pub use options::{Config, ConvenientErrors, Filters, GenerateOptions};
pub use router::{Router, WebhookRouter};
pub use spec::{load_file, parse_document, Document, Location, ParseOptions};
pub use template::TemplateConfig;
