#![deny(missing_docs)]

//! # Intermediate Representation
//!
//! The language-neutral model handed to the emitter: a type graph stored in
//! a [`TypeArena`], and the operation envelopes that point into it.

/// Arena and graph walks.
pub mod arena;

/// `Equal`/`Hash` method plans.
pub mod equality;

/// Operations, requests, responses, security, servers.
pub mod operation;

/// Type node model.
pub mod types;

/// Value constraints.
pub mod validators;

pub use arena::{Checkpoint, JsonKind, TypeArena};
pub use equality::{EqualitySpec, FieldCategory, FieldEquality, FieldHash, HashSpec};
pub use operation::{
    is_mask, status_text, Encoding, Media, Operation, Parameter, PathPart, Request, Response,
    Responses, Security, SecurityFormat, SecurityKind, SecurityRequirements, Server, ServerParam,
    StatusKey, WebhookInfo,
};
pub use types::{
    DefaultValue, EnumVariant, Feature, Field, FieldSpec, FormSpec, GenericVariant, InlineField,
    Kind, NilSemantic, PrimitiveType, SumMapping, SumSpec, Tag, Type, TypeId, TypeKind, UniqueArm,
};
pub use validators::Validators;
