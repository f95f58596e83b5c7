//! Declaration rewriting behind `#[safe_global]`.
//!
//! An annotated variable is split in two:
//!
//! * a private, bind-once backing declaration named `_NAME`, whose value is
//!   wrapped in a `SafeGlobal` container ([`rewrite::expand_peer`])
//! * accessors named `NAME` that read and write through that container
//!   ([`rewrite::expand_accessors`])
//!
//! The rewriting itself works on the host-agnostic model in [`decl`].
//! [`rust`] plugs Rust `static` items into that model.
pub mod decl;
pub mod rewrite;
pub mod rust;

pub use rewrite::{ATTRIBUTE_NAME, BACKING_PREFIX, Error};
