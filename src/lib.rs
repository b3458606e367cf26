//! Typed handles for Kubernetes objects.
//!
//! A [`K8sObject`] is a local descriptor of one resource of a supported
//! [`ResourceKind`]. It can be exported as a mapping or JSON text, renamed,
//! and used to list every object of the same kind in a namespace through the
//! cluster described by a [`K8sConfig`].

mod config;
mod error;
mod kind;
mod object;

pub use config::{ConfigOptions, K8sConfig};
pub use error::{Error, Result};
pub use kind::ResourceKind;
pub use kubernetes::{Auth, ListParams, VersionMatch};
pub use object::{K8sObject, K8sObjectBuilder};
