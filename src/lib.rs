#![doc(html_root_url = "https://docs.rs/vdom-patch/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! A retained virtual DOM patch runtime.
//!
//! Edits are applied by a small stack machine ([`Interpreter`]) against a live tree ([`TreeHost`]),
//! while an out-of-band [`NodeRegistry`] maps opaque [`NodeId`]s to live nodes.
//! [`diff`] reduces two virtual trees to such an edit batch,
//! templates ([`TemplateStore`]) amortize subtree construction,
//! and the [`events`] bridge reports user interaction back by [`ListenerId`].
//!
//! The [`cache`] is an independent transactional key-value store.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod cache;
pub mod diff;
mod edit;
mod error;
pub mod events;
pub mod host;
mod interpreter;
mod node_id;
mod rc_hash_map;
mod registry;
mod runtime;
pub mod scheduler;
mod temp_set;
mod template;
pub mod vdom;

pub use crate::{
	edit::{AttributeValue, Edit},
	error::{DiffError, HostError, InterpreterError, RegistryError},
	host::TreeHost,
	interpreter::Interpreter,
	node_id::{IdAllocator, ListenerId, NodeId},
	registry::NodeRegistry,
	runtime::{Runtime, RuntimeConfig},
	template::{TemplateInstance, TemplateStore},
};

/// Text and attribute values are only logged with the `"dangerous-logging"` feature.
pub(crate) fn shown(value: &str) -> &str {
	if cfg!(feature = "dangerous-logging") {
		value
	} else {
		"<redacted>"
	}
}
