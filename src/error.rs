use crate::NodeId;
use std::borrow::Cow;
use thiserror::Error;

/// A live tree or store host rejected a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {message}")]
pub struct HostError {
	pub operation: &'static str,
	pub message: Cow<'static, str>,
}
impl HostError {
	#[must_use]
	pub fn new(operation: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
		Self {
			operation,
			message: message.into(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
	#[error("unknown node ID {0}")]
	UnknownId(NodeId),
	#[error("node ID {0} is already registered to a different node")]
	DuplicateId(NodeId),
}

/// Aborts the batch that is being applied. Mutations applied before the failing one stay applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpreterError {
	#[error("unknown node ID {0}")]
	UnknownId(NodeId),
	#[error("node ID {0} is already registered to a different node")]
	DuplicateId(NodeId),
	#[error("template {name:?}[{index}] was never saved")]
	TemplateNotFound { name: String, index: u32 },
	#[error("malformed template {name:?}[{index}]: {reason}")]
	MalformedTemplate { name: String, index: u32, reason: String },
	#[error("host rejected the operation: {0}")]
	HostApi(#[from] HostError),
	#[error("{operation} needs {needed} node(s) on the stack, but there are only {available}")]
	StackUnderflow { operation: &'static str, needed: usize, available: usize },
	#[error("node {node} already has a {event:?} listener")]
	DuplicateListener { node: NodeId, event: String },
	#[error("node ID {0} is reserved for the mount point")]
	ReservedId(NodeId),
}
impl From<RegistryError> for InterpreterError {
	fn from(error: RegistryError) -> Self {
		match error {
			RegistryError::UnknownId(id) => Self::UnknownId(id),
			RegistryError::DuplicateId(id) => Self::DuplicateId(id),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
	#[error("duplicate key {0:?} among siblings")]
	DuplicateKey(String),
	#[error("virtual node <{0}> was never mounted")]
	Unmounted(&'static str),
	#[error(transparent)]
	Interpreter(#[from] InterpreterError),
}
