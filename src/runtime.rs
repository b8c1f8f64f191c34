use crate::{
	diff::Differ,
	events::{Dispatcher, EventBridge, EventData, ListenerCallback},
	vdom::VNode,
	DiffError, Edit, IdAllocator, Interpreter, InterpreterError, ListenerId, NodeId, NodeRegistry, TemplateInstance, TemplateStore, TreeHost,
};
use std::rc::Rc;
use tracing::{debug, info, instrument};

/// Settings of a [`Runtime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
	/// How many levels below the diffed parent the differ descends.
	pub depth_limit: usize,
	/// IDs below this are stored in a dense arena, larger ones in a hash map.
	pub dense_ids: usize,
	/// Whether to warn about batches that leave nodes on the stack.
	pub warn_on_stack_leftovers: bool,
}
impl Default for RuntimeConfig {
	fn default() -> Self {
		Self {
			depth_limit: 64,
			dense_ids: 1 << 16,
			warn_on_stack_leftovers: true,
		}
	}
}

/// Owns everything between a batch of [`Edit`]s and the live tree.
///
/// ```
/// use vdom_patch::{host::MemoryTree, vdom::VNode, NodeId, Runtime, RuntimeConfig, TreeHost};
///
/// let mut host = MemoryTree::new();
/// let mount = host.create_element("main", None).unwrap();
/// let mut runtime = Runtime::init(host, mount.clone(), RuntimeConfig::default());
///
/// let mut vdom: Vec<VNode> = vec![VNode::element("p").child("Hello!").into()];
/// runtime.render(NodeId::ROOT, &[], &mut vdom).unwrap();
/// assert_eq!(mount.to_html(), "<main><p>Hello!</p></main>");
/// ```
pub struct Runtime<H: TreeHost> {
	host: H,
	registry: NodeRegistry<H::Node>,
	templates: TemplateStore<H::Node>,
	bridge: EventBridge<H>,
	ids: IdAllocator,
	stack: Vec<H::Node>,
	instances: Vec<TemplateInstance>,
	differ: Differ,
	config: RuntimeConfig,
}
impl<H: TreeHost> core::fmt::Debug for Runtime<H> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Runtime")
			.field("registered", &self.registry.len())
			.field("templates", &self.templates.len())
			.field("bridge", &self.bridge)
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}
impl<H: TreeHost> Runtime<H> {
	/// Takes over `host` and registers `mount` as [`NodeId::ROOT`].
	#[must_use]
	#[instrument(skip(host, mount))]
	pub fn init(host: H, mount: H::Node, config: RuntimeConfig) -> Self {
		let mut registry = NodeRegistry::with_dense_limit(config.dense_ids);
		registry.replace(NodeId::ROOT, mount);
		Self {
			host,
			registry,
			templates: TemplateStore::new(),
			bridge: EventBridge::new(),
			ids: IdAllocator::new(),
			stack: Vec::new(),
			instances: Vec::new(),
			differ: Differ::new(config.depth_limit),
			config,
		}
	}

	/// An interpreter for applying batches by hand. Prefer [`Runtime::apply_mutations`].
	pub fn interpreter(&mut self) -> Interpreter<'_, H> {
		Interpreter {
			host: &mut self.host,
			registry: &mut self.registry,
			templates: &mut self.templates,
			bridge: &mut self.bridge,
			ids: &mut self.ids,
			stack: &mut self.stack,
			instances: &mut self.instances,
			warn_on_stack_leftovers: self.config.warn_on_stack_leftovers,
		}
	}

	/// Applies `batch` in order, then makes IDs freed before it reusable.
	///
	/// # Errors
	///
	/// The error of the first failing operation. The rest of the batch is skipped.
	pub fn apply_mutations(&mut self, batch: &[Edit]) -> Result<(), InterpreterError> {
		let result = self.interpreter().apply(batch);
		self.ids.release_quarantine();
		result
	}

	/// Sets the function every event is reported to, returning the previous one.
	pub fn register_listener_callback(&mut self, callback: impl 'static + FnMut(ListenerId, EventData)) -> Option<ListenerCallback> {
		self.bridge.dispatcher().set_callback(Box::new(callback))
	}

	/// # Errors
	///
	/// [`InterpreterError::MalformedTemplate`] iff `program` is not a valid template program.
	pub fn save_template(&mut self, name: &str, index: u32, program: Vec<Edit>) -> Result<(), InterpreterError> {
		self.templates.save(name, index, program)
	}

	/// Clones a saved template outside of a batch. The clone is detached and its root gets a fresh ID.
	///
	/// # Errors
	///
	/// [`InterpreterError::TemplateNotFound`] iff the template was never saved,
	/// [`InterpreterError::HostApi`] iff the host refuses to build or clone it.
	pub fn clone_template(&mut self, name: &str, index: u32) -> Result<NodeId, InterpreterError> {
		self.instantiate_template(name, index).map(|instance| instance.root)
	}

	/// Like [`Runtime::clone_template`], but also reports the IDs of the clone's descendants.
	///
	/// # Errors
	///
	/// See [`Runtime::clone_template`].
	pub fn instantiate_template(&mut self, name: &str, index: u32) -> Result<TemplateInstance, InterpreterError> {
		let result = self.interpreter().instantiate(name, index, None).map(|(instance, _)| instance);
		self.bridge.collect();
		result
	}

	/// The instances created by [`Edit::LoadTemplate`] since the last call.
	pub fn take_template_instances(&mut self) -> Vec<TemplateInstance> {
		std::mem::take(&mut self.instances)
	}

	/// An ID that is neither registered nor quarantined.
	pub fn allocate_id(&mut self) -> NodeId {
		let registry = &self.registry;
		self.ids.allocate(|id| id.is_root() || registry.contains(id))
	}

	/// Quarantines `id` until after the next batch.
	pub fn free_id(&mut self, id: NodeId) {
		self.ids.free(id);
	}

	/// Diffs the children of `parent` from `old` to `new` without applying the result.
	///
	/// # Errors
	///
	/// See [`Differ::diff_children`].
	pub fn diff(&mut self, parent: NodeId, old: &[VNode], new: &mut [VNode]) -> Result<Vec<Edit>, DiffError> {
		let registry = &self.registry;
		self.differ.diff_children(&mut self.ids, |id| registry.contains(id), parent, old, new)
	}

	/// Diffs the children of `parent` from `old` to `new` and applies the result.
	///
	/// # Errors
	///
	/// See [`Runtime::diff`] and [`Runtime::apply_mutations`].
	#[instrument(skip(self, old, new))]
	pub fn render(&mut self, parent: NodeId, old: &[VNode], new: &mut [VNode]) -> Result<(), DiffError> {
		let batch = self.diff(parent, old, new)?;
		debug!("Applying {} edit(s).", batch.len());
		self.apply_mutations(&batch).map_err(Into::into)
	}

	#[must_use]
	pub fn host(&self) -> &H {
		&self.host
	}

	pub fn host_mut(&mut self) -> &mut H {
		&mut self.host
	}

	#[must_use]
	pub fn registry(&self) -> &NodeRegistry<H::Node> {
		&self.registry
	}

	#[must_use]
	pub fn lookup(&self, id: NodeId) -> Option<&H::Node> {
		self.registry.get(id)
	}

	#[must_use]
	pub fn templates(&self) -> &TemplateStore<H::Node> {
		&self.templates
	}

	#[must_use]
	pub fn bridge(&self) -> &EventBridge<H> {
		&self.bridge
	}

	#[must_use]
	pub fn dispatcher(&self) -> Rc<Dispatcher> {
		Rc::clone(self.bridge.dispatcher())
	}

	#[must_use]
	pub fn config(&self) -> &RuntimeConfig {
		&self.config
	}

	/// Detaches every listener, forgets every ID and template and hands back the host.
	#[instrument(skip(self))]
	pub fn shutdown(mut self) -> H {
		self.bridge.shutdown(&mut self.host, &self.registry);
		let forgotten = self.registry.clear();
		self.templates.clear();
		self.instances.clear();
		info!("Shut down. Forgot {} node ID(s).", forgotten);
		self.host
	}
}
