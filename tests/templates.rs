use std::{cell::RefCell, rc::Rc};
use vdom_patch::{
	events::EventData,
	host::{MemoryNode, MemoryTree},
	Edit, InterpreterError, ListenerId, NodeId, Runtime, RuntimeConfig, TreeHost,
};

fn runtime() -> (Runtime<MemoryTree>, MemoryNode) {
	let _ = tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).with_test_writer().try_init();

	let mut host = MemoryTree::new();
	let mount = host.create_element("ul", None).unwrap();
	let runtime = Runtime::init(host, mount.clone(), RuntimeConfig::default());
	(runtime, mount)
}

/// `<li class="item"><b>Name</b><button/></li>`, with a click listener on the button.
fn list_item() -> Vec<Edit> {
	vec![
		Edit::CreateElement { tag: "li".to_owned(), id: NodeId(1) },
		Edit::SetAttribute {
			id: NodeId(1),
			name: "class".to_owned(),
			value: "item".into(),
			namespace: None,
		},
		Edit::CreateElement { tag: "b".to_owned(), id: NodeId(2) },
		Edit::CreateTextNode { text: "Name".to_owned(), id: NodeId(3) },
		Edit::AppendChildren { count: 1 },
		Edit::CreateElement { tag: "button".to_owned(), id: NodeId(4) },
		Edit::NewEventListener {
			id: NodeId(4),
			event: "click".to_owned(),
			listener: ListenerId(9),
		},
		Edit::AppendChildren { count: 2 },
	]
}

#[test]
fn clones_have_the_template_shape_and_fresh_ids() {
	let (mut runtime, _) = runtime();
	runtime.save_template("item", 0, list_item()).unwrap();
	assert!(!runtime.templates().is_prepared("item", 0));

	let first = runtime.instantiate_template("item", 0).unwrap();
	let second = runtime.instantiate_template("item", 0).unwrap();
	assert!(runtime.templates().is_prepared("item", 0));
	assert_eq!(runtime.host().created(), 5, "the prototype is built once, clones are deep copies");

	let expected = r#"<li class="item"><b>Name</b><button></button></li>"#;
	assert_eq!(runtime.lookup(first.root).unwrap().to_html(), expected);
	assert_eq!(runtime.lookup(second.root).unwrap().to_html(), expected);
	assert_ne!(runtime.lookup(first.root), runtime.lookup(second.root));

	let mut all_ids: Vec<NodeId> = first.nodes.iter().chain(&second.nodes).map(|&(_, id)| id).collect();
	assert_eq!(all_ids.len(), 8);
	all_ids.sort_unstable();
	all_ids.dedup();
	assert_eq!(all_ids.len(), 8, "IDs don't collide");
	assert!(all_ids.iter().all(|id| !id.is_root() && runtime.registry().contains(*id)));

	let text = runtime.lookup(first.get(NodeId(3)).unwrap()).unwrap();
	assert_eq!(text.text().as_deref(), Some("Name"));
}

#[test]
fn clone_template_returns_the_root() {
	let (mut runtime, mount) = runtime();
	runtime.save_template("item", 0, list_item()).unwrap();
	let root = runtime.clone_template("item", 0).unwrap();
	assert!(runtime.lookup(root).unwrap().parent().is_none());

	runtime.apply_mutations(&[Edit::PushRoot { id: NodeId::ROOT }, Edit::PushRoot { id: root }, Edit::AppendChildren { count: 1 }]).unwrap();
	assert_eq!(mount.children().len(), 1);
}

#[test]
fn clones_carry_listeners() {
	let (mut runtime, _) = runtime();
	let events = Rc::new(RefCell::new(Vec::new()));
	runtime.register_listener_callback({
		let events = Rc::clone(&events);
		move |listener, _| events.borrow_mut().push(listener)
	});
	runtime.save_template("item", 0, list_item()).unwrap();

	let first = runtime.instantiate_template("item", 0).unwrap();
	let second = runtime.instantiate_template("item", 0).unwrap();
	assert_eq!(runtime.bridge().handler_count(), 1);
	assert_eq!(runtime.bridge().attachment_count(), 2);

	for instance in [&first, &second] {
		let button = runtime.lookup(instance.get(NodeId(4)).unwrap()).unwrap();
		assert_eq!(button.listeners(), vec![("click".to_owned(), ListenerId(9))]);
		MemoryTree::dispatch_event(button, "click", &EventData::Generic);
	}
	assert_eq!(*events.borrow(), vec![ListenerId(9), ListenerId(9)]);
}

#[test]
fn load_template_inside_a_batch() {
	let (mut runtime, mount) = runtime();
	runtime.save_template("item", 0, list_item()).unwrap();
	runtime
		.apply_mutations(&[
			Edit::PushRoot { id: NodeId::ROOT },
			Edit::LoadTemplate {
				name: "item".to_owned(),
				index: 0,
				id: NodeId(100),
			},
			Edit::LoadTemplate {
				name: "item".to_owned(),
				index: 0,
				id: NodeId(200),
			},
			Edit::AppendChildren { count: 2 },
		])
		.unwrap();
	assert_eq!(mount.children().len(), 2);
	assert_eq!(runtime.lookup(NodeId(100)), mount.children().first());

	let instances = runtime.take_template_instances();
	assert_eq!(instances.iter().map(|instance| instance.root).collect::<Vec<_>>(), vec![NodeId(100), NodeId(200)]);
	assert!(runtime.take_template_instances().is_empty());
}

#[test]
fn unknown_templates() {
	let (mut runtime, _) = runtime();
	assert_eq!(
		runtime.clone_template("missing", 3),
		Err(InterpreterError::TemplateNotFound {
			name: "missing".to_owned(),
			index: 3
		})
	);

	runtime.save_template("item", 0, list_item()).unwrap();
	assert!(matches!(
		runtime.apply_mutations(&[Edit::LoadTemplate {
			name: "item".to_owned(),
			index: 1,
			id: NodeId(1),
		}]),
		Err(InterpreterError::TemplateNotFound { index: 1, .. })
	));
}

#[test]
fn saving_again_overwrites() {
	let (mut runtime, _) = runtime();
	runtime.save_template("t", 0, list_item()).unwrap();
	runtime.clone_template("t", 0).unwrap();
	runtime.save_template("t", 0, vec![Edit::CreatePlaceholder { id: NodeId(1) }]).unwrap();
	assert!(!runtime.templates().is_prepared("t", 0));

	let root = runtime.clone_template("t", 0).unwrap();
	assert!(runtime.lookup(root).unwrap().is_placeholder());
	assert_eq!(runtime.templates().len(), 1);
}

#[test]
fn malformed_programs_are_rejected() {
	let (mut runtime, _) = runtime();
	let malformed = |result: Result<(), InterpreterError>| matches!(result, Err(InterpreterError::MalformedTemplate { .. }));

	// Two roots.
	assert!(malformed(runtime.save_template(
		"t",
		0,
		vec![Edit::CreateElement { tag: "a".to_owned(), id: NodeId(1) }, Edit::CreateElement { tag: "b".to_owned(), id: NodeId(2) }]
	)));
	// No root.
	assert!(malformed(runtime.save_template("t", 0, vec![])));
	// Not constructive.
	assert!(malformed(runtime.save_template("t", 0, vec![Edit::CreateElement { tag: "a".to_owned(), id: NodeId(1) }, Edit::Remove { id: NodeId(1) }])));
	// Uses an ID it doesn't create.
	assert!(malformed(runtime.save_template("t", 0, vec![Edit::PushRoot { id: NodeId(5) }])));
	// A node outside of the root.
	assert!(malformed(runtime.save_template(
		"t",
		0,
		vec![Edit::CreateElement { tag: "a".to_owned(), id: NodeId(1) }, Edit::CreateElement { tag: "b".to_owned(), id: NodeId(2) }, Edit::PopRoot]
	)));
	// Children of a text node.
	assert!(malformed(runtime.save_template(
		"t",
		0,
		vec![Edit::CreateTextNode { text: "a".to_owned(), id: NodeId(1) }, Edit::CreatePlaceholder { id: NodeId(2) }, Edit::AppendChildren { count: 1 }]
	)));

	assert!(runtime.templates().is_empty());
}
