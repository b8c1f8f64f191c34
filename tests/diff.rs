use vdom_patch::{
	host::{MemoryNode, MemoryTree},
	vdom::VNode,
	AttributeValue, DiffError, Edit, ListenerId, NodeId, Runtime, RuntimeConfig, TreeHost,
};

fn runtime_with(config: RuntimeConfig) -> (Runtime<MemoryTree>, MemoryNode) {
	let _ = tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).with_test_writer().try_init();

	let mut host = MemoryTree::new();
	let mount = host.create_element("ul", None).unwrap();
	let runtime = Runtime::init(host, mount.clone(), config);
	(runtime, mount)
}

fn runtime() -> (Runtime<MemoryTree>, MemoryNode) {
	runtime_with(RuntimeConfig::default())
}

fn keyed(keys: &str) -> Vec<VNode> {
	keys.chars().map(|key| VNode::element("li").key(key.to_string()).child(key.to_string()).into()).collect()
}

fn html(keys: &str) -> String {
	let items: String = keys.chars().map(|key| format!("<li>{}</li>", key)).collect();
	format!("<ul>{}</ul>", items)
}

fn handles(runtime: &Runtime<MemoryTree>, vdom: &[VNode]) -> Vec<(String, MemoryNode)> {
	vdom.iter()
		.map(|node| (node.key().unwrap().to_owned(), runtime.lookup(node.id().unwrap()).unwrap().clone()))
		.collect()
}

/// Renders `steps` one after another and checks that keyed nodes keep their identity.
fn check_keyed(steps: &[&str]) {
	let (mut runtime, mount) = runtime();
	let mut old: Vec<VNode> = Vec::new();
	for keys in steps {
		let before = handles(&runtime, &old);
		let mut new = keyed(keys);
		runtime.render(NodeId::ROOT, &old, &mut new).unwrap();
		assert_eq!(mount.to_html(), html(keys), "after rendering {:?}", keys);

		for (key, node) in handles(&runtime, &new) {
			if let Some((_, previous)) = before.iter().find(|(previous_key, _)| *previous_key == key) {
				assert_eq!(*previous, node, "{:?} was recreated on the way to {:?}", key, keys);
			}
		}
		assert_eq!(runtime.registry().len(), 1 + 2 * keys.len(), "stale IDs after rendering {:?}", keys);
		old = new;
	}
}

#[test]
fn keyed_insertions_and_removals() {
	check_keyed(&["", "abc", "abcde", "xabcde", "xabde", "bd", "", "q"]);
}

#[test]
fn keyed_reorders() {
	check_keyed(&["abcde", "edcba", "bcdea", "abcde", "aebcd", "cadeb", "cxaydzeb", "ba"]);
}

#[test]
fn keyed_swap_moves_little() {
	let (mut runtime, _) = runtime();
	let mut old = keyed("abcdef");
	runtime.render(NodeId::ROOT, &[], &mut old).unwrap();

	let mut new = keyed("abedcf");
	let edits = runtime.diff(NodeId::ROOT, &old, &mut new).unwrap();
	let moves = edits.iter().filter(|edit| matches!(edit, Edit::InsertBefore { .. } | Edit::AppendChildren { .. })).count();
	assert_eq!(moves, 2, "{:#?}", edits);
	assert!(!edits.iter().any(|edit| matches!(edit, Edit::Remove { .. } | Edit::CreateElement { .. })));
}

#[test]
fn duplicate_keys() {
	let (mut runtime, _) = runtime();
	let mut new = keyed("aba");
	assert_eq!(runtime.render(NodeId::ROOT, &[], &mut new), Err(DiffError::DuplicateKey("a".to_owned())));
}

#[test]
fn unkeyed_text_changes_in_place() {
	let (mut runtime, mount) = runtime();
	let mut old: Vec<VNode> = vec!["a".into(), "b".into()];
	runtime.render(NodeId::ROOT, &[], &mut old).unwrap();

	let mut new: Vec<VNode> = vec!["a".into(), "c".into(), "d".into()];
	let edits = runtime.diff(NodeId::ROOT, &old, &mut new).unwrap();
	assert_eq!(edits[0], Edit::SetText { id: old[1].id().unwrap(), text: "c".to_owned() });
	assert_eq!(new[1].id(), old[1].id());
	runtime.apply_mutations(&edits).unwrap();
	assert_eq!(mount.to_html(), "<ul>acd</ul>");

	let mut shorter: Vec<VNode> = vec!["a".into()];
	runtime.render(NodeId::ROOT, &new, &mut shorter).unwrap();
	assert_eq!(mount.to_html(), "<ul>a</ul>");
	assert_eq!(runtime.registry().len(), 2);
}

#[test]
fn kind_changes_replace() {
	let (mut runtime, mount) = runtime();
	let mut old: Vec<VNode> = vec![VNode::element("li").child(VNode::element("b").child("bold")).into(), VNode::placeholder()];
	runtime.render(NodeId::ROOT, &[], &mut old).unwrap();
	assert_eq!(mount.to_html(), "<ul><li><b>bold</b></li><!--placeholder--></ul>");
	assert_eq!(runtime.registry().len(), 5);

	let mut new: Vec<VNode> = vec!["plain".into(), VNode::element("li").into()];
	runtime.render(NodeId::ROOT, &old, &mut new).unwrap();
	assert_eq!(mount.to_html(), "<ul>plain<li></li></ul>");
	assert_eq!(runtime.registry().len(), 3, "descendants of replaced nodes are unregistered");
}

#[test]
fn attribute_changes() {
	let (mut runtime, mount) = runtime();
	let mut old: Vec<VNode> = vec![VNode::element("li").attribute("class", "a").attribute("title", "t").attribute("hidden", true).into()];
	runtime.render(NodeId::ROOT, &[], &mut old).unwrap();
	assert_eq!(mount.to_html(), r#"<ul><li class="a" title="t" hidden=""></li></ul>"#);

	let mut new: Vec<VNode> = vec![VNode::element("li").attribute("class", "b").attribute("title", "t").attribute("hidden", true).into()];
	let edits = runtime.diff(NodeId::ROOT, &old, &mut new).unwrap();
	assert_eq!(
		edits,
		vec![Edit::SetAttribute {
			id: old[0].id().unwrap(),
			name: "class".to_owned(),
			value: "b".into(),
			namespace: None,
		}]
	);
	runtime.apply_mutations(&edits).unwrap();

	let mut last: Vec<VNode> = vec![VNode::element("li").attribute("hidden", false).attribute("data-n", 3_i64).into()];
	runtime.render(NodeId::ROOT, &new, &mut last).unwrap();
	assert_eq!(mount.to_html(), r#"<ul><li data-n="3"></li></ul>"#);

	let mut none: Vec<VNode> = vec![VNode::element("li").attribute("data-n", AttributeValue::None).into()];
	runtime.render(NodeId::ROOT, &last, &mut none).unwrap();
	assert_eq!(mount.to_html(), "<ul><li></li></ul>");
}

#[test]
fn listener_changes() {
	let (mut runtime, _) = runtime();
	let mut old: Vec<VNode> = vec![VNode::element("li").listener("click", 1_u64).listener("keydown", 2_u64).into()];
	runtime.render(NodeId::ROOT, &[], &mut old).unwrap();
	let id = old[0].id().unwrap();
	assert_eq!(runtime.bridge().listeners_of(id).len(), 2);

	let mut new: Vec<VNode> = vec![VNode::element("li").listener("click", 3_u64).listener("keydown", 2_u64).into()];
	let edits = runtime.diff(NodeId::ROOT, &old, &mut new).unwrap();
	assert_eq!(
		edits,
		vec![
			Edit::RemoveEventListener { id, event: "click".to_owned() },
			Edit::NewEventListener {
				id,
				event: "click".to_owned(),
				listener: ListenerId(3),
			},
		]
	);
	runtime.apply_mutations(&edits).unwrap();
	assert_eq!(runtime.bridge().listeners_of(id), &[("keydown".to_owned(), ListenerId(2)), ("click".to_owned(), ListenerId(3))]);
	assert_eq!(runtime.bridge().handler_count(), 2);

	let mut bare: Vec<VNode> = vec![VNode::element("li").into()];
	runtime.render(NodeId::ROOT, &new, &mut bare).unwrap();
	assert!(runtime.bridge().listeners_of(id).is_empty());
	assert_eq!(runtime.bridge().handler_count(), 0);
}

#[test]
fn nested_children() {
	let (mut runtime, mount) = runtime();
	let list = |items: &[&str]| -> Vec<VNode> { vec![VNode::element("li").child(VNode::element("ol").children(items.iter().map(|item| VNode::element("li").child(*item)))).into()] };

	let mut old = list(&["1", "2"]);
	runtime.render(NodeId::ROOT, &[], &mut old).unwrap();
	let mut new = list(&["1", "2", "3"]);
	runtime.render(NodeId::ROOT, &old, &mut new).unwrap();
	assert_eq!(mount.to_html(), "<ul><li><ol><li>1</li><li>2</li><li>3</li></ol></li></ul>");
	assert_eq!(old[0].id(), new[0].id());
}

#[test]
fn freed_ids_are_reused_after_the_batch() {
	let (mut runtime, _) = runtime();
	let mut old: Vec<VNode> = vec!["x".into()];
	runtime.render(NodeId::ROOT, &[], &mut old).unwrap();
	let freed = old[0].id().unwrap();

	let mut new: Vec<VNode> = vec![VNode::placeholder()];
	runtime.render(NodeId::ROOT, &old, &mut new).unwrap();
	assert_ne!(new[0].id(), Some(freed));
	assert!(runtime.lookup(freed).is_none());

	let mut newer: Vec<VNode> = vec![VNode::placeholder(), "y".into()];
	runtime.render(NodeId::ROOT, &new, &mut newer).unwrap();
	assert_eq!(newer[1].id(), Some(freed));
}

#[test]
fn depth_limit_stops_descending() {
	let (mut runtime, mount) = runtime_with(RuntimeConfig { depth_limit: 2, ..RuntimeConfig::default() });
	let mut vdom: Vec<VNode> = vec![VNode::element("a").child(VNode::element("b").child(VNode::element("c").child("too deep"))).into()];
	runtime.render(NodeId::ROOT, &[], &mut vdom).unwrap();
	assert_eq!(mount.to_html(), "<ul><a><b><c></c></b></a></ul>");
}

#[test]
fn unmounted_old_nodes() {
	let (mut runtime, _) = runtime();
	let old: Vec<VNode> = vec!["never rendered".into()];
	assert_eq!(runtime.render(NodeId::ROOT, &old, &mut []), Err(DiffError::Unmounted("text")));
}
