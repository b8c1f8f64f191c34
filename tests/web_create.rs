#![cfg(target_arch = "wasm32")]

use vdom_patch::{host::WebTree, vdom::VNode, Edit, NodeId, Runtime, RuntimeConfig};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, Element};

wasm_bindgen_test_configure!(run_in_browser);

fn mount() -> Element {
	let document = window().unwrap().document().unwrap();
	let mount = document.create_element("div").unwrap();
	document.body().unwrap().append_child(&mount).unwrap();
	mount
}

#[wasm_bindgen_test]
fn comment() {
	let mount = mount();
	let mut runtime = Runtime::init(WebTree::from_window().unwrap(), mount.clone().into(), RuntimeConfig::default());
	runtime.render(NodeId::ROOT, &[], &mut [VNode::placeholder()]).unwrap();
	assert_eq!(mount.child_nodes().length(), 1);
	assert!(mount.first_child().unwrap().dyn_ref::<web_sys::Comment>().is_some());
}

#[wasm_bindgen_test]
fn text() {
	let mount = mount();
	let mut runtime = Runtime::init(WebTree::from_window().unwrap(), mount.clone().into(), RuntimeConfig::default());
	runtime
		.apply_mutations(&[
			Edit::PushRoot { id: NodeId::ROOT },
			Edit::CreateTextNode { text: "Hello vdom-patch!".to_owned(), id: NodeId(1) },
			Edit::AppendChildren { count: 1 },
			Edit::SetText { id: NodeId(1), text: "Hello again!".to_owned() },
		])
		.unwrap();
	assert_eq!(mount.inner_html(), "Hello again!");
}

#[wasm_bindgen_test]
fn attributes_and_namespaces() {
	let mount = mount();
	let mut runtime = Runtime::init(WebTree::from_window().unwrap(), mount.clone().into(), RuntimeConfig::default());
	let mut vdom: Vec<VNode> = vec![
		VNode::element("input").attribute("disabled", true).attribute("maxlength", 3_i64).into(),
		VNode::element("svg").namespace("http://www.w3.org/2000/svg").into(),
	];
	runtime.render(NodeId::ROOT, &[], &mut vdom).unwrap();
	assert_eq!(mount.inner_html(), r#"<input disabled="" maxlength="3"><svg></svg>"#);
	assert_eq!(mount.last_element_child().unwrap().namespace_uri().as_deref(), Some("http://www.w3.org/2000/svg"));

	let mut next: Vec<VNode> = vec![VNode::element("input").attribute("disabled", false).into(), "done".into()];
	runtime.render(NodeId::ROOT, &vdom, &mut next).unwrap();
	assert_eq!(mount.inner_html(), "<input>done");
}

#[wasm_bindgen_test]
fn keyed_reorder() {
	let mount = mount();
	let mut runtime = Runtime::init(WebTree::from_window().unwrap(), mount.clone().into(), RuntimeConfig::default());
	let list = |keys: &[&str]| -> Vec<VNode> { keys.iter().map(|&key| VNode::element("p").key(key).child(key).into()).collect() };

	let mut old = list(&["a", "b", "c", "d"]);
	runtime.render(NodeId::ROOT, &[], &mut old).unwrap();
	let first = mount.first_child().unwrap();

	let mut new = list(&["d", "b", "x", "a"]);
	runtime.render(NodeId::ROOT, &old, &mut new).unwrap();
	assert_eq!(mount.inner_html(), "<p>d</p><p>b</p><p>x</p><p>a</p>");
	assert!(mount.last_child().unwrap().is_same_node(Some(&first)));
}

#[wasm_bindgen_test]
fn templates() {
	let mount = mount();
	let mut runtime = Runtime::init(WebTree::from_window().unwrap(), mount.clone().into(), RuntimeConfig::default());
	runtime
		.save_template(
			"row",
			0,
			vec![
				Edit::CreateElement { tag: "span".to_owned(), id: NodeId(1) },
				Edit::CreateTextNode { text: "row".to_owned(), id: NodeId(2) },
				Edit::AppendChildren { count: 1 },
			],
		)
		.unwrap();
	runtime
		.apply_mutations(&[
			Edit::PushRoot { id: NodeId::ROOT },
			Edit::LoadTemplate { name: "row".to_owned(), index: 0, id: NodeId(10) },
			Edit::LoadTemplate { name: "row".to_owned(), index: 0, id: NodeId(11) },
			Edit::AppendChildren { count: 2 },
		])
		.unwrap();
	assert_eq!(mount.inner_html(), "<span>row</span><span>row</span>");
}
