#![cfg(target_arch = "wasm32")]

use std::{cell::RefCell, rc::Rc};
use vdom_patch::{events::EventData, host::WebTree, vdom::VNode, ListenerId, NodeId, Runtime, RuntimeConfig};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, HtmlBodyElement, HtmlElement};

wasm_bindgen_test_configure!(run_in_browser);

static mut LOG_INITIALIZED: bool = false;

#[wasm_bindgen_test]
fn click() {
	unsafe {
		if !LOG_INITIALIZED {
			tracing_wasm::set_as_global_default();
			LOG_INITIALIZED = true;
		}
	}

	let body = window().unwrap().document().unwrap().body().unwrap().dyn_into::<HtmlBodyElement>().unwrap();
	let mut runtime = Runtime::init(WebTree::from_window().unwrap(), body.into(), RuntimeConfig::default());

	let clicks = Rc::new(RefCell::new(Vec::new()));
	runtime.register_listener_callback({
		let clicks = Rc::clone(&clicks);
		move |listener, data| clicks.borrow_mut().push((listener, data))
	});

	let mut vdom: Vec<VNode> = vec![VNode::element("BUTTON").attribute("id", "test-button").listener("click", 7_u64).into()];
	runtime.render(NodeId::ROOT, &[], &mut vdom).unwrap();
	assert!(clicks.borrow().is_empty());

	let button: HtmlElement = window().unwrap().document().unwrap().get_element_by_id("test-button").unwrap().dyn_into().unwrap();
	button.click();

	assert_eq!(clicks.borrow().len(), 1);
	assert_eq!(clicks.borrow()[0].0, ListenerId(7));
	assert!(matches!(clicks.borrow()[0].1, EventData::Mouse(_)));

	runtime.render(NodeId::ROOT, &vdom, &mut []).unwrap();
	assert_eq!(runtime.bridge().handler_count(), 0);
	button.click();
	assert_eq!(clicks.borrow().len(), 1);
}
