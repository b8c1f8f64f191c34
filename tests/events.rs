use std::{
	cell::{Cell, RefCell},
	panic::{catch_unwind, AssertUnwindSafe},
	rc::Rc,
};
use vdom_patch::{
	events::{bubbles, EventData, EventKind, MouseData},
	host::{MemoryNode, MemoryTree},
	Edit, ListenerId, NodeId, Runtime, RuntimeConfig, TreeHost,
};

fn runtime() -> (Runtime<MemoryTree>, MemoryNode) {
	let _ = tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).with_test_writer().try_init();

	let mut host = MemoryTree::new();
	let mount = host.create_element("body", None).unwrap();
	let runtime = Runtime::init(host, mount.clone(), RuntimeConfig::default());
	(runtime, mount)
}

fn listen(id: u64, event: &str, listener: u64) -> Edit {
	Edit::NewEventListener {
		id: NodeId(id),
		event: event.to_owned(),
		listener: ListenerId(listener),
	}
}

/// `<body><div id=1><button id=2/></div></body>`
fn nested(runtime: &mut Runtime<MemoryTree>) {
	runtime
		.apply_mutations(&[
			Edit::PushRoot { id: NodeId::ROOT },
			Edit::CreateElement { tag: "div".to_owned(), id: NodeId(1) },
			Edit::CreateElement { tag: "button".to_owned(), id: NodeId(2) },
			Edit::AppendChildren { count: 1 },
			Edit::AppendChildren { count: 1 },
		])
		.unwrap();
}

fn recorder(runtime: &mut Runtime<MemoryTree>) -> Rc<RefCell<Vec<(ListenerId, EventData)>>> {
	let events = Rc::new(RefCell::new(Vec::new()));
	runtime.register_listener_callback({
		let events = Rc::clone(&events);
		move |listener, data| events.borrow_mut().push((listener, data))
	});
	events
}

#[test]
fn events_are_reported_by_listener_id() {
	let (mut runtime, _) = runtime();
	nested(&mut runtime);
	let events = recorder(&mut runtime);
	runtime.apply_mutations(&[listen(2, "click", 20), listen(1, "click", 10), listen(1, "focus", 11)]).unwrap();

	let click = EventData::Mouse(MouseData {
		client_x: 3.0,
		client_y: 4.0,
		button: 0,
		..MouseData::default()
	});
	let button = runtime.lookup(NodeId(2)).unwrap().clone();
	assert_eq!(MemoryTree::dispatch_event(&button, "click", &click), 2);
	assert_eq!(*events.borrow(), vec![(ListenerId(20), click.clone()), (ListenerId(10), click)]);

	// `focus` doesn't bubble.
	events.borrow_mut().clear();
	assert_eq!(MemoryTree::dispatch_event(&button, "focus", &EventData::Focus), 0);
	assert!(events.borrow().is_empty());
}

#[test]
fn one_handler_per_listener_id() {
	let (mut runtime, _) = runtime();
	nested(&mut runtime);
	runtime.apply_mutations(&[listen(1, "click", 5), listen(2, "click", 5), listen(2, "keydown", 5)]).unwrap();
	assert_eq!(runtime.bridge().handler_count(), 1);
	assert_eq!(runtime.bridge().attachment_count(), 3);

	runtime
		.apply_mutations(&[Edit::RemoveEventListener {
			id: NodeId(2),
			event: "click".to_owned(),
		}])
		.unwrap();
	assert_eq!(runtime.bridge().handler_count(), 1);
	assert!(runtime.dispatcher().is_live(ListenerId(5)));

	runtime
		.apply_mutations(&[
			Edit::RemoveEventListener {
				id: NodeId(2),
				event: "keydown".to_owned(),
			},
			Edit::RemoveEventListener {
				id: NodeId(1),
				event: "click".to_owned(),
			},
		])
		.unwrap();
	assert_eq!(runtime.bridge().handler_count(), 0);
	assert!(!runtime.dispatcher().is_live(ListenerId(5)));
}

#[test]
fn detaching_a_missing_listener_is_a_no_op() {
	let (mut runtime, _) = runtime();
	nested(&mut runtime);
	runtime
		.apply_mutations(&[Edit::RemoveEventListener {
			id: NodeId(2),
			event: "click".to_owned(),
		}])
		.unwrap();
}

#[test]
fn removed_listeners_are_not_delivered() {
	let (mut runtime, _) = runtime();
	nested(&mut runtime);
	let events = recorder(&mut runtime);
	runtime.apply_mutations(&[listen(2, "click", 1)]).unwrap();
	let button = runtime.lookup(NodeId(2)).unwrap().clone();

	runtime
		.apply_mutations(&[Edit::RemoveEventListener {
			id: NodeId(2),
			event: "click".to_owned(),
		}])
		.unwrap();
	assert_eq!(MemoryTree::dispatch_event(&button, "click", &EventData::Generic), 0);

	// A stale handler that is still around somewhere is dropped by the dispatcher.
	assert!(!runtime.dispatcher().deliver(ListenerId(1), EventData::Generic));
	assert!(events.borrow().is_empty());
}

#[test]
fn removing_a_listener_mid_dispatch() {
	let (mut runtime, _) = runtime();
	nested(&mut runtime);
	runtime.apply_mutations(&[listen(2, "click", 2), listen(1, "click", 1)]).unwrap();
	let button = runtime.lookup(NodeId(2)).unwrap().clone();

	let runtime = Rc::new(RefCell::new(runtime));
	let delivered = Rc::new(RefCell::new(Vec::new()));
	runtime.borrow_mut().register_listener_callback({
		let runtime = Rc::downgrade(&runtime);
		let delivered = Rc::clone(&delivered);
		move |listener, _| {
			delivered.borrow_mut().push(listener);
			if listener == ListenerId(2) {
				// The button's handler removes the outer div's listener before the event bubbles there.
				let runtime = runtime.upgrade().unwrap();
				runtime
					.borrow_mut()
					.apply_mutations(&[Edit::RemoveEventListener {
						id: NodeId(1),
						event: "click".to_owned(),
					}])
					.unwrap();
			}
		}
	});

	assert_eq!(MemoryTree::dispatch_event(&button, "click", &EventData::Generic), 1);
	assert_eq!(*delivered.borrow(), vec![ListenerId(2)]);

	assert_eq!(MemoryTree::dispatch_event(&button, "click", &EventData::Generic), 1);
	assert_eq!(*delivered.borrow(), vec![ListenerId(2), ListenerId(2)]);
}

#[test]
fn removing_the_node_mid_dispatch() {
	let (mut runtime, mount) = runtime();
	nested(&mut runtime);
	runtime.apply_mutations(&[listen(2, "click", 2)]).unwrap();
	let button = runtime.lookup(NodeId(2)).unwrap().clone();

	let runtime = Rc::new(RefCell::new(runtime));
	runtime.borrow_mut().register_listener_callback({
		let runtime = Rc::downgrade(&runtime);
		move |_, _| {
			let runtime = runtime.upgrade().unwrap();
			runtime.borrow_mut().apply_mutations(&[Edit::Remove { id: NodeId(2) }, Edit::Remove { id: NodeId(1) }]).unwrap();
		}
	});

	assert_eq!(MemoryTree::dispatch_event(&button, "click", &EventData::Generic), 1);
	assert_eq!(mount.to_html(), "<body></body>");
	assert_eq!(runtime.borrow().bridge().handler_count(), 0);
	assert_eq!(MemoryTree::dispatch_event(&button, "click", &EventData::Generic), 0);
}

#[test]
fn nested_deliveries_are_dropped() {
	let (mut runtime, _) = runtime();
	nested(&mut runtime);
	runtime.apply_mutations(&[listen(1, "focus", 1), listen(2, "click", 2)]).unwrap();
	let div = runtime.lookup(NodeId(1)).unwrap().clone();
	let button = runtime.lookup(NodeId(2)).unwrap().clone();

	let delivered = Rc::new(RefCell::new(Vec::new()));
	runtime.register_listener_callback({
		let delivered = Rc::clone(&delivered);
		move |listener, _| {
			delivered.borrow_mut().push(listener);
			MemoryTree::dispatch_event(&div, "focus", &EventData::Focus);
		}
	});
	MemoryTree::dispatch_event(&button, "click", &EventData::Generic);
	assert_eq!(*delivered.borrow(), vec![ListenerId(2)]);
}

#[test]
fn a_panicking_callback_doesnt_block_later_events() {
	let (mut runtime, _) = runtime();
	nested(&mut runtime);
	runtime.apply_mutations(&[listen(2, "click", 2)]).unwrap();

	let calls = Rc::new(Cell::new(0));
	runtime.register_listener_callback({
		let calls = Rc::clone(&calls);
		move |_, _| {
			calls.set(calls.get() + 1);
			if calls.get() == 1 {
				panic!("the first delivery fails");
			}
		}
	});

	let dispatcher = runtime.dispatcher();
	assert!(catch_unwind(AssertUnwindSafe(|| dispatcher.deliver(ListenerId(2), EventData::Generic))).is_err());
	assert!(dispatcher.deliver(ListenerId(2), EventData::Generic));
	assert_eq!(calls.get(), 2);
}

#[test]
fn replacing_the_callback() {
	let (mut runtime, _) = runtime();
	nested(&mut runtime);
	runtime.apply_mutations(&[listen(2, "click", 2)]).unwrap();
	let button = runtime.lookup(NodeId(2)).unwrap().clone();

	let first = recorder(&mut runtime);
	let second = recorder(&mut runtime);
	MemoryTree::dispatch_event(&button, "click", &EventData::Generic);
	assert!(first.borrow().is_empty());
	assert_eq!(second.borrow().len(), 1);
}

#[test]
fn classification() {
	assert_eq!(EventKind::of("click"), EventKind::Mouse);
	assert_eq!(EventKind::of("pointerdown"), EventKind::Pointer);
	assert_eq!(EventKind::of("keyup"), EventKind::Keyboard);
	assert_eq!(EventKind::of("input"), EventKind::Form);
	assert_eq!(EventKind::of("scroll"), EventKind::Scroll);
	assert_eq!(EventKind::of("play"), EventKind::Generic);
	assert_eq!(EventData::Focus.kind(), EventKind::Focus);

	assert!(bubbles("click"));
	assert!(bubbles("input"));
	assert!(!bubbles("focus"));
	assert!(!bubbles("mouseenter"));
	assert!(!bubbles("scroll"));
}
