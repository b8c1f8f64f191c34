//! Extraction of [`EventData`] from `web_sys::Event`s.

use super::{AnimationData, CompositionData, EventData, EventKind, FormData, KeyboardData, Modifiers, MouseData, PointerData, ScrollData, TouchData, TouchPoint, TransitionData, WheelData};
use tracing::trace;
use wasm_bindgen::JsCast;
use web_sys::{AnimationEvent, CompositionEvent, Element, HtmlFormElement, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement, KeyboardEvent, MouseEvent, PointerEvent, TouchEvent, TouchList, TransitionEvent, WheelEvent};

/// Falls back to [`EventData::Generic`] iff the event isn't of the interface its type implies.
pub(crate) fn extract(event: &web_sys::Event) -> EventData {
	let kind = EventKind::of(&event.type_());
	let data = match kind {
		EventKind::Mouse => event.dyn_ref::<MouseEvent>().map(|event| EventData::Mouse(mouse(event))),
		EventKind::Pointer => event.dyn_ref::<PointerEvent>().map(|event| {
			EventData::Pointer(PointerData {
				mouse: mouse(event),
				pointer_id: event.pointer_id(),
				width: f64::from(event.width()),
				height: f64::from(event.height()),
				pressure: event.pressure(),
				tangential_pressure: event.tangential_pressure(),
				tilt_x: event.tilt_x(),
				tilt_y: event.tilt_y(),
				twist: event.twist(),
				pointer_type: event.pointer_type(),
				is_primary: event.is_primary(),
			})
		}),
		EventKind::Keyboard => event.dyn_ref::<KeyboardEvent>().map(|event| {
			EventData::Keyboard(KeyboardData {
				key: event.key(),
				code: event.code(),
				location: event.location(),
				repeat: event.repeat(),
				is_composing: event.is_composing(),
				modifiers: Modifiers {
					alt: event.alt_key(),
					ctrl: event.ctrl_key(),
					meta: event.meta_key(),
					shift: event.shift_key(),
				},
			})
		}),
		EventKind::Wheel => event.dyn_ref::<WheelEvent>().map(|event| {
			EventData::Wheel(WheelData {
				mouse: mouse(event),
				delta_x: event.delta_x(),
				delta_y: event.delta_y(),
				delta_z: event.delta_z(),
				delta_mode: event.delta_mode(),
			})
		}),
		EventKind::Touch => event.dyn_ref::<TouchEvent>().map(|event| {
			EventData::Touch(TouchData {
				touches: touch_points(&event.touches()),
				changed_touches: touch_points(&event.changed_touches()),
				target_touches: touch_points(&event.target_touches()),
				modifiers: Modifiers {
					alt: event.alt_key(),
					ctrl: event.ctrl_key(),
					meta: event.meta_key(),
					shift: event.shift_key(),
				},
			})
		}),
		EventKind::Focus => Some(EventData::Focus),
		EventKind::Form => Some(EventData::Form(form(event))),
		EventKind::Composition => event
			.dyn_ref::<CompositionEvent>()
			.map(|event| EventData::Composition(CompositionData { data: event.data().unwrap_or_default() })),
		EventKind::Animation => event.dyn_ref::<AnimationEvent>().map(|event| {
			EventData::Animation(AnimationData {
				animation_name: event.animation_name(),
				pseudo_element: event.pseudo_element(),
				elapsed_time: event.elapsed_time(),
			})
		}),
		EventKind::Transition => event.dyn_ref::<TransitionEvent>().map(|event| {
			EventData::Transition(TransitionData {
				property_name: event.property_name(),
				pseudo_element: event.pseudo_element(),
				elapsed_time: event.elapsed_time(),
			})
		}),
		EventKind::Scroll => Some(EventData::Scroll(
			event
				.target()
				.and_then(|target| target.dyn_into::<Element>().ok())
				.map(|element| ScrollData {
					scroll_top: f64::from(element.scroll_top()),
					scroll_left: f64::from(element.scroll_left()),
				})
				.unwrap_or_default(),
		)),
		EventKind::Generic => Some(EventData::Generic),
	};
	data.unwrap_or_else(|| {
		trace!(?kind, "Event doesn't implement the expected interface.");
		EventData::Generic
	})
}

fn mouse(event: &MouseEvent) -> MouseData {
	MouseData {
		client_x: f64::from(event.client_x()),
		client_y: f64::from(event.client_y()),
		page_x: f64::from(event.page_x()),
		page_y: f64::from(event.page_y()),
		screen_x: f64::from(event.screen_x()),
		screen_y: f64::from(event.screen_y()),
		offset_x: f64::from(event.offset_x()),
		offset_y: f64::from(event.offset_y()),
		button: event.button(),
		buttons: event.buttons(),
		modifiers: Modifiers {
			alt: event.alt_key(),
			ctrl: event.ctrl_key(),
			meta: event.meta_key(),
			shift: event.shift_key(),
		},
	}
}

fn touch_points(list: &TouchList) -> Vec<TouchPoint> {
	(0..list.length())
		.filter_map(|index| list.get(index))
		.map(|touch| TouchPoint {
			identifier: touch.identifier(),
			client_x: f64::from(touch.client_x()),
			client_y: f64::from(touch.client_y()),
			page_x: f64::from(touch.page_x()),
			page_y: f64::from(touch.page_y()),
			screen_x: f64::from(touch.screen_x()),
			screen_y: f64::from(touch.screen_y()),
		})
		.collect()
}

/// Checkboxes and radio buttons report `"true"` or `"false"`.
fn control_value(element: &Element) -> Option<String> {
	if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
		Some(match input.type_().as_str() {
			"checkbox" | "radio" => input.checked().to_string(),
			_ => input.value(),
		})
	} else if let Some(text_area) = element.dyn_ref::<HtmlTextAreaElement>() {
		Some(text_area.value())
	} else {
		element.dyn_ref::<HtmlSelectElement>().map(HtmlSelectElement::value)
	}
}

fn form(event: &web_sys::Event) -> FormData {
	let target = match event.target().and_then(|target| target.dyn_into::<Element>().ok()) {
		Some(target) => target,
		None => return FormData::default(),
	};

	let mut data = FormData {
		value: control_value(&target).unwrap_or_default(),
		values: Vec::new(),
	};
	if let Some(form) = target.dyn_ref::<HtmlFormElement>() {
		let controls = form.elements();
		for index in 0..controls.length() {
			let control = match controls.item(index) {
				Some(control) => control,
				None => continue,
			};
			let name = match control.get_attribute("name") {
				Some(name) if !name.is_empty() => name,
				_ => continue,
			};
			if let Some(value) = control_value(&control) {
				data.values.push((name, value));
			}
		}
	}
	data
}
