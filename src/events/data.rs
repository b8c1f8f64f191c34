//! The typed field bags extracted from native events.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
	pub alt: bool,
	pub ctrl: bool,
	pub meta: bool,
	pub shift: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MouseData {
	pub client_x: f64,
	pub client_y: f64,
	pub page_x: f64,
	pub page_y: f64,
	pub screen_x: f64,
	pub screen_y: f64,
	pub offset_x: f64,
	pub offset_y: f64,
	pub button: i16,
	pub buttons: u16,
	pub modifiers: Modifiers,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointerData {
	pub mouse: MouseData,
	pub pointer_id: i32,
	pub width: f64,
	pub height: f64,
	pub pressure: f32,
	pub tangential_pressure: f32,
	pub tilt_x: i32,
	pub tilt_y: i32,
	pub twist: i32,
	pub pointer_type: String,
	pub is_primary: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyboardData {
	pub key: String,
	pub code: String,
	pub location: u32,
	pub repeat: bool,
	pub is_composing: bool,
	pub modifiers: Modifiers,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WheelData {
	pub mouse: MouseData,
	pub delta_x: f64,
	pub delta_y: f64,
	pub delta_z: f64,
	pub delta_mode: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TouchPoint {
	pub identifier: i32,
	pub client_x: f64,
	pub client_y: f64,
	pub page_x: f64,
	pub page_y: f64,
	pub screen_x: f64,
	pub screen_y: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TouchData {
	pub touches: Vec<TouchPoint>,
	pub changed_touches: Vec<TouchPoint>,
	pub target_touches: Vec<TouchPoint>,
	pub modifiers: Modifiers,
}

/// The value of the event target, and for form submissions the named controls' values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
	pub value: String,
	pub values: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositionData {
	pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationData {
	pub animation_name: String,
	pub pseudo_element: String,
	pub elapsed_time: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionData {
	pub property_name: String,
	pub pseudo_element: String,
	pub elapsed_time: f32,
}

/// The scroll position of the event target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrollData {
	pub scroll_top: f64,
	pub scroll_left: f64,
}

/// What is reported for one event, next to the [`ListenerId`](`crate::ListenerId`).
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
	Mouse(MouseData),
	Pointer(PointerData),
	Keyboard(KeyboardData),
	Wheel(WheelData),
	Touch(TouchData),
	Focus,
	Form(FormData),
	Composition(CompositionData),
	Animation(AnimationData),
	Transition(TransitionData),
	Scroll(ScrollData),
	/// Events without extracted fields, like media events.
	Generic,
}
impl EventData {
	#[must_use]
	pub fn kind(&self) -> EventKind {
		match self {
			EventData::Mouse(_) => EventKind::Mouse,
			EventData::Pointer(_) => EventKind::Pointer,
			EventData::Keyboard(_) => EventKind::Keyboard,
			EventData::Wheel(_) => EventKind::Wheel,
			EventData::Touch(_) => EventKind::Touch,
			EventData::Focus => EventKind::Focus,
			EventData::Form(_) => EventKind::Form,
			EventData::Composition(_) => EventKind::Composition,
			EventData::Animation(_) => EventKind::Animation,
			EventData::Transition(_) => EventKind::Transition,
			EventData::Scroll(_) => EventKind::Scroll,
			EventData::Generic => EventKind::Generic,
		}
	}
}

/// Which field bag an event type is extracted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
	Mouse,
	Pointer,
	Keyboard,
	Wheel,
	Touch,
	Focus,
	Form,
	Composition,
	Animation,
	Transition,
	Scroll,
	Generic,
}
impl EventKind {
	#[must_use]
	pub fn of(event: &str) -> Self {
		match event {
			"click" | "auxclick" | "contextmenu" | "dblclick" | "doubleclick" | "drag" | "dragend" | "dragenter" | "dragexit" | "dragleave" | "dragover" | "dragstart" | "drop" | "mousedown"
			| "mouseenter" | "mouseleave" | "mousemove" | "mouseout" | "mouseover" | "mouseup" => EventKind::Mouse,
			"pointerdown" | "pointermove" | "pointerup" | "pointercancel" | "gotpointercapture" | "lostpointercapture" | "pointerenter" | "pointerleave" | "pointerover" | "pointerout" => {
				EventKind::Pointer
			}
			"keydown" | "keypress" | "keyup" => EventKind::Keyboard,
			"wheel" => EventKind::Wheel,
			"touchstart" | "touchmove" | "touchend" | "touchcancel" => EventKind::Touch,
			"focus" | "blur" | "focusin" | "focusout" => EventKind::Focus,
			"input" | "change" | "submit" | "reset" | "invalid" => EventKind::Form,
			"compositionstart" | "compositionupdate" | "compositionend" => EventKind::Composition,
			"animationstart" | "animationend" | "animationiteration" => EventKind::Animation,
			"transitionrun" | "transitionstart" | "transitionend" | "transitioncancel" => EventKind::Transition,
			"scroll" | "scrollend" => EventKind::Scroll,
			_ => EventKind::Generic,
		}
	}
}

/// Whether events of this type propagate to ancestors.
#[must_use]
pub fn bubbles(event: &str) -> bool {
	!matches!(
		event,
		"abort"
			| "blur" | "canplay"
			| "canplaythrough"
			| "durationchange"
			| "emptied" | "encrypted"
			| "ended" | "error"
			| "focus" | "load"
			| "loadeddata"
			| "loadedmetadata"
			| "loadstart"
			| "mouseenter"
			| "mouseleave"
			| "pause" | "play"
			| "playing" | "pointerenter"
			| "pointerleave"
			| "progress"
			| "ratechange"
			| "scroll" | "seeked"
			| "seeking" | "stalled"
			| "suspend" | "timeupdate"
			| "toggle" | "volumechange"
			| "waiting"
	)
}
