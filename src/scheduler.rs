//! Deferring batches to the host's next animation frame, idle period or timeout.

use crate::{Edit, HostError, Runtime, TreeHost};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
	mem,
};
use std::{collections::VecDeque, rc::Rc};
use tracing::{error, instrument, trace, warn};

pub type Task = Box<dyn FnOnce()>;

/// When a scheduled [`Task`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
	/// Before the next repaint.
	AnimationFrame,
	/// When the host is idle, or soon if it can't tell.
	Idle,
	/// After at least this many milliseconds.
	Delay(u32),
}

/// Runs tasks later on the current thread.
pub trait Scheduler {
	/// # Errors
	///
	/// Iff the host refuses to schedule `task`. It is dropped in that case.
	fn schedule(&self, slot: Slot, task: Task) -> Result<(), HostError>;
}

/// Queues tasks until [`ManualScheduler::run_pending`] is called.
#[derive(Default)]
pub struct ManualScheduler {
	queue: RefCell<VecDeque<(Slot, Task)>>,
}
impl Debug for ManualScheduler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let slots: Vec<Slot> = self.queue.borrow().iter().map(|&(slot, _)| slot).collect();
		f.debug_struct("ManualScheduler").field("queue", &slots).finish()
	}
}
impl ManualScheduler {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn pending(&self) -> usize {
		self.queue.borrow().len()
	}

	/// Runs the tasks that were scheduled before this call, in order, regardless of their slot.
	///
	/// Tasks scheduled while running are left for the next call.
	pub fn run_pending(&self) -> usize {
		let tasks = mem::take(&mut *self.queue.borrow_mut());
		let count = tasks.len();
		for (slot, task) in tasks {
			trace!(?slot, "Running task.");
			task();
		}
		count
	}

	/// Runs only the pending tasks scheduled for `slot`.
	pub fn run_slot(&self, slot: Slot) -> usize {
		let (matching, rest): (VecDeque<_>, VecDeque<_>) = mem::take(&mut *self.queue.borrow_mut()).into_iter().partition(|&(candidate, _)| candidate == slot);
		self.queue.borrow_mut().extend(rest);
		let count = matching.len();
		for (_, task) in matching {
			task();
		}
		count
	}
}
impl Scheduler for ManualScheduler {
	fn schedule(&self, slot: Slot, task: Task) -> Result<(), HostError> {
		self.queue.borrow_mut().push_back((slot, task));
		Ok(())
	}
}
impl<S: Scheduler + ?Sized> Scheduler for Rc<S> {
	fn schedule(&self, slot: Slot, task: Task) -> Result<(), HostError> {
		(**self).schedule(slot, task)
	}
}

#[cfg(target_arch = "wasm32")]
pub use web::WebScheduler;

#[cfg(target_arch = "wasm32")]
mod web {
	use super::{Scheduler, Slot, Task};
	use crate::HostError;
	use js_sys::{Function, Reflect};
	use tracing::trace;
	use wasm_bindgen::{closure::Closure, JsCast, JsValue};

	/// Schedules through `requestAnimationFrame`, `requestIdleCallback` and `setTimeout`.
	///
	/// Without `requestIdleCallback`, [`Slot::Idle`] falls back to a zero timeout.
	#[derive(Debug, Clone)]
	pub struct WebScheduler {
		window: web_sys::Window,
	}
	impl WebScheduler {
		/// # Errors
		///
		/// Iff there is no global `window`.
		pub fn new() -> Result<Self, HostError> {
			web_sys::window()
				.map(|window| Self { window })
				.ok_or_else(|| HostError::new("window", "There is no global `window`."))
		}

		fn set_timeout(&self, callback: &Function, delay: u32) -> Result<(), HostError> {
			let delay = i32::try_from(delay).unwrap_or(i32::MAX);
			self.window
				.set_timeout_with_callback_and_timeout_and_arguments_0(callback, delay)
				.map(drop)
				.map_err(|error| HostError::new("setTimeout", format!("{:?}", error)))
		}
	}
	impl Scheduler for WebScheduler {
		fn schedule(&self, slot: Slot, task: Task) -> Result<(), HostError> {
			let callback: Function = Closure::once_into_js(move || task()).unchecked_into();
			match slot {
				Slot::AnimationFrame => self
					.window
					.request_animation_frame(&callback)
					.map(drop)
					.map_err(|error| HostError::new("requestAnimationFrame", format!("{:?}", error))),
				Slot::Idle => match Reflect::get(&self.window, &JsValue::from_str("requestIdleCallback")).map(JsCast::dyn_into::<Function>) {
					Ok(Ok(request_idle_callback)) => request_idle_callback
						.call1(&self.window, &callback)
						.map(drop)
						.map_err(|error| HostError::new("requestIdleCallback", format!("{:?}", error))),
					_ => {
						trace!("`requestIdleCallback` is unavailable. Falling back to `setTimeout`.");
						self.set_timeout(&callback, 0)
					}
				},
				Slot::Delay(delay) => self.set_timeout(&callback, delay),
			}
		}
	}
}

struct Shared<H: TreeHost, S: Scheduler> {
	runtime: Rc<RefCell<Runtime<H>>>,
	scheduler: S,
	slot: Slot,
	queue: RefCell<VecDeque<Vec<Edit>>>,
	scheduled: Cell<bool>,
}

/// Collects batches and applies them together in the next [`Slot`].
///
/// At most one flush is scheduled at a time. Batch errors are logged, not propagated.
pub struct FrameLoop<H: TreeHost, S: Scheduler> {
	shared: Rc<Shared<H, S>>,
}
impl<H: TreeHost, S: Scheduler> Debug for FrameLoop<H, S> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("FrameLoop")
			.field("slot", &self.shared.slot)
			.field("queued", &self.shared.queue.borrow().len())
			.field("scheduled", &self.shared.scheduled.get())
			.finish()
	}
}
impl<H, S> FrameLoop<H, S>
where
	H: TreeHost + 'static,
	H::Node: 'static,
	H::Handler: 'static,
	S: Scheduler + 'static,
{
	#[must_use]
	pub fn new(runtime: Rc<RefCell<Runtime<H>>>, scheduler: S, slot: Slot) -> Self {
		Self {
			shared: Rc::new(Shared {
				runtime,
				scheduler,
				slot,
				queue: RefCell::new(VecDeque::new()),
				scheduled: Cell::new(false),
			}),
		}
	}

	#[must_use]
	pub fn runtime(&self) -> &Rc<RefCell<Runtime<H>>> {
		&self.shared.runtime
	}

	/// How many batches are waiting for the next flush.
	#[must_use]
	pub fn queued(&self) -> usize {
		self.shared.queue.borrow().len()
	}

	/// Queues `batch`, scheduling a flush if none is pending.
	///
	/// # Errors
	///
	/// Iff a flush was needed but couldn't be scheduled. The batch stays queued.
	#[instrument(skip(self, batch), fields(len = batch.len()))]
	pub fn submit(&self, batch: Vec<Edit>) -> Result<(), HostError> {
		self.shared.queue.borrow_mut().push_back(batch);
		Self::ensure_scheduled(&self.shared)
	}

	/// Applies all queued batches right away. Returns how many were applied.
	pub fn flush_now(&self) -> usize {
		Self::flush(&self.shared)
	}

	fn ensure_scheduled(shared: &Rc<Shared<H, S>>) -> Result<(), HostError> {
		if shared.scheduled.replace(true) {
			return Ok(());
		}
		let task_shared = Rc::clone(shared);
		shared
			.scheduler
			.schedule(
				shared.slot,
				Box::new(move || {
					task_shared.scheduled.set(false);
					Self::flush(&task_shared);
				}),
			)
			.map_err(|error| {
				shared.scheduled.set(false);
				error
			})
	}

	fn flush(shared: &Rc<Shared<H, S>>) -> usize {
		let mut runtime = match shared.runtime.try_borrow_mut() {
			Ok(runtime) => runtime,
			Err(_) => {
				warn!("The runtime is busy. Postponing the flush.");
				if let Err(error) = Self::ensure_scheduled(shared) {
					error!("Could not reschedule the flush: {}", error);
				}
				return 0;
			}
		};

		let batches = mem::take(&mut *shared.queue.borrow_mut());
		let count = batches.len();
		for (position, batch) in batches.into_iter().enumerate() {
			if let Err(error) = runtime.apply_mutations(&batch) {
				error!("Batch {} of {} in this flush failed: {}", position + 1, count, error);
			}
		}
		trace!("Flushed {} batch(es).", count);
		count
	}
}
