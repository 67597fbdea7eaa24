//! Readiness selector.
//!
//! A [`Selector`] owns an OS polling backend and a table of registered
//! channels. One thread drives [`Selector::poll`]; any thread may register,
//! cancel keys, or call [`Selector::wakeup`].
//!
//! ```ignore
//! use selectlane::{Ops, Protocol, Selector, SelectableChannel, ServerSocketChannel};
//!
//! let selector = Selector::new();
//! selector.open()?;
//! let mut server = ServerSocketChannel::open(Protocol::TCP4)?;
//! server.bind("127.0.0.1", 0)?;
//! server.listen(64)?;
//! server.register(&selector, Ops::ACCEPT, None)?;
//! for key in selector.poll(None)? {
//!     if key.is_acceptable() { /* server.accept() */ }
//! }
//! ```

macro_rules! syscall {
	($fn: ident ( $($arg: expr),* $(,)* ) ) => {{
		#[allow(unused_unsafe)]
		let res = unsafe { libc::$fn($($arg, )*) };
		if res == -1 {
			Err(std::io::Error::last_os_error())
		} else {
			Ok(res)
		}
	}};
}

mod key;
mod notifier;
mod os;

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use self::notifier::NOTIFY_KEY;
use self::os::{EventBuf, Interest, OsPoller, ReadinessPoll};
use crate::error::{NetError, Result};
use crate::sync::Mutex;

pub use self::key::{Attachment, Ops, SelectionKey};

/// Selector tuning.
#[derive(Debug, Clone, Copy)]
pub struct SelectorConfig {
	/// Maximum backend events collected by one wait.
	pub event_capacity: usize,
}

impl Default for SelectorConfig {
	fn default() -> Self {
		Self { event_capacity: 256 }
	}
}

impl SelectorConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn event_capacity(mut self, capacity: usize) -> Self {
		self.event_capacity = capacity;
		self
	}
}

enum PollerState {
	Unopened,
	Open(Arc<OsPoller>),
	Closed,
}

pub(crate) struct SelectorInner {
	config: SelectorConfig,
	state: Mutex<PollerState>,
	registry: Mutex<HashMap<u64, SelectionKey>>,
	events: Mutex<EventBuf>,
	next_token: AtomicU64,
	wakeup_pending: AtomicBool,
}

/// Multiplexes readiness of registered channels.
///
/// `Unopened → Open → Closed`. Clones share the same backend and
/// registration table.
#[derive(Clone)]
pub struct Selector {
	pub(crate) inner: Arc<SelectorInner>,
}

fn backend_error(err: io::Error, op: &'static str) -> NetError {
	NetError::Selector { errno: err.raw_os_error().unwrap_or(0), op }
}

fn to_interest(ops: Ops) -> Interest {
	Interest {
		readable: ops.intersects(Ops::READ | Ops::ACCEPT),
		writable: ops.intersects(Ops::WRITE | Ops::CONNECT),
	}
}

impl Selector {
	/// An unopened selector; call [`open`](Self::open) before use.
	pub fn new() -> Self {
		Self::with_config(SelectorConfig::default())
	}

	pub fn with_config(config: SelectorConfig) -> Self {
		Selector {
			inner: Arc::new(SelectorInner {
				config,
				state: Mutex::new(PollerState::Unopened),
				registry: Mutex::new(HashMap::new()),
				events: Mutex::new(EventBuf(Vec::new())),
				next_token: AtomicU64::new(0),
				wakeup_pending: AtomicBool::new(false),
			}),
		}
	}

	/// Allocates the backend and wakeup pipe. A no-op when already open;
	/// a closed selector cannot be reopened.
	pub fn open(&self) -> Result<()> {
		let mut state = self.inner.state.lock();
		match *state {
			PollerState::Open(_) => Ok(()),
			PollerState::Closed => Err(NetError::SelectorNotOpen),
			PollerState::Unopened => {
				let poller = OsPoller::new().map_err(|e| backend_error(e, OsPoller::CREATE))?;
				*self.inner.events.lock() = EventBuf::with_capacity(self.inner.config.event_capacity);
				*state = PollerState::Open(Arc::new(poller));
				debug!(capacity = self.inner.config.event_capacity, "selector opened");
				Ok(())
			}
		}
	}

	pub fn is_open(&self) -> bool {
		matches!(*self.inner.state.lock(), PollerState::Open(_))
	}

	/// Releases the backend and invalidates every key. A poll blocked on
	/// another thread returns with an empty set.
	pub fn close(&self) {
		let poller = match std::mem::replace(&mut *self.inner.state.lock(), PollerState::Closed) {
			PollerState::Open(poller) => Some(poller),
			_ => None,
		};
		let keys: Vec<SelectionKey> = self.inner.registry.lock().drain().map(|(_, key)| key).collect();
		for key in &keys {
			key.invalidate();
			key.inner.armed.store(false, Ordering::Release);
		}
		if let Some(poller) = poller {
			let _ = poller.notify();
			debug!(keys = keys.len(), "selector closed");
		}
	}

	/// Makes the current or next `poll` return immediately. Wakeups do
	/// not accumulate: any number of calls before a poll release one poll.
	pub fn wakeup(&self) -> Result<()> {
		let poller = self.inner.poller()?;
		if !self.inner.wakeup_pending.swap(true, Ordering::AcqRel) {
			if let Err(err) = poller.notify() {
				self.inner.wakeup_pending.store(false, Ordering::Release);
				return Err(backend_error(err, "write"));
			}
		}
		Ok(())
	}

	/// Every valid registered key.
	pub fn keys(&self) -> Vec<SelectionKey> {
		self.inner.registry.lock().values().filter(|key| key.is_valid()).cloned().collect()
	}

	/// Waits for readiness and returns the keys with a non-empty ready set.
	///
	/// `None` waits indefinitely. Ready sets from the previous call are
	/// cleared first. An interrupted wait returns an empty set.
	pub fn poll(&self, timeout: Option<Duration>) -> Result<Vec<SelectionKey>> {
		let poller = self.inner.poller()?;
		let mut events = self.inner.events.lock();

		for key in self.inner.registry.lock().values() {
			key.set_ready(Ops::NONE);
		}

		let n = match poller.wait(&mut events.0, timeout) {
			Ok(n) => n,
			Err(err) if err.kind() == io::ErrorKind::Interrupted => 0,
			Err(err) => return Err(backend_error(err, OsPoller::WAIT)),
		};

		let mut woke = false;
		let mut selected = Vec::new();
		{
			let registry = self.inner.registry.lock();
			for native in &events.0[..n] {
				let event = OsPoller::event(native);
				if event.token == NOTIFY_KEY {
					woke = true;
					continue;
				}
				let Some(key) = registry.get(&event.token) else { continue };
				if !key.is_valid() {
					continue;
				}

				let interest = key.interest();
				let mut ready = Ops::NONE;
				if event.readable || event.error {
					ready |= interest & (Ops::READ | Ops::ACCEPT);
				}
				if event.writable || event.error {
					// Connect completion is reported on its own, once.
					if interest.contains(Ops::CONNECT) {
						ready |= Ops::CONNECT;
					} else {
						ready |= interest & Ops::WRITE;
					}
				}
				if ready.is_empty() {
					continue;
				}

				// kqueue reports read and write as separate events.
				let previous = key.ready();
				key.set_ready(previous | ready);
				if previous.is_empty() {
					selected.push(key.clone());
				}
			}

			for key in selected.iter().filter(|key| key.is_connectable()) {
				let remaining = key.interest() & !Ops::CONNECT;
				key.store_interest(remaining);
				if let Err(err) = self.inner.sync_backend(&poller, key, remaining) {
					warn!(token = key.token(), error = %err, "failed to disarm connect interest");
				}
			}
		}

		if woke {
			self.inner.wakeup_pending.store(false, Ordering::Release);
			let drained = poller.drain();
			if self.inner.wakeup_pending.load(Ordering::Acquire) {
				let _ = poller.notify();
			}
			trace!(drained, "wakeup consumed");
		}

		trace!(events = n, ready = selected.len(), woke, "poll");
		Ok(selected)
	}

	/// Adds `fd` to the table and returns its new key.
	pub(crate) fn register(
		&self,
		fd: RawFd,
		valid_ops: Ops,
		interest: Ops,
		attachment: Option<Attachment>,
	) -> Result<SelectionKey> {
		if !valid_ops.contains(interest) {
			return Err(NetError::InvalidInterestOps { requested: interest.bits(), valid: valid_ops.bits() });
		}
		let poller = self.inner.poller()?;
		let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
		let key = SelectionKey::new(token, fd, valid_ops, interest, attachment, Arc::downgrade(&self.inner));

		let mut registry = self.inner.registry.lock();
		self.inner.sync_backend(&poller, &key, interest)?;
		registry.insert(token, key.clone());
		debug!(token, fd, interest = ?interest, "channel registered");
		Ok(key)
	}
}

impl SelectorInner {
	fn poller(&self) -> Result<Arc<OsPoller>> {
		match &*self.state.lock() {
			PollerState::Open(poller) => Ok(Arc::clone(poller)),
			_ => Err(NetError::SelectorNotOpen),
		}
	}

	/// Brings the backend in line with `ops`, adding, modifying or removing
	/// the descriptor as needed.
	fn sync_backend(&self, poller: &OsPoller, key: &SelectionKey, ops: Ops) -> Result<()> {
		let interest = to_interest(ops);
		let armed = key.inner.armed.load(Ordering::Acquire);
		let result = if interest.is_empty() {
			if armed {
				key.inner.armed.store(false, Ordering::Release);
				poller.delete(key.fd())
			} else {
				Ok(())
			}
		} else if armed {
			poller.modify(key.fd(), key.token(), interest)
		} else {
			poller.add(key.fd(), key.token(), interest).map(|()| key.inner.armed.store(true, Ordering::Release))
		};
		result.map_err(|e| backend_error(e, OsPoller::CTL))
	}

	pub(super) fn update_interest(&self, key: &SelectionKey, interest: Ops) -> Result<()> {
		let poller = self.poller()?;
		let registry = self.registry.lock();
		if !key.is_valid() || !registry.contains_key(&key.token()) {
			return Err(NetError::InvalidState { op: "set_interest", state: "cancelled" });
		}
		key.store_interest(interest);
		self.sync_backend(&poller, key, interest)?;
		trace!(token = key.token(), interest = ?interest, "interest updated");
		Ok(())
	}

	pub(super) fn deregister(&self, key: &SelectionKey) {
		let poller = self.poller().ok();
		let mut registry = self.registry.lock();
		let removed = registry.remove(&key.token()).is_some();
		key.invalidate();
		if removed && key.inner.armed.swap(false, Ordering::AcqRel) {
			if let Some(poller) = poller {
				if let Err(err) = poller.delete(key.fd()) {
					trace!(token = key.token(), error = %err, "backend delete failed");
				}
			}
		}
		debug!(token = key.token(), fd = key.fd(), "key cancelled");
	}
}

impl Drop for SelectorInner {
	fn drop(&mut self) {
		// Keys outlive the selector; they must stop claiming their channel.
		for key in self.registry.lock().values() {
			key.invalidate();
			key.inner.armed.store(false, Ordering::Release);
		}
	}
}

impl Default for Selector {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Selector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let open = self.is_open();
		let keys = self.inner.registry.lock().len();
		f.debug_struct("Selector").field("open", &open).field("keys", &keys).finish()
	}
}
