use std::any::Any;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use super::{Selector, SelectorInner};
use crate::error::{NetError, Result};
use crate::sync::Mutex;

/// Set of selectable operations.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ops(u32);

impl Ops {
	pub const NONE: Ops = Ops(0);
	/// A connection is queued on a listener.
	pub const ACCEPT: Ops = Ops(1);
	/// A pending non-blocking connect has finished.
	pub const CONNECT: Ops = Ops(1 << 1);
	pub const READ: Ops = Ops(1 << 2);
	pub const WRITE: Ops = Ops(1 << 3);

	pub const fn bits(self) -> u32 {
		self.0
	}

	pub const fn from_bits_truncate(bits: u32) -> Ops {
		Ops(bits & 0b1111)
	}

	pub const fn is_empty(self) -> bool {
		self.0 == 0
	}

	pub const fn contains(self, other: Ops) -> bool {
		self.0 & other.0 == other.0
	}

	pub const fn intersects(self, other: Ops) -> bool {
		self.0 & other.0 != 0
	}
}

impl BitOr for Ops {
	type Output = Ops;

	fn bitor(self, rhs: Ops) -> Ops {
		Ops(self.0 | rhs.0)
	}
}

impl BitOrAssign for Ops {
	fn bitor_assign(&mut self, rhs: Ops) {
		self.0 |= rhs.0;
	}
}

impl BitAnd for Ops {
	type Output = Ops;

	fn bitand(self, rhs: Ops) -> Ops {
		Ops(self.0 & rhs.0)
	}
}

impl Not for Ops {
	type Output = Ops;

	fn not(self) -> Ops {
		Ops(!self.0 & 0b1111)
	}
}

impl fmt::Debug for Ops {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_empty() {
			return f.write_str("NONE");
		}
		let names = [(Ops::ACCEPT, "ACCEPT"), (Ops::CONNECT, "CONNECT"), (Ops::READ, "READ"), (Ops::WRITE, "WRITE")];
		let mut first = true;
		for (op, name) in names {
			if self.contains(op) {
				if !first {
					f.write_str(" | ")?;
				}
				f.write_str(name)?;
				first = false;
			}
		}
		Ok(())
	}
}

/// Opaque user data carried by a key.
pub type Attachment = Arc<dyn Any + Send + Sync>;

pub(crate) struct KeyInner {
	pub(super) token: u64,
	pub(super) fd: RawFd,
	pub(super) valid_ops: Ops,
	pub(super) interest: AtomicU32,
	pub(super) ready: AtomicU32,
	pub(super) valid: AtomicBool,
	/// Whether the descriptor is currently added to the backend.
	pub(super) armed: AtomicBool,
	attachment: Mutex<Option<Attachment>>,
	selector: Weak<SelectorInner>,
}

/// Binding between one registered channel and one selector.
///
/// Keys are cheap handles; clones refer to the same registration. A key
/// stays valid until it is cancelled, its channel is closed, or its
/// selector is closed.
#[derive(Clone)]
pub struct SelectionKey {
	pub(super) inner: Arc<KeyInner>,
}

impl SelectionKey {
	pub(super) fn new(
		token: u64,
		fd: RawFd,
		valid_ops: Ops,
		interest: Ops,
		attachment: Option<Attachment>,
		selector: Weak<SelectorInner>,
	) -> Self {
		SelectionKey {
			inner: Arc::new(KeyInner {
				token,
				fd,
				valid_ops,
				interest: AtomicU32::new(interest.bits()),
				ready: AtomicU32::new(0),
				valid: AtomicBool::new(true),
				armed: AtomicBool::new(false),
				attachment: Mutex::new(attachment),
				selector,
			}),
		}
	}

	pub fn interest(&self) -> Ops {
		Ops(self.inner.interest.load(Ordering::Acquire))
	}

	/// Operations found ready by the last poll that returned this key.
	pub fn ready(&self) -> Ops {
		Ops(self.inner.ready.load(Ordering::Acquire))
	}

	pub fn valid_ops(&self) -> Ops {
		self.inner.valid_ops
	}

	pub fn is_acceptable(&self) -> bool {
		self.ready().contains(Ops::ACCEPT)
	}

	pub fn is_connectable(&self) -> bool {
		self.ready().contains(Ops::CONNECT)
	}

	pub fn is_readable(&self) -> bool {
		self.ready().contains(Ops::READ)
	}

	pub fn is_writable(&self) -> bool {
		self.ready().contains(Ops::WRITE)
	}

	pub fn is_valid(&self) -> bool {
		self.inner.valid.load(Ordering::Acquire)
	}

	/// Replaces the interest set. Takes effect on the next poll at the latest.
	pub fn set_interest(&self, interest: Ops) -> Result<()> {
		if !self.inner.valid_ops.contains(interest) {
			return Err(NetError::InvalidInterestOps {
				requested: interest.bits(),
				valid: self.inner.valid_ops.bits(),
			});
		}
		let selector = self.live_selector()?;
		selector.update_interest(self, interest)
	}

	/// Deregisters the channel. Later polls never report this key.
	pub fn cancel(&self) {
		if !self.is_valid() {
			return;
		}
		match self.inner.selector.upgrade() {
			Some(selector) => selector.deregister(self),
			None => self.invalidate(),
		}
	}

	/// Replaces the attachment, returning the previous one.
	pub fn attach(&self, attachment: Option<Attachment>) -> Option<Attachment> {
		std::mem::replace(&mut *self.inner.attachment.lock(), attachment)
	}

	pub fn attachment(&self) -> Option<Attachment> {
		self.inner.attachment.lock().clone()
	}

	/// The selector this key was issued by, if it is still alive.
	pub fn selector(&self) -> Option<Selector> {
		self.inner.selector.upgrade().map(|inner| Selector { inner })
	}

	pub(crate) fn token(&self) -> u64 {
		self.inner.token
	}

	pub(crate) fn belongs_to(&self, selector: &Selector) -> bool {
		std::ptr::eq(self.inner.selector.as_ptr(), Arc::as_ptr(&selector.inner))
	}

	pub(super) fn fd(&self) -> RawFd {
		self.inner.fd
	}

	pub(super) fn store_interest(&self, interest: Ops) {
		self.inner.interest.store(interest.bits(), Ordering::Release);
	}

	pub(super) fn set_ready(&self, ready: Ops) {
		self.inner.ready.store(ready.bits(), Ordering::Release);
	}

	pub(super) fn invalidate(&self) {
		self.inner.valid.store(false, Ordering::Release);
		self.inner.ready.store(0, Ordering::Release);
	}

	fn live_selector(&self) -> Result<Arc<SelectorInner>> {
		if !self.is_valid() {
			return Err(NetError::InvalidState { op: "set_interest", state: "cancelled" });
		}
		self.inner.selector.upgrade().ok_or(NetError::SelectorNotOpen)
	}
}

impl PartialEq for SelectionKey {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

impl Eq for SelectionKey {}

impl fmt::Debug for SelectionKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SelectionKey")
			.field("token", &self.inner.token)
			.field("fd", &self.inner.fd)
			.field("interest", &self.interest())
			.field("ready", &self.ready())
			.field("valid", &self.is_valid())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ops_algebra() {
		let rw = Ops::READ | Ops::WRITE;
		assert!(rw.contains(Ops::READ));
		assert!(!rw.contains(Ops::ACCEPT));
		assert!(rw.intersects(Ops::WRITE | Ops::CONNECT));
		assert_eq!(rw & Ops::WRITE, Ops::WRITE);
		assert_eq!(!rw, Ops::ACCEPT | Ops::CONNECT);
		assert!(Ops::NONE.is_empty());
		assert_eq!(Ops::from_bits_truncate(0xff), Ops::ACCEPT | Ops::CONNECT | Ops::READ | Ops::WRITE);
	}

	#[test]
	fn ops_debug_lists_names() {
		assert_eq!(format!("{:?}", Ops::NONE), "NONE");
		assert_eq!(format!("{:?}", Ops::CONNECT | Ops::WRITE), "CONNECT | WRITE");
	}

	#[test]
	fn orphaned_key_rejects_interest_change() {
		let key = SelectionKey::new(1, -1, Ops::READ | Ops::WRITE, Ops::READ, None, Weak::new());
		assert!(matches!(
			key.set_interest(Ops::ACCEPT),
			Err(NetError::InvalidInterestOps { requested: 1, valid: 12 })
		));
		assert!(matches!(key.set_interest(Ops::WRITE), Err(NetError::SelectorNotOpen)));
		key.cancel();
		assert!(!key.is_valid());
	}

	#[test]
	fn attach_returns_previous() {
		let key = SelectionKey::new(1, -1, Ops::READ, Ops::READ, None, Weak::new());
		assert!(key.attach(Some(Arc::new(7u32))).is_none());
		let previous = key.attach(Some(Arc::new("conn"))).unwrap();
		assert_eq!(previous.downcast_ref::<u32>(), Some(&7));
		let current = key.attachment().unwrap();
		assert_eq!(current.downcast_ref::<&str>(), Some(&"conn"));
	}
}
