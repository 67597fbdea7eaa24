//! Non-blocking sockets that can be registered with a [`Selector`].
//!
//! Each channel owns its typed socket and at most one selection key. A
//! channel registers with a single selector; registering again with the
//! same selector updates the existing key, and registering with another
//! one fails with `AlreadyRegistered` until the first key is cancelled.

mod datagram;
mod server;
mod stream;

use std::fmt;
use std::os::fd::{AsRawFd, RawFd};

use tracing::debug;

use crate::error::{NetError, Result};
use crate::selector::{Attachment, Ops, SelectionKey, Selector};
use crate::sync::Mutex;

pub use self::datagram::DatagramSocketChannel;
pub use self::server::ServerSocketChannel;
pub use self::stream::StreamSocketChannel;

mod sealed {
	pub trait Sealed {}
}

/// A channel that a [`Selector`] can watch.
pub trait SelectableChannel: AsRawFd + sealed::Sealed {
	/// Operations this kind of channel can ever become ready for.
	fn valid_ops(&self) -> Ops;

	#[doc(hidden)]
	fn registration(&self) -> &Registration;

	/// Registers with `selector`, or updates the interest and attachment
	/// of the existing key when already registered there.
	fn register(&self, selector: &Selector, interest: Ops, attachment: Option<Attachment>) -> Result<SelectionKey> {
		self.registration().register(selector, self.as_raw_fd(), self.valid_ops(), interest, attachment)
	}

	/// The current key, if registered and still valid.
	fn key(&self) -> Option<SelectionKey> {
		self.registration().key()
	}

	fn is_registered(&self) -> bool {
		self.key().is_some()
	}
}

/// Key slot shared by every channel type.
pub struct Registration(Mutex<Option<SelectionKey>>);

impl Registration {
	pub(crate) const fn new() -> Self {
		Registration(Mutex::new(None))
	}

	fn register(
		&self,
		selector: &Selector,
		fd: RawFd,
		valid_ops: Ops,
		interest: Ops,
		attachment: Option<Attachment>,
	) -> Result<SelectionKey> {
		if !valid_ops.contains(interest) {
			return Err(NetError::InvalidInterestOps { requested: interest.bits(), valid: valid_ops.bits() });
		}
		let mut slot = self.0.lock();
		if let Some(key) = slot.as_ref().filter(|key| key.is_valid()) {
			if !key.belongs_to(selector) {
				return Err(NetError::AlreadyRegistered);
			}
			key.set_interest(interest)?;
			key.attach(attachment);
			debug!(fd, interest = ?interest, "registration updated");
			return Ok(key.clone());
		}
		let key = selector.register(fd, valid_ops, interest, attachment)?;
		*slot = Some(key.clone());
		Ok(key)
	}

	fn key(&self) -> Option<SelectionKey> {
		self.0.lock().clone().filter(|key| key.is_valid())
	}

	/// Cancels the key, if any. Must run before the descriptor closes.
	pub(crate) fn cancel(&self) {
		if let Some(key) = self.0.lock().take() {
			key.cancel();
		}
	}
}

impl fmt::Debug for Registration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Registration").field(&self.key()).finish()
	}
}
