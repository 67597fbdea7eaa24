//! OS readiness backends.
//!
//! Every backend is level triggered: a descriptor keeps reporting while the
//! condition holds, so a key whose event was not consumed shows up again on
//! the next poll.

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod epoll;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) use epoll::OsPoller;

#[cfg(any(
	target_os = "macos",
	target_os = "ios",
	target_os = "freebsd",
	target_os = "netbsd",
	target_os = "openbsd",
	target_os = "dragonfly"
))]
mod kqueue;
#[cfg(any(
	target_os = "macos",
	target_os = "ios",
	target_os = "freebsd",
	target_os = "netbsd",
	target_os = "openbsd",
	target_os = "dragonfly"
))]
pub(crate) use kqueue::OsPoller;

/// Directions a descriptor is armed for in the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Interest {
	pub(crate) readable: bool,
	pub(crate) writable: bool,
}

impl Interest {
	pub(crate) fn is_empty(self) -> bool {
		!self.readable && !self.writable
	}
}

/// A backend event decoded into a portable shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Event {
	pub(crate) token: u64,
	pub(crate) readable: bool,
	pub(crate) writable: bool,
	/// Error or hang-up. Reported alongside whatever direction is armed.
	pub(crate) error: bool,
}

pub(crate) trait ReadinessPoll: Sized + Send + Sync {
	type NativeEvent: Copy;

	/// Syscall names used as error hints.
	const CREATE: &'static str;
	const CTL: &'static str;
	const WAIT: &'static str;

	fn new() -> io::Result<Self>;

	fn add(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()>;

	fn modify(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()>;

	fn delete(&self, fd: RawFd) -> io::Result<()>;

	/// Blocks until an event arrives, the timeout elapses, or `notify` runs.
	fn wait(&self, events: &mut [Self::NativeEvent], timeout: Option<Duration>) -> io::Result<usize>;

	fn notify(&self) -> io::Result<()>;

	fn drain(&self) -> usize;

	fn event(native: &Self::NativeEvent) -> Event;
}

/// Event storage handed to `wait`.
pub(crate) struct EventBuf(pub(crate) Vec<<OsPoller as ReadinessPoll>::NativeEvent>);

// kevent carries a raw `udata` pointer; only the token value is ever read.
unsafe impl Send for EventBuf {}

impl EventBuf {
	pub(crate) fn with_capacity(capacity: usize) -> Self {
		let zeroed = unsafe { std::mem::zeroed::<<OsPoller as ReadinessPoll>::NativeEvent>() };
		EventBuf(vec![zeroed; capacity.max(1)])
	}
}
