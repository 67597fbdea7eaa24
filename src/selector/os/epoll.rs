use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;
use std::{io, ptr};

use super::super::notifier::{Notifier, NOTIFY_KEY};
use super::{Event, Interest, ReadinessPoll};

/// Level-triggered epoll instance with a self-pipe registered under
/// `NOTIFY_KEY`.
pub(crate) struct OsPoller {
	epoll_fd: OwnedFd,
	notifier: Notifier,
}

fn interest_bits(interest: Interest) -> u32 {
	let mut events = 0u32;
	if interest.readable {
		events |= (libc::EPOLLIN | libc::EPOLLRDHUP) as u32;
	}
	if interest.writable {
		events |= libc::EPOLLOUT as u32;
	}
	events
}

impl OsPoller {
	fn ctl(&self, op: libc::c_int, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
		let mut event = libc::epoll_event { events: interest_bits(interest), u64: token };
		syscall!(epoll_ctl(self.epoll_fd.as_raw_fd(), op, fd, &mut event as *mut libc::epoll_event))?;
		Ok(())
	}
}

impl ReadinessPoll for OsPoller {
	type NativeEvent = libc::epoll_event;

	const CREATE: &'static str = "epoll_create1";
	const CTL: &'static str = "epoll_ctl";
	const WAIT: &'static str = "epoll_wait";

	fn new() -> io::Result<Self> {
		let epoll_fd = unsafe {
			let fd = syscall!(epoll_create1(libc::EPOLL_CLOEXEC))?;
			OwnedFd::from_raw_fd(fd)
		};
		let poller = Self { epoll_fd, notifier: Notifier::new()? };
		poller.ctl(
			libc::EPOLL_CTL_ADD,
			poller.notifier.read_fd(),
			NOTIFY_KEY,
			Interest { readable: true, writable: false },
		)?;
		Ok(poller)
	}

	fn add(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
		self.ctl(libc::EPOLL_CTL_ADD, fd, token, interest)
	}

	fn modify(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
		self.ctl(libc::EPOLL_CTL_MOD, fd, token, interest)
	}

	fn delete(&self, fd: RawFd) -> io::Result<()> {
		syscall!(epoll_ctl(self.epoll_fd.as_raw_fd(), libc::EPOLL_CTL_DEL, fd, ptr::null_mut()))?;
		Ok(())
	}

	fn wait(&self, events: &mut [Self::NativeEvent], timeout: Option<Duration>) -> io::Result<usize> {
		// Round up so a sub-millisecond timeout does not turn into a busy poll.
		let timeout_ms = match timeout {
			Some(d) => d.as_nanos().div_ceil(1_000_000).min(i32::MAX as u128) as i32,
			None => -1,
		};
		let n = syscall!(epoll_wait(
			self.epoll_fd.as_raw_fd(),
			events.as_mut_ptr(),
			events.len() as i32,
			timeout_ms,
		))?;
		Ok(n as usize)
	}

	fn notify(&self) -> io::Result<()> {
		self.notifier.notify()
	}

	fn drain(&self) -> usize {
		self.notifier.drain()
	}

	fn event(native: &Self::NativeEvent) -> Event {
		let bits = native.events;
		Event {
			token: native.u64,
			readable: bits & (libc::EPOLLIN | libc::EPOLLRDHUP) as u32 != 0,
			writable: bits & libc::EPOLLOUT as u32 != 0,
			error: bits & (libc::EPOLLERR | libc::EPOLLHUP) as u32 != 0,
		}
	}
}
