use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;
use std::{io, ptr};

use super::super::notifier::{Notifier, NOTIFY_KEY};
use super::{Event, Interest, ReadinessPoll};

/// kqueue instance. Read and write interest are separate level-triggered
/// filters on the same ident; both carry the token in `udata`.
pub(crate) struct OsPoller {
	kq_fd: OwnedFd,
	notifier: Notifier,
}

fn change(fd: RawFd, filter: i16, flags: u16, token: u64) -> libc::kevent {
	let mut kev: libc::kevent = unsafe { std::mem::zeroed() };
	kev.ident = fd as libc::uintptr_t;
	kev.filter = filter as _;
	kev.flags = flags as _;
	kev.udata = token as usize as *mut libc::c_void;
	kev
}

fn is_not_found(err: &io::Error) -> bool {
	matches!(err.raw_os_error(), Some(libc::ENOENT) | Some(libc::EBADF))
}

impl OsPoller {
	fn submit(&self, kev: &libc::kevent) -> io::Result<()> {
		syscall!(kevent(self.kq_fd.as_raw_fd(), kev as *const libc::kevent, 1, ptr::null_mut(), 0, ptr::null()))?;
		Ok(())
	}

	fn set_filter(&self, fd: RawFd, filter: i16, enabled: bool, token: u64) -> io::Result<()> {
		if enabled {
			self.submit(&change(fd, filter, (libc::EV_ADD | libc::EV_ENABLE) as u16, token))
		} else {
			match self.submit(&change(fd, filter, libc::EV_DELETE as u16, token)) {
				Err(err) if !is_not_found(&err) => Err(err),
				_ => Ok(()),
			}
		}
	}

	fn apply(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
		self.set_filter(fd, libc::EVFILT_READ as i16, interest.readable, token)?;
		self.set_filter(fd, libc::EVFILT_WRITE as i16, interest.writable, token)
	}
}

impl ReadinessPoll for OsPoller {
	type NativeEvent = libc::kevent;

	const CREATE: &'static str = "kqueue";
	const CTL: &'static str = "kevent";
	const WAIT: &'static str = "kevent";

	fn new() -> io::Result<Self> {
		let kq_fd = unsafe { OwnedFd::from_raw_fd(syscall!(kqueue())?) };
		syscall!(fcntl(kq_fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC))?;
		let poller = Self { kq_fd, notifier: Notifier::new()? };
		poller.apply(poller.notifier.read_fd(), NOTIFY_KEY, Interest { readable: true, writable: false })?;
		Ok(poller)
	}

	fn add(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
		self.apply(fd, token, interest)
	}

	fn modify(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
		self.apply(fd, token, interest)
	}

	fn delete(&self, fd: RawFd) -> io::Result<()> {
		self.apply(fd, 0, Interest { readable: false, writable: false })
	}

	fn wait(&self, events: &mut [Self::NativeEvent], timeout: Option<Duration>) -> io::Result<usize> {
		let ts = timeout.map(|d| libc::timespec {
			tv_sec: d.as_secs() as libc::time_t,
			tv_nsec: d.subsec_nanos() as libc::c_long,
		});
		let ts_ptr = ts.as_ref().map_or(ptr::null(), |ts| ts as *const libc::timespec);
		let n = syscall!(kevent(
			self.kq_fd.as_raw_fd(),
			ptr::null(),
			0,
			events.as_mut_ptr(),
			events.len() as libc::c_int,
			ts_ptr,
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
		let filter = native.filter as i16;
		let flags = native.flags as u16;
		Event {
			token: native.udata as usize as u64,
			readable: filter == libc::EVFILT_READ as i16,
			writable: filter == libc::EVFILT_WRITE as i16,
			// EV_EOF only concerns the filter's own direction, already set above.
			error: flags & libc::EV_ERROR as u16 != 0,
		}
	}
}
