//! Self-pipe used to wake a thread blocked in `epoll_wait`/`kevent`.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

/// Token the read end of the pipe is registered under.
pub(crate) const NOTIFY_KEY: u64 = u64::MAX;

pub(crate) struct Notifier {
	read_fd: OwnedFd,
	write_fd: OwnedFd,
}

impl Notifier {
	#[cfg(any(target_os = "linux", target_os = "android"))]
	pub(crate) fn new() -> io::Result<Self> {
		let mut fds = [0 as RawFd; 2];
		syscall!(pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC | libc::O_NONBLOCK))?;
		Ok(Self {
			read_fd: unsafe { OwnedFd::from_raw_fd(fds[0]) },
			write_fd: unsafe { OwnedFd::from_raw_fd(fds[1]) },
		})
	}

	#[cfg(not(any(target_os = "linux", target_os = "android")))]
	pub(crate) fn new() -> io::Result<Self> {
		let mut fds = [0 as RawFd; 2];
		syscall!(pipe(fds.as_mut_ptr()))?;
		let notifier = Self {
			read_fd: unsafe { OwnedFd::from_raw_fd(fds[0]) },
			write_fd: unsafe { OwnedFd::from_raw_fd(fds[1]) },
		};
		for fd in fds {
			syscall!(fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC))?;
			let flags = syscall!(fcntl(fd, libc::F_GETFL))?;
			syscall!(fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK))?;
		}
		Ok(notifier)
	}

	pub(crate) fn read_fd(&self) -> RawFd {
		self.read_fd.as_raw_fd()
	}

	/// Writes one byte. A full pipe already guarantees a wakeup.
	pub(crate) fn notify(&self) -> io::Result<()> {
		let byte: u8 = 1;
		let result = syscall!(write(
			self.write_fd.as_raw_fd(),
			&byte as *const u8 as *const libc::c_void,
			1,
		));
		match result {
			Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(()),
			other => other.map(|_| ()),
		}
	}

	/// Empties the pipe; returns the number of bytes discarded.
	pub(crate) fn drain(&self) -> usize {
		let mut buf = [0u8; 64];
		let mut total = 0;
		loop {
			let n = unsafe {
				libc::read(self.read_fd.as_raw_fd(), buf.as_mut_ptr() as *mut libc::c_void, buf.len())
			};
			if n <= 0 {
				return total;
			}
			total += n as usize;
		}
	}
}
