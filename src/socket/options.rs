use std::os::fd::AsRawFd;

use crate::error::{errno, NetError, Result};

fn set_opt<S: AsRawFd, T: Copy>(
	socket: &S,
	level: libc::c_int,
	name: libc::c_int,
	val: &T,
	option: &'static str,
) -> Result<()> {
	let result = unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			level,
			name,
			val as *const T as *const libc::c_void,
			std::mem::size_of::<T>() as libc::socklen_t,
		)
	};
	if result == -1 {
		Err(NetError::SetOption { errno: errno(), option })
	} else {
		Ok(())
	}
}

// Only instantiated with plain C types (c_int, linger, timeval), for which
// all-zero is a valid value.
fn get_opt<S: AsRawFd, T: Copy>(
	socket: &S,
	level: libc::c_int,
	name: libc::c_int,
	option: &'static str,
) -> Result<T> {
	let mut val: T = unsafe { std::mem::zeroed() };
	let mut len = std::mem::size_of::<T>() as libc::socklen_t;
	let result = unsafe {
		libc::getsockopt(
			socket.as_raw_fd(),
			level,
			name,
			&mut val as *mut T as *mut libc::c_void,
			&mut len,
		)
	};
	if result == -1 {
		Err(NetError::GetOption { errno: errno(), option })
	} else {
		Ok(val)
	}
}

fn set_flag<S: AsRawFd>(socket: &S, level: libc::c_int, name: libc::c_int, enable: bool, option: &'static str) -> Result<()> {
	let val: libc::c_int = if enable { 1 } else { 0 };
	set_opt(socket, level, name, &val, option)
}

fn get_flag<S: AsRawFd>(socket: &S, level: libc::c_int, name: libc::c_int, option: &'static str) -> Result<bool> {
	get_opt::<S, libc::c_int>(socket, level, name, option).map(|v| v != 0)
}

/// Sets SO_REUSEADDR.
///
/// Allows binding to an address that's in TIME_WAIT state.
pub fn set_reuse_addr<S: AsRawFd>(socket: &S, enable: bool) -> Result<()> {
	set_flag(socket, libc::SOL_SOCKET, libc::SO_REUSEADDR, enable, "SO_REUSEADDR")
}

pub fn get_reuse_addr<S: AsRawFd>(socket: &S) -> Result<bool> {
	get_flag(socket, libc::SOL_SOCKET, libc::SO_REUSEADDR, "SO_REUSEADDR")
}

/// Sets SO_REUSEPORT.
///
/// Allows multiple sockets to bind the same port.
pub fn set_reuse_port<S: AsRawFd>(socket: &S, enable: bool) -> Result<()> {
	set_flag(socket, libc::SOL_SOCKET, libc::SO_REUSEPORT, enable, "SO_REUSEPORT")
}

pub fn get_reuse_port<S: AsRawFd>(socket: &S) -> Result<bool> {
	get_flag(socket, libc::SOL_SOCKET, libc::SO_REUSEPORT, "SO_REUSEPORT")
}

/// Enables TCP keep-alive probes (SO_KEEPALIVE).
pub fn set_keepalive<S: AsRawFd>(socket: &S, enable: bool) -> Result<()> {
	set_flag(socket, libc::SOL_SOCKET, libc::SO_KEEPALIVE, enable, "SO_KEEPALIVE")
}

pub fn get_keepalive<S: AsRawFd>(socket: &S) -> Result<bool> {
	get_flag(socket, libc::SOL_SOCKET, libc::SO_KEEPALIVE, "SO_KEEPALIVE")
}

/// Sets TCP_NODELAY (disables Nagle's algorithm).
pub fn set_tcp_nodelay<S: AsRawFd>(socket: &S, enable: bool) -> Result<()> {
	set_flag(socket, libc::IPPROTO_TCP, libc::TCP_NODELAY, enable, "TCP_NODELAY")
}

pub fn get_tcp_nodelay<S: AsRawFd>(socket: &S) -> Result<bool> {
	get_flag(socket, libc::IPPROTO_TCP, libc::TCP_NODELAY, "TCP_NODELAY")
}

fn millis_to_timeval(millis: u64) -> libc::timeval {
	libc::timeval {
		tv_sec: (millis / 1000) as libc::time_t,
		tv_usec: ((millis % 1000) * 1000) as libc::suseconds_t,
	}
}

// Sub-millisecond remainders are dropped.
fn timeval_to_millis(tv: libc::timeval) -> u64 {
	tv.tv_sec as u64 * 1000 + tv.tv_usec as u64 / 1000
}

/// Sets SO_RCVTIMEO in whole milliseconds; 0 means block forever.
pub fn set_recv_timeout<S: AsRawFd>(socket: &S, millis: u64) -> Result<()> {
	set_opt(socket, libc::SOL_SOCKET, libc::SO_RCVTIMEO, &millis_to_timeval(millis), "SO_RCVTIMEO")
}

pub fn get_recv_timeout<S: AsRawFd>(socket: &S) -> Result<u64> {
	get_opt(socket, libc::SOL_SOCKET, libc::SO_RCVTIMEO, "SO_RCVTIMEO").map(timeval_to_millis)
}

/// Sets SO_SNDTIMEO in whole milliseconds; 0 means block forever.
pub fn set_send_timeout<S: AsRawFd>(socket: &S, millis: u64) -> Result<()> {
	set_opt(socket, libc::SOL_SOCKET, libc::SO_SNDTIMEO, &millis_to_timeval(millis), "SO_SNDTIMEO")
}

pub fn get_send_timeout<S: AsRawFd>(socket: &S) -> Result<u64> {
	get_opt(socket, libc::SOL_SOCKET, libc::SO_SNDTIMEO, "SO_SNDTIMEO").map(timeval_to_millis)
}

/// Sets socket linger behavior (SO_LINGER).
///
/// - `None`: close returns immediately, kernel sends data in background
/// - `Some(0)`: hard reset (RST), discards unsent data
/// - `Some(n)`: close blocks up to n seconds waiting for data to send
pub fn set_linger<S: AsRawFd>(socket: &S, linger: Option<u32>) -> Result<()> {
	let val = match linger {
		None => libc::linger { l_onoff: 0, l_linger: 0 },
		Some(seconds) => libc::linger { l_onoff: 1, l_linger: seconds as libc::c_int },
	};
	set_opt(socket, libc::SOL_SOCKET, libc::SO_LINGER, &val, "SO_LINGER")
}

pub fn get_linger<S: AsRawFd>(socket: &S) -> Result<Option<u32>> {
	let val: libc::linger = get_opt(socket, libc::SOL_SOCKET, libc::SO_LINGER, "SO_LINGER")?;
	Ok((val.l_onoff != 0).then_some(val.l_linger as u32))
}

/// Sets receive buffer size (SO_RCVBUF).
///
/// Linux doubles the value internally; the getter reports the doubled size.
pub fn set_recv_buffer_size<S: AsRawFd>(socket: &S, size: usize) -> Result<()> {
	set_opt(socket, libc::SOL_SOCKET, libc::SO_RCVBUF, &(size as libc::c_int), "SO_RCVBUF")
}

pub fn get_recv_buffer_size<S: AsRawFd>(socket: &S) -> Result<usize> {
	get_opt::<S, libc::c_int>(socket, libc::SOL_SOCKET, libc::SO_RCVBUF, "SO_RCVBUF").map(|v| v as usize)
}

/// Sets send buffer size (SO_SNDBUF).
pub fn set_send_buffer_size<S: AsRawFd>(socket: &S, size: usize) -> Result<()> {
	set_opt(socket, libc::SOL_SOCKET, libc::SO_SNDBUF, &(size as libc::c_int), "SO_SNDBUF")
}

pub fn get_send_buffer_size<S: AsRawFd>(socket: &S) -> Result<usize> {
	get_opt::<S, libc::c_int>(socket, libc::SOL_SOCKET, libc::SO_SNDBUF, "SO_SNDBUF").map(|v| v as usize)
}

/// Seconds of idle time before the first keep-alive probe (TCP_KEEPIDLE).
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn set_keepalive_idle<S: AsRawFd>(socket: &S, seconds: u32) -> Result<()> {
	set_opt(socket, libc::IPPROTO_TCP, libc::TCP_KEEPIDLE, &(seconds as libc::c_int), "TCP_KEEPIDLE")
}

/// Seconds between unanswered keep-alive probes (TCP_KEEPINTVL).
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn set_keepalive_interval<S: AsRawFd>(socket: &S, seconds: u32) -> Result<()> {
	set_opt(socket, libc::IPPROTO_TCP, libc::TCP_KEEPINTVL, &(seconds as libc::c_int), "TCP_KEEPINTVL")
}

/// Unanswered probes before the peer is declared dead (TCP_KEEPCNT).
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn set_keepalive_count<S: AsRawFd>(socket: &S, count: u32) -> Result<()> {
	set_opt(socket, libc::IPPROTO_TCP, libc::TCP_KEEPCNT, &(count as libc::c_int), "TCP_KEEPCNT")
}

/// Reads and clears the pending socket error (SO_ERROR).
pub fn take_error<S: AsRawFd>(socket: &S) -> Result<Option<i32>> {
	let err: libc::c_int = get_opt(socket, libc::SOL_SOCKET, libc::SO_ERROR, "SO_ERROR")?;
	Ok((err != 0).then_some(err))
}

/// Option accessors as methods, for anything that owns a socket descriptor.
pub trait SocketOptions: AsRawFd + Sized {
	fn set_reuse_addr(&self, enable: bool) -> Result<()> {
		set_reuse_addr(self, enable)
	}

	fn reuse_addr(&self) -> Result<bool> {
		get_reuse_addr(self)
	}

	fn set_reuse_port(&self, enable: bool) -> Result<()> {
		set_reuse_port(self, enable)
	}

	fn reuse_port(&self) -> Result<bool> {
		get_reuse_port(self)
	}

	fn set_keepalive(&self, enable: bool) -> Result<()> {
		set_keepalive(self, enable)
	}

	fn keepalive(&self) -> Result<bool> {
		get_keepalive(self)
	}

	fn set_tcp_nodelay(&self, enable: bool) -> Result<()> {
		set_tcp_nodelay(self, enable)
	}

	fn tcp_nodelay(&self) -> Result<bool> {
		get_tcp_nodelay(self)
	}

	fn set_recv_timeout(&self, millis: u64) -> Result<()> {
		set_recv_timeout(self, millis)
	}

	fn recv_timeout(&self) -> Result<u64> {
		get_recv_timeout(self)
	}

	fn set_send_timeout(&self, millis: u64) -> Result<()> {
		set_send_timeout(self, millis)
	}

	fn send_timeout(&self) -> Result<u64> {
		get_send_timeout(self)
	}

	fn set_linger(&self, linger: Option<u32>) -> Result<()> {
		set_linger(self, linger)
	}

	fn linger(&self) -> Result<Option<u32>> {
		get_linger(self)
	}

	fn set_recv_buffer_size(&self, size: usize) -> Result<()> {
		set_recv_buffer_size(self, size)
	}

	fn recv_buffer_size(&self) -> Result<usize> {
		get_recv_buffer_size(self)
	}

	fn set_send_buffer_size(&self, size: usize) -> Result<()> {
		set_send_buffer_size(self, size)
	}

	fn send_buffer_size(&self) -> Result<usize> {
		get_send_buffer_size(self)
	}

	fn take_error(&self) -> Result<Option<i32>> {
		take_error(self)
	}
}

impl SocketOptions for super::SocketHandle {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn timeval_conversion_truncates() {
		let tv = millis_to_timeval(2750);
		assert_eq!(tv.tv_sec, 2);
		assert_eq!(tv.tv_usec, 750_000);
		assert_eq!(timeval_to_millis(tv), 2750);

		let fractional = libc::timeval { tv_sec: 1, tv_usec: 999 };
		assert_eq!(timeval_to_millis(fractional), 1000);
	}

	#[test]
	fn closed_handle_reports_get_option_error() {
		let handle = crate::socket::SocketHandle::new();
		assert!(matches!(
			handle.reuse_addr(),
			Err(NetError::GetOption { errno: libc::EBADF, option: "SO_REUSEADDR" })
		));
	}
}
