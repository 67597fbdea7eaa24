use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

use tracing::{debug, warn};

use super::{AcceptOutcome, ConnectOutcome, IoOutcome, SocketState};
use crate::addr::{Address, Endpoint, Family, SockAddr, ToSockAddr};
use crate::error::{errno, NetError, Result};
use crate::protocol::Protocol;

const SHUT_READ: u8 = 0b01;
const SHUT_WRITE: u8 = 0b10;

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: libc::c_int = 0;

/// Owns at most one OS socket descriptor and tracks its lifecycle.
///
/// The descriptor is present exactly when the state is `Created`, `Open`
/// or `Opening`. Handles move but never copy; `take()` leaves the source
/// `Closed`.
#[derive(Debug, Default)]
pub struct SocketHandle {
	fd: Option<OwnedFd>,
	state: SocketState,
	shutdown: u8,
	protocol: Option<Protocol>,
	bound: bool,
	listening: bool,
	target: Option<Endpoint>,
}

impl SocketHandle {
	/// A handle that owns nothing.
	pub fn new() -> Self {
		Self::default()
	}

	/// Allocates a descriptor for `protocol` in one step.
	pub fn open(protocol: Protocol) -> Result<Self> {
		let mut handle = Self::new();
		handle.create(protocol)?;
		Ok(handle)
	}

	/// Allocates an OS descriptor.
	///
	/// # Panics
	/// If the handle already owns a descriptor.
	pub fn create(&mut self, protocol: Protocol) -> Result<()> {
		assert!(
			self.fd.is_none(),
			"SocketHandle::create on a handle that already owns fd {}",
			self.as_raw_fd()
		);

		let fd = new_socket(protocol)?;
		debug!(fd = fd.as_raw_fd(), %protocol, "socket created");

		self.fd = Some(fd);
		self.state = SocketState::Created;
		self.shutdown = 0;
		self.protocol = Some(protocol);
		self.bound = false;
		self.listening = false;
		self.target = None;
		Ok(())
	}

	/// Resolves `host` to an address of this handle's family and binds.
	/// Port 0 asks the OS for an ephemeral port.
	pub fn bind(&mut self, host: &str, port: u16) -> Result<()> {
		self.require("bind", &[SocketState::Created])?;
		let addr = Address::resolve(host, self.family()?)?;
		self.bind_endpoint(&Endpoint::new(addr, port))
	}

	pub fn bind_endpoint(&mut self, endpoint: &Endpoint) -> Result<()> {
		self.require("bind", &[SocketState::Created])?;
		self.check_family(endpoint)?;

		let fd = self.as_raw_fd();
		let result = endpoint.with_raw(|ptr, len| unsafe { libc::bind(fd, ptr, len) });
		if result == -1 {
			return Err(NetError::Bind { errno: errno(), endpoint: endpoint.to_text() });
		}

		self.bound = true;
		debug!(fd, endpoint = %endpoint, "socket bound");
		Ok(())
	}

	/// Starts listening. Valid only from `Created` after a successful bind;
	/// on success the handle is `Open`.
	pub fn listen(&mut self, backlog: i32) -> Result<()> {
		self.require("listen", &[SocketState::Created])?;
		if !self.bound {
			return Err(NetError::InvalidState { op: "listen", state: "created but not bound" });
		}

		let result = unsafe { libc::listen(self.as_raw_fd(), backlog) };
		if result == -1 {
			return Err(NetError::Listen { errno: errno(), backlog });
		}

		self.state = SocketState::Open;
		self.listening = true;
		debug!(fd = self.as_raw_fd(), backlog, "socket listening");
		Ok(())
	}

	/// Accepts one queued connection. Blocks unless the handle is
	/// non-blocking. The accepted handle is `Open` with this handle's
	/// protocol; the listener's state never changes.
	pub fn accept(&self) -> Result<AcceptOutcome<SocketHandle>> {
		self.require("accept", &[SocketState::Open])?;
		if !self.listening {
			return Err(NetError::InvalidState { op: "accept", state: "open but not listening" });
		}

		let mut peer = SockAddr::empty();
		let fd = accept_cloexec(self.as_raw_fd(), &mut peer);
		if fd == -1 {
			let err = errno();
			return match err {
				libc::EAGAIN => Ok(AcceptOutcome::WouldBlock),
				libc::EINTR => Ok(AcceptOutcome::Interrupted),
				_ => Err(NetError::Accept { errno: err }),
			};
		}
		let fd = unsafe { OwnedFd::from_raw_fd(fd) };
		#[cfg(any(target_os = "macos", target_os = "ios"))]
		set_nosigpipe(fd.as_raw_fd())?;

		let peer = peer.to_endpoint()?;
		debug!(listener = self.as_raw_fd(), fd = fd.as_raw_fd(), peer = %peer, "connection accepted");

		let accepted = SocketHandle {
			fd: Some(fd),
			state: SocketState::Open,
			shutdown: 0,
			protocol: self.protocol,
			bound: true,
			listening: false,
			target: None,
		};
		Ok(AcceptOutcome::Accepted(accepted, peer))
	}

	/// Resolves `host` and connects.
	pub fn connect(&mut self, host: &str, port: u16) -> Result<ConnectOutcome> {
		self.require("connect", &[SocketState::Created])?;
		let addr = Address::resolve(host, self.family()?)?;
		self.connect_endpoint(&Endpoint::new(addr, port))
	}

	/// Connects to `endpoint`.
	///
	/// Immediate success leaves the handle `Open`. On a non-blocking handle
	/// an in-progress connect leaves it `Opening` and returns
	/// `ConnectOutcome::InProgress`. Any other failure returns the handle to
	/// `Created`.
	pub fn connect_endpoint(&mut self, endpoint: &Endpoint) -> Result<ConnectOutcome> {
		self.require("connect", &[SocketState::Created])?;
		self.check_family(endpoint)?;

		let fd = self.as_raw_fd();
		self.state = SocketState::Opening;
		let result = endpoint.with_raw(|ptr, len| unsafe { libc::connect(fd, ptr, len) });

		if result == 0 {
			self.state = SocketState::Open;
			debug!(fd, endpoint = %endpoint, "connected");
			return Ok(ConnectOutcome::Connected);
		}

		match errno() {
			// EINTR: the handshake carries on in the background
			libc::EINPROGRESS | libc::EINTR => {
				self.target = Some(*endpoint);
				debug!(fd, endpoint = %endpoint, "connect in progress");
				Ok(ConnectOutcome::InProgress)
			}
			err => {
				self.state = SocketState::Created;
				Err(NetError::Connect { errno: err, endpoint: endpoint.to_text() })
			}
		}
	}

	/// Confirms a pending connect.
	///
	/// `Ok(true)` once connected (state `Open`), `Ok(false)` while still in
	/// progress. A failed handshake returns the handle to `Created` and
	/// reports `Connect` with the socket's pending error.
	pub fn finish_connect(&mut self) -> Result<bool> {
		match self.state {
			SocketState::Open if !self.listening => return Ok(true),
			SocketState::Opening => {}
			state => return Err(NetError::InvalidState { op: "finish_connect", state: state.name() }),
		}

		let endpoint = self.target.map(|ep| ep.to_text()).unwrap_or_default();
		let pending = super::options::take_error(&*self)?;
		if let Some(err) = pending {
			self.state = SocketState::Created;
			self.target = None;
			return Err(NetError::Connect { errno: err, endpoint });
		}

		let mut peer = SockAddr::empty();
		let result = unsafe { libc::getpeername(self.as_raw_fd(), peer.as_mut_ptr(), peer.len_mut()) };
		if result == -1 {
			let err = errno();
			if err == libc::ENOTCONN {
				return Ok(false);
			}
			return Err(NetError::Io { errno: err, op: "getpeername" });
		}

		self.state = SocketState::Open;
		self.target = None;
		debug!(fd = self.as_raw_fd(), endpoint = %endpoint, "connect finished");
		Ok(true)
	}

	/// Sends bytes on a connected handle.
	pub fn send(&self, buf: &[u8]) -> Result<IoOutcome> {
		self.require("send", &[SocketState::Open])?;
		let n = unsafe {
			libc::send(self.as_raw_fd(), buf.as_ptr() as *const libc::c_void, buf.len(), SEND_FLAGS)
		};
		if n == -1 {
			return would_block_or(NetError::Io { errno: errno(), op: "send" });
		}
		Ok(IoOutcome::Done(n as usize))
	}

	/// Receives bytes on a connected handle. A zero-byte read on a stream
	/// is reported as `PeerClosed`.
	pub fn receive(&self, buf: &mut [u8]) -> Result<IoOutcome> {
		self.require("receive", &[SocketState::Open])?;
		let n = unsafe {
			libc::recv(self.as_raw_fd(), buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0)
		};
		if n == -1 {
			return would_block_or(NetError::Io { errno: errno(), op: "recv" });
		}
		if n == 0 && !buf.is_empty() && self.is_stream() {
			return Ok(IoOutcome::PeerClosed);
		}
		Ok(IoOutcome::Done(n as usize))
	}

	/// Sends one datagram to `endpoint`.
	pub fn send_to(&self, buf: &[u8], endpoint: &Endpoint) -> Result<IoOutcome> {
		self.require("send_to", &[SocketState::Created, SocketState::Open])?;
		self.check_family(endpoint)?;

		let fd = self.as_raw_fd();
		let n = endpoint.with_raw(|ptr, len| unsafe {
			libc::sendto(fd, buf.as_ptr() as *const libc::c_void, buf.len(), SEND_FLAGS, ptr, len)
		});
		if n == -1 {
			return would_block_or(NetError::Io { errno: errno(), op: "sendto" });
		}
		Ok(IoOutcome::Done(n as usize))
	}

	/// Receives one datagram and the endpoint it came from.
	pub fn recv_from(&self, buf: &mut [u8]) -> Result<IoOutcome<(usize, Endpoint)>> {
		self.require("recv_from", &[SocketState::Created, SocketState::Open])?;

		let mut from = SockAddr::empty();
		let n = unsafe {
			libc::recvfrom(
				self.as_raw_fd(),
				buf.as_mut_ptr() as *mut libc::c_void,
				buf.len(),
				0,
				from.as_mut_ptr(),
				from.len_mut(),
			)
		};
		if n == -1 {
			return would_block_or(NetError::Io { errno: errno(), op: "recvfrom" });
		}
		Ok(IoOutcome::Done((n as usize, from.to_endpoint()?)))
	}

	/// Shuts down the read half. Idempotent.
	pub fn shutdown_read(&mut self) -> Result<()> {
		self.shutdown_half(SHUT_READ, libc::SHUT_RD, "shutdown_read")
	}

	/// Shuts down the write half; the peer sees end-of-stream. Idempotent.
	pub fn shutdown_write(&mut self) -> Result<()> {
		self.shutdown_half(SHUT_WRITE, libc::SHUT_WR, "shutdown_write")
	}

	fn shutdown_half(&mut self, bit: u8, how: libc::c_int, op: &'static str) -> Result<()> {
		self.require(op, &[SocketState::Open, SocketState::Opening])?;
		if self.shutdown & bit != 0 {
			return Ok(());
		}
		let result = unsafe { libc::shutdown(self.as_raw_fd(), how) };
		if result == -1 {
			return Err(NetError::Io { errno: errno(), op: "shutdown" });
		}
		self.shutdown |= bit;
		debug!(fd = self.as_raw_fd(), op, "half closed");
		Ok(())
	}

	/// Releases the descriptor. Idempotent.
	///
	/// A failing `close(2)` is reported, but the handle is `Closed`
	/// afterwards either way and the descriptor is never released twice.
	pub fn close(&mut self) -> Result<()> {
		let Some(fd) = self.fd.take() else {
			return Ok(());
		};
		self.state = SocketState::Closed;
		self.shutdown = 0;
		self.bound = false;
		self.listening = false;
		self.target = None;

		let raw = fd.into_raw_fd();
		let result = unsafe { libc::close(raw) };
		if result == -1 {
			return Err(NetError::Close { errno: errno() });
		}
		debug!(fd = raw, "socket closed");
		Ok(())
	}

	/// Moves the descriptor out, leaving this handle `Closed`.
	pub fn take(&mut self) -> SocketHandle {
		std::mem::take(self)
	}

	/// Moves `other` into this handle.
	///
	/// # Panics
	/// If this handle still owns a descriptor.
	pub fn adopt(&mut self, other: SocketHandle) {
		assert!(
			self.fd.is_none(),
			"SocketHandle::adopt into a handle that still owns fd {}",
			self.as_raw_fd()
		);
		*self = other;
	}

	pub fn local_endpoint(&self) -> Result<Endpoint> {
		self.require("local_endpoint", &[SocketState::Created, SocketState::Open, SocketState::Opening])?;
		let mut addr = SockAddr::empty();
		let result = unsafe { libc::getsockname(self.as_raw_fd(), addr.as_mut_ptr(), addr.len_mut()) };
		if result == -1 {
			return Err(NetError::Io { errno: errno(), op: "getsockname" });
		}
		addr.to_endpoint()
	}

	pub fn remote_endpoint(&self) -> Result<Endpoint> {
		self.require("remote_endpoint", &[SocketState::Open])?;
		let mut addr = SockAddr::empty();
		let result = unsafe { libc::getpeername(self.as_raw_fd(), addr.as_mut_ptr(), addr.len_mut()) };
		if result == -1 {
			return Err(NetError::Io { errno: errno(), op: "getpeername" });
		}
		addr.to_endpoint()
	}

	/// The bound port; after binding port 0 this is the OS-assigned one.
	pub fn local_port(&self) -> Result<u16> {
		Ok(self.local_endpoint()?.port().unwrap_or(0))
	}

	/// Sets or clears `O_NONBLOCK`. Does not change the lifecycle state.
	pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
		self.require("set_nonblocking", &[SocketState::Created, SocketState::Open, SocketState::Opening])?;
		let fd = self.as_raw_fd();
		let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
		if flags == -1 {
			return Err(NetError::GetOption { errno: errno(), option: "O_NONBLOCK" });
		}
		let new_flags = if nonblocking {
			flags | libc::O_NONBLOCK
		} else {
			flags & !libc::O_NONBLOCK
		};
		if new_flags != flags && unsafe { libc::fcntl(fd, libc::F_SETFL, new_flags) } == -1 {
			return Err(NetError::SetOption { errno: errno(), option: "O_NONBLOCK" });
		}
		Ok(())
	}

	pub fn is_nonblocking(&self) -> Result<bool> {
		self.require("is_nonblocking", &[SocketState::Created, SocketState::Open, SocketState::Opening])?;
		let flags = unsafe { libc::fcntl(self.as_raw_fd(), libc::F_GETFL) };
		if flags == -1 {
			return Err(NetError::GetOption { errno: errno(), option: "O_NONBLOCK" });
		}
		Ok(flags & libc::O_NONBLOCK != 0)
	}

	pub fn state(&self) -> SocketState {
		self.state
	}

	pub fn protocol(&self) -> Option<Protocol> {
		self.protocol
	}

	pub fn is_valid(&self) -> bool {
		self.fd.is_some()
	}

	pub fn is_listening(&self) -> bool {
		self.listening
	}

	pub fn is_connected(&self) -> bool {
		self.state == SocketState::Open && !self.listening
	}

	pub fn is_connecting(&self) -> bool {
		self.state == SocketState::Opening
	}

	pub fn is_read_shutdown(&self) -> bool {
		self.shutdown & SHUT_READ != 0
	}

	pub fn is_write_shutdown(&self) -> bool {
		self.shutdown & SHUT_WRITE != 0
	}

	fn is_stream(&self) -> bool {
		self.protocol.is_some_and(|p| p.kind() == crate::protocol::SockKind::Stream)
	}

	fn require(&self, op: &'static str, allowed: &[SocketState]) -> Result<()> {
		if allowed.contains(&self.state) {
			Ok(())
		} else {
			Err(NetError::InvalidState { op, state: self.state.name() })
		}
	}

	fn family(&self) -> Result<Family> {
		match self.protocol.map(|p| p.family()) {
			Some(Family::Unix) => Err(NetError::UnsupportedFamily { family: "unix" }),
			Some(family) => Ok(family),
			None => Err(NetError::InvalidState { op: "resolve", state: self.state.name() }),
		}
	}

	fn check_family(&self, endpoint: &Endpoint) -> Result<()> {
		let family = self.family()?;
		if endpoint.family() != family {
			return Err(NetError::UnsupportedFamily { family: endpoint.family().name() });
		}
		Ok(())
	}
}

impl AsRawFd for SocketHandle {
	/// -1 once closed.
	fn as_raw_fd(&self) -> RawFd {
		self.fd.as_ref().map_or(-1, |fd| fd.as_raw_fd())
	}
}

impl Drop for SocketHandle {
	fn drop(&mut self) {
		if let Err(err) = self.close() {
			warn!(%err, "failed to close socket on drop");
		}
	}
}

fn would_block_or<T>(err: NetError) -> Result<IoOutcome<T>> {
	if err.errno() == Some(libc::EAGAIN) {
		return Ok(IoOutcome::WouldBlock);
	}
	Err(err)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn new_socket(protocol: Protocol) -> Result<OwnedFd> {
	let fd = unsafe {
		libc::socket(
			protocol.family().raw(),
			protocol.kind().raw() | libc::SOCK_CLOEXEC,
			protocol.proto(),
		)
	};
	if fd == -1 {
		return Err(NetError::SocketCreate { errno: errno(), protocol: protocol.to_string() });
	}
	Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn new_socket(protocol: Protocol) -> Result<OwnedFd> {
	let fd = unsafe { libc::socket(protocol.family().raw(), protocol.kind().raw(), protocol.proto()) };
	if fd == -1 {
		return Err(NetError::SocketCreate { errno: errno(), protocol: protocol.to_string() });
	}
	let fd = unsafe { OwnedFd::from_raw_fd(fd) };
	set_cloexec(fd.as_raw_fd())?;
	#[cfg(any(target_os = "macos", target_os = "ios"))]
	set_nosigpipe(fd.as_raw_fd())?;
	Ok(fd)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn accept_cloexec(fd: RawFd, peer: &mut SockAddr) -> RawFd {
	unsafe { libc::accept4(fd, peer.as_mut_ptr(), peer.len_mut(), libc::SOCK_CLOEXEC) }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn accept_cloexec(fd: RawFd, peer: &mut SockAddr) -> RawFd {
	let accepted = unsafe { libc::accept(fd, peer.as_mut_ptr(), peer.len_mut()) };
	if accepted != -1 {
		unsafe { libc::fcntl(accepted, libc::F_SETFD, libc::FD_CLOEXEC) };
	}
	accepted
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn set_cloexec(fd: RawFd) -> Result<()> {
	if unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) } == -1 {
		return Err(NetError::SetOption { errno: errno(), option: "FD_CLOEXEC" });
	}
	Ok(())
}

// macOS has no MSG_NOSIGNAL; suppress SIGPIPE per socket instead.
#[cfg(any(target_os = "macos", target_os = "ios"))]
fn set_nosigpipe(fd: RawFd) -> Result<()> {
	let val: libc::c_int = 1;
	let result = unsafe {
		libc::setsockopt(
			fd,
			libc::SOL_SOCKET,
			libc::SO_NOSIGPIPE,
			&val as *const _ as *const libc::c_void,
			std::mem::size_of::<libc::c_int>() as libc::socklen_t,
		)
	};
	if result == -1 {
		return Err(NetError::SetOption { errno: errno(), option: "SO_NOSIGPIPE" });
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_handle_is_closed_and_inert() {
		let mut handle = SocketHandle::new();
		assert_eq!(handle.state(), SocketState::Closed);
		assert_eq!(handle.as_raw_fd(), -1);
		assert!(handle.close().is_ok());
		assert!(matches!(handle.local_endpoint(), Err(NetError::InvalidState { .. })));
	}

	#[test]
	#[should_panic(expected = "already owns")]
	fn double_create_panics() {
		let mut handle = SocketHandle::open(Protocol::TCP4).unwrap();
		let _ = handle.create(Protocol::TCP4);
	}

	#[test]
	fn take_leaves_source_closed() {
		let mut handle = SocketHandle::open(Protocol::UDP4).unwrap();
		let fd = handle.as_raw_fd();
		let moved = handle.take();
		assert_eq!(handle.state(), SocketState::Closed);
		assert_eq!(handle.as_raw_fd(), -1);
		assert_eq!(moved.as_raw_fd(), fd);
		assert_eq!(moved.state(), SocketState::Created);
	}

	#[test]
	#[should_panic(expected = "still owns")]
	fn adopt_into_live_handle_panics() {
		let mut live = SocketHandle::open(Protocol::TCP4).unwrap();
		let other = SocketHandle::open(Protocol::TCP4).unwrap();
		live.adopt(other);
	}

	#[test]
	fn shutdown_requires_open() {
		let mut handle = SocketHandle::open(Protocol::TCP4).unwrap();
		assert!(matches!(
			handle.shutdown_write(),
			Err(NetError::InvalidState { op: "shutdown_write", state: "created" })
		));
	}

	#[test]
	fn unix_handle_rejects_inet_bind() {
		let mut handle = SocketHandle::open(Protocol::UNIX).unwrap();
		assert!(matches!(handle.bind("127.0.0.1", 0), Err(NetError::UnsupportedFamily { .. })));
		assert_eq!(handle.state(), SocketState::Created);
	}
}
