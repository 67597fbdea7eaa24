use std::os::fd::{AsRawFd, RawFd};

use super::{IoOutcome, SocketHandle, SocketOptions, SocketState};
use crate::addr::Endpoint;
use crate::error::Result;
use crate::protocol::{Protocol, SockKind};

/// A message-oriented socket.
///
/// Every send names its destination and every receive reports its source;
/// the socket is never implicitly connected.
#[derive(Debug)]
pub struct DatagramSocket {
	handle: SocketHandle,
}

impl DatagramSocket {
	pub fn create(protocol: Protocol) -> Result<Self> {
		protocol.require_kind(SockKind::Datagram)?;
		Ok(Self { handle: SocketHandle::open(protocol)? })
	}

	/// Binds the local side; without a bind the OS assigns one on first send.
	pub fn bind(&mut self, host: &str, port: u16) -> Result<()> {
		self.handle.bind(host, port)
	}

	pub fn bind_endpoint(&mut self, endpoint: &Endpoint) -> Result<()> {
		self.handle.bind_endpoint(endpoint)
	}

	/// Sends one datagram. The whole buffer goes out as one message.
	pub fn send_to(&self, buf: &[u8], endpoint: &Endpoint) -> Result<IoOutcome> {
		self.handle.send_to(buf, endpoint)
	}

	/// Receives one datagram; a message longer than `buf` is truncated.
	pub fn recv_from(&self, buf: &mut [u8]) -> Result<IoOutcome<(usize, Endpoint)>> {
		self.handle.recv_from(buf)
	}

	pub fn local_endpoint(&self) -> Result<Endpoint> {
		self.handle.local_endpoint()
	}

	pub fn local_port(&self) -> Result<u16> {
		self.handle.local_port()
	}

	pub fn state(&self) -> SocketState {
		self.handle.state()
	}

	pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
		self.handle.set_nonblocking(nonblocking)
	}

	pub fn is_nonblocking(&self) -> Result<bool> {
		self.handle.is_nonblocking()
	}

	pub fn close(&mut self) -> Result<()> {
		self.handle.close()
	}

	pub fn handle(&self) -> &SocketHandle {
		&self.handle
	}
}

impl AsRawFd for DatagramSocket {
	fn as_raw_fd(&self) -> RawFd {
		self.handle.as_raw_fd()
	}
}

impl SocketOptions for DatagramSocket {}
