use std::os::fd::{AsRawFd, RawFd};

use super::{AcceptOutcome, SocketHandle, SocketOptions, SocketState, StreamSocket};
use crate::addr::Endpoint;
use crate::error::Result;
use crate::protocol::{Protocol, SockKind};

/// A listening stream socket.
///
/// Exposes bind, listen and accept. Send and receive are not available
/// here; they live on the `StreamSocket`s that `accept` hands out.
#[derive(Debug)]
pub struct ServerSocket {
	handle: SocketHandle,
}

impl ServerSocket {
	/// Allocates the descriptor. The socket starts `Created`.
	pub fn create(protocol: Protocol) -> Result<Self> {
		protocol.require_kind(SockKind::Stream)?;
		Ok(Self { handle: SocketHandle::open(protocol)? })
	}

	/// Binds to `host:port`; port 0 picks an ephemeral port.
	pub fn bind(&mut self, host: &str, port: u16) -> Result<()> {
		self.handle.bind(host, port)
	}

	pub fn bind_endpoint(&mut self, endpoint: &Endpoint) -> Result<()> {
		self.handle.bind_endpoint(endpoint)
	}

	/// Starts listening; the socket becomes `Open`.
	pub fn listen(&mut self, backlog: i32) -> Result<()> {
		self.handle.listen(backlog)
	}

	/// Accepts one queued connection.
	///
	/// On a blocking socket this waits for a peer. On a non-blocking one it
	/// reports `WouldBlock` when nothing is queued; a successful accept
	/// does not imply the new stream is readable yet.
	pub fn accept(&self) -> Result<AcceptOutcome<StreamSocket>> {
		Ok(self.handle.accept()?.map(StreamSocket::from_handle))
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

	/// Idempotent.
	pub fn close(&mut self) -> Result<()> {
		self.handle.close()
	}

	pub fn handle(&self) -> &SocketHandle {
		&self.handle
	}
}

impl AsRawFd for ServerSocket {
	fn as_raw_fd(&self) -> RawFd {
		self.handle.as_raw_fd()
	}
}

impl SocketOptions for ServerSocket {}
