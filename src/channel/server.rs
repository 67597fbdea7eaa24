use std::os::fd::{AsRawFd, RawFd};

use super::{sealed, Registration, SelectableChannel, StreamSocketChannel};
use crate::addr::Endpoint;
use crate::error::Result;
use crate::protocol::Protocol;
use crate::selector::Ops;
use crate::socket::{AcceptOutcome, ServerSocket, SocketOptions, SocketState};

/// Non-blocking listener. Valid interest: `ACCEPT`.
#[derive(Debug)]
pub struct ServerSocketChannel {
	socket: ServerSocket,
	registration: Registration,
}

impl ServerSocketChannel {
	pub fn open(protocol: Protocol) -> Result<Self> {
		let socket = ServerSocket::create(protocol)?;
		socket.set_nonblocking(true)?;
		Ok(Self { socket, registration: Registration::new() })
	}

	pub fn bind(&mut self, host: &str, port: u16) -> Result<()> {
		self.socket.bind(host, port)
	}

	pub fn bind_endpoint(&mut self, endpoint: &Endpoint) -> Result<()> {
		self.socket.bind_endpoint(endpoint)
	}

	pub fn listen(&mut self, backlog: i32) -> Result<()> {
		self.socket.listen(backlog)
	}

	/// Accepts one queued connection as a non-blocking stream channel.
	pub fn accept(&self) -> Result<AcceptOutcome<StreamSocketChannel>> {
		match self.socket.accept()? {
			AcceptOutcome::Accepted(stream, peer) => {
				Ok(AcceptOutcome::Accepted(StreamSocketChannel::from_stream(stream)?, peer))
			}
			other => Ok(other.map(StreamSocketChannel::wrap)),
		}
	}

	pub fn local_endpoint(&self) -> Result<Endpoint> {
		self.socket.local_endpoint()
	}

	pub fn local_port(&self) -> Result<u16> {
		self.socket.local_port()
	}

	pub fn state(&self) -> SocketState {
		self.socket.state()
	}

	pub fn socket(&self) -> &ServerSocket {
		&self.socket
	}

	/// Cancels the key, then closes the descriptor. Idempotent.
	pub fn close(&mut self) -> Result<()> {
		self.registration.cancel();
		self.socket.close()
	}
}

impl Drop for ServerSocketChannel {
	fn drop(&mut self) {
		self.registration.cancel();
	}
}

impl AsRawFd for ServerSocketChannel {
	fn as_raw_fd(&self) -> RawFd {
		self.socket.as_raw_fd()
	}
}

impl SocketOptions for ServerSocketChannel {}

impl sealed::Sealed for ServerSocketChannel {}

impl SelectableChannel for ServerSocketChannel {
	fn valid_ops(&self) -> Ops {
		Ops::ACCEPT
	}

	fn registration(&self) -> &Registration {
		&self.registration
	}
}
