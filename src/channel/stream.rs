use std::os::fd::{AsRawFd, RawFd};

use super::{sealed, Registration, SelectableChannel};
use crate::addr::Endpoint;
use crate::error::Result;
use crate::protocol::Protocol;
use crate::selector::Ops;
use crate::socket::{ConnectOutcome, IoOutcome, SocketOptions, SocketState, StreamSocket};

/// Non-blocking stream. Valid interest: `CONNECT | READ | WRITE`.
///
/// `connect` normally returns `InProgress`; register for `CONNECT` and call
/// `finish_connect` once the key reports it. The selector drops `CONNECT`
/// from the interest set after reporting it.
#[derive(Debug)]
pub struct StreamSocketChannel {
	socket: StreamSocket,
	registration: Registration,
}

impl StreamSocketChannel {
	pub fn open(protocol: Protocol) -> Result<Self> {
		Self::from_stream(StreamSocket::create(protocol)?)
	}

	/// Wraps an existing stream, switching it to non-blocking mode.
	pub fn from_stream(socket: StreamSocket) -> Result<Self> {
		socket.set_nonblocking(true)?;
		Ok(Self::wrap(socket))
	}

	pub(crate) fn wrap(socket: StreamSocket) -> Self {
		Self { socket, registration: Registration::new() }
	}

	pub fn connect(&mut self, host: &str, port: u16) -> Result<ConnectOutcome> {
		self.socket.connect(host, port)
	}

	pub fn connect_endpoint(&mut self, endpoint: &Endpoint) -> Result<ConnectOutcome> {
		self.socket.connect_endpoint(endpoint)
	}

	/// `Ok(true)` once connected, `Ok(false)` while still in progress, or
	/// the connect error.
	pub fn finish_connect(&mut self) -> Result<bool> {
		self.socket.finish_connect()
	}

	pub fn send(&self, buf: &[u8]) -> Result<IoOutcome> {
		self.socket.send(buf)
	}

	pub fn receive(&self, buf: &mut [u8]) -> Result<IoOutcome> {
		self.socket.receive(buf)
	}

	pub fn shutdown_read(&mut self) -> Result<()> {
		self.socket.shutdown_read()
	}

	pub fn shutdown_write(&mut self) -> Result<()> {
		self.socket.shutdown_write()
	}

	pub fn local_endpoint(&self) -> Result<Endpoint> {
		self.socket.local_endpoint()
	}

	pub fn remote_endpoint(&self) -> Result<Endpoint> {
		self.socket.remote_endpoint()
	}

	pub fn state(&self) -> SocketState {
		self.socket.state()
	}

	pub fn is_connected(&self) -> bool {
		self.socket.is_connected()
	}

	pub fn is_connecting(&self) -> bool {
		self.socket.is_connecting()
	}

	pub fn socket(&self) -> &StreamSocket {
		&self.socket
	}

	/// Cancels the key, then closes the descriptor. Idempotent.
	pub fn close(&mut self) -> Result<()> {
		self.registration.cancel();
		self.socket.close()
	}
}

impl Drop for StreamSocketChannel {
	fn drop(&mut self) {
		self.registration.cancel();
	}
}

impl AsRawFd for StreamSocketChannel {
	fn as_raw_fd(&self) -> RawFd {
		self.socket.as_raw_fd()
	}
}

impl SocketOptions for StreamSocketChannel {}

impl sealed::Sealed for StreamSocketChannel {}

impl SelectableChannel for StreamSocketChannel {
	fn valid_ops(&self) -> Ops {
		Ops::CONNECT | Ops::READ | Ops::WRITE
	}

	fn registration(&self) -> &Registration {
		&self.registration
	}
}
