use std::io;
use std::os::fd::{AsRawFd, RawFd};

use super::{ConnectOutcome, IoOutcome, SocketHandle, SocketOptions, SocketState};
use crate::addr::Endpoint;
use crate::error::Result;
use crate::protocol::{Protocol, SockKind};

/// A connection-oriented byte stream.
///
/// Created unconnected by `create` (client side) or already `Open` by
/// `ServerSocket::accept` (server side).
#[derive(Debug)]
pub struct StreamSocket {
	handle: SocketHandle,
}

impl StreamSocket {
	pub fn create(protocol: Protocol) -> Result<Self> {
		protocol.require_kind(SockKind::Stream)?;
		Ok(Self { handle: SocketHandle::open(protocol)? })
	}

	pub(crate) fn from_handle(handle: SocketHandle) -> Self {
		Self { handle }
	}

	/// Resolves `host` and connects. See `SocketHandle::connect_endpoint`
	/// for the state transitions.
	pub fn connect(&mut self, host: &str, port: u16) -> Result<ConnectOutcome> {
		self.handle.connect(host, port)
	}

	pub fn connect_endpoint(&mut self, endpoint: &Endpoint) -> Result<ConnectOutcome> {
		self.handle.connect_endpoint(endpoint)
	}

	/// Confirms a non-blocking connect: `Ok(true)` once established.
	pub fn finish_connect(&mut self) -> Result<bool> {
		self.handle.finish_connect()
	}

	pub fn send(&self, buf: &[u8]) -> Result<IoOutcome> {
		self.handle.send(buf)
	}

	pub fn receive(&self, buf: &mut [u8]) -> Result<IoOutcome> {
		self.handle.receive(buf)
	}

	pub fn shutdown_read(&mut self) -> Result<()> {
		self.handle.shutdown_read()
	}

	pub fn shutdown_write(&mut self) -> Result<()> {
		self.handle.shutdown_write()
	}

	pub fn local_endpoint(&self) -> Result<Endpoint> {
		self.handle.local_endpoint()
	}

	pub fn remote_endpoint(&self) -> Result<Endpoint> {
		self.handle.remote_endpoint()
	}

	pub fn state(&self) -> SocketState {
		self.handle.state()
	}

	pub fn is_connected(&self) -> bool {
		self.handle.is_connected()
	}

	pub fn is_connecting(&self) -> bool {
		self.handle.is_connecting()
	}

	pub fn is_read_shutdown(&self) -> bool {
		self.handle.is_read_shutdown()
	}

	pub fn is_write_shutdown(&self) -> bool {
		self.handle.is_write_shutdown()
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

impl AsRawFd for StreamSocket {
	fn as_raw_fd(&self) -> RawFd {
		self.handle.as_raw_fd()
	}
}

impl SocketOptions for StreamSocket {}

// Peer shutdown reads as Ok(0); would-block surfaces as ErrorKind::WouldBlock.
impl io::Read for &StreamSocket {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		match self.receive(buf)? {
			IoOutcome::Done(n) => Ok(n),
			IoOutcome::PeerClosed => Ok(0),
			IoOutcome::WouldBlock => Err(io::ErrorKind::WouldBlock.into()),
		}
	}
}

impl io::Write for &StreamSocket {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		match self.send(buf)? {
			IoOutcome::Done(n) => Ok(n),
			IoOutcome::PeerClosed => Ok(0),
			IoOutcome::WouldBlock => Err(io::ErrorKind::WouldBlock.into()),
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

impl io::Read for StreamSocket {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		io::Read::read(&mut &*self, buf)
	}
}

impl io::Write for StreamSocket {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		io::Write::write(&mut &*self, buf)
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}
