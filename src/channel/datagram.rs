use std::os::fd::{AsRawFd, RawFd};

use super::{sealed, Registration, SelectableChannel};
use crate::addr::Endpoint;
use crate::error::Result;
use crate::protocol::Protocol;
use crate::selector::Ops;
use crate::socket::{DatagramSocket, IoOutcome, SocketOptions, SocketState};

/// Non-blocking datagram socket. Valid interest: `READ | WRITE`.
#[derive(Debug)]
pub struct DatagramSocketChannel {
	socket: DatagramSocket,
	registration: Registration,
}

impl DatagramSocketChannel {
	pub fn open(protocol: Protocol) -> Result<Self> {
		let socket = DatagramSocket::create(protocol)?;
		socket.set_nonblocking(true)?;
		Ok(Self { socket, registration: Registration::new() })
	}

	pub fn bind(&mut self, host: &str, port: u16) -> Result<()> {
		self.socket.bind(host, port)
	}

	pub fn bind_endpoint(&mut self, endpoint: &Endpoint) -> Result<()> {
		self.socket.bind_endpoint(endpoint)
	}

	pub fn send_to(&self, buf: &[u8], endpoint: &Endpoint) -> Result<IoOutcome> {
		self.socket.send_to(buf, endpoint)
	}

	pub fn recv_from(&self, buf: &mut [u8]) -> Result<IoOutcome<(usize, Endpoint)>> {
		self.socket.recv_from(buf)
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

	pub fn socket(&self) -> &DatagramSocket {
		&self.socket
	}

	pub fn close(&mut self) -> Result<()> {
		self.registration.cancel();
		self.socket.close()
	}
}

impl Drop for DatagramSocketChannel {
	fn drop(&mut self) {
		self.registration.cancel();
	}
}

impl AsRawFd for DatagramSocketChannel {
	fn as_raw_fd(&self) -> RawFd {
		self.socket.as_raw_fd()
	}
}

impl SocketOptions for DatagramSocketChannel {}

impl sealed::Sealed for DatagramSocketChannel {}

impl SelectableChannel for DatagramSocketChannel {
	fn valid_ops(&self) -> Ops {
		Ops::READ | Ops::WRITE
	}

	fn registration(&self) -> &Registration {
		&self.registration
	}
}
