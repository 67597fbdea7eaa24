mod builder;
mod datagram;
mod handle;
mod options;
mod server;
mod stream;

use std::fmt;

use crate::addr::Endpoint;
use crate::error::{NetError, Result};

pub use self::builder::{
	BufferConfig, DatagramSocketBuilder, KeepaliveConfig, ReuseConfig, ServerSocketBuilder,
	StreamSocketBuilder, TcpConfig, TimeoutConfig,
};
pub use self::datagram::DatagramSocket;
pub use self::handle::SocketHandle;
pub use self::options::{
	get_keepalive, get_linger, get_recv_buffer_size, get_recv_timeout, get_reuse_addr,
	get_reuse_port, get_send_buffer_size, get_send_timeout, get_tcp_nodelay, set_keepalive,
	set_linger, set_recv_buffer_size, set_recv_timeout, set_reuse_addr, set_reuse_port,
	set_send_buffer_size, set_send_timeout, set_tcp_nodelay, take_error, SocketOptions,
};
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use self::options::{set_keepalive_count, set_keepalive_idle, set_keepalive_interval};
pub use self::server::ServerSocket;
pub use self::stream::StreamSocket;

/// Lifecycle state of a socket handle.
///
/// `Closed → Created → {Open | Opening} → Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SocketState {
	#[default]
	Closed,
	/// Descriptor allocated, not yet listening or connected.
	Created,
	/// Listening, or connected.
	Open,
	/// Non-blocking connect in progress.
	Opening,
}

impl SocketState {
	pub fn name(self) -> &'static str {
		match self {
			SocketState::Closed => "closed",
			SocketState::Created => "created",
			SocketState::Open => "open",
			SocketState::Opening => "opening",
		}
	}
}

impl fmt::Display for SocketState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Outcome of a send or receive.
///
/// Would-block and orderly peer shutdown are outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOutcome<T = usize> {
	/// Bytes were transferred.
	Done(T),
	/// The descriptor is non-blocking and the call would have blocked.
	WouldBlock,
	/// The peer shut its write side down; a stream receive returned 0.
	PeerClosed,
}

impl<T> IoOutcome<T> {
	pub fn is_would_block(&self) -> bool {
		matches!(self, IoOutcome::WouldBlock)
	}

	/// `Some` for transferred data, `None` for would-block, and
	/// `ConnectionClosedByPeer` for a peer shutdown.
	pub fn into_result(self) -> Result<Option<T>> {
		match self {
			IoOutcome::Done(v) => Ok(Some(v)),
			IoOutcome::WouldBlock => Ok(None),
			IoOutcome::PeerClosed => Err(NetError::ConnectionClosedByPeer),
		}
	}
}

/// Outcome of a connect call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
	/// The connection is established; the handle is `Open`.
	Connected,
	/// The handle is non-blocking and the handshake is still running; the
	/// handle is `Opening` until `finish_connect` confirms it.
	InProgress,
}

/// Outcome of an accept call.
///
/// The listening handle stays `Open` in all cases.
#[derive(Debug)]
pub enum AcceptOutcome<T> {
	/// A connection was accepted from the given peer.
	Accepted(T, Endpoint),
	/// No connection is queued on a non-blocking listener.
	WouldBlock,
	/// The call was interrupted by a signal; safe to retry immediately.
	Interrupted,
}

impl<T> AcceptOutcome<T> {
	pub(crate) fn map<U>(self, f: impl FnOnce(T) -> U) -> AcceptOutcome<U> {
		match self {
			AcceptOutcome::Accepted(v, peer) => AcceptOutcome::Accepted(f(v), peer),
			AcceptOutcome::WouldBlock => AcceptOutcome::WouldBlock,
			AcceptOutcome::Interrupted => AcceptOutcome::Interrupted,
		}
	}
}

/*
The three outcome enums report what the kernel said, not a state change:
- IoOutcome::WouldBlock   → EAGAIN on a non-blocking descriptor
- IoOutcome::PeerClosed   → recv() returned 0 on a stream
- ConnectOutcome::InProgress → EINPROGRESS, handle moved to Opening
- AcceptOutcome::WouldBlock  → nothing queued, listener unchanged
*/
