use std::fmt;

use crate::addr::Family;
use crate::error::{NetError, Result};

/// Socket kind passed to `socket()`.
///
/// - `Stream`: reliable, ordered byte stream (TCP-like)
/// - `Datagram`: discrete, unordered messages (UDP-like)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SockKind {
	Stream,
	Datagram,
}

impl SockKind {
	#[inline]
	pub fn raw(self) -> libc::c_int {
		match self {
			SockKind::Stream => libc::SOCK_STREAM,
			SockKind::Datagram => libc::SOCK_DGRAM,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			SockKind::Stream => "stream",
			SockKind::Datagram => "datagram",
		}
	}
}

/// The `{family, kind, proto}` triple a socket is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Protocol {
	family: Family,
	kind: SockKind,
	proto: i32,
}

impl Protocol {
	pub const TCP4: Protocol = Protocol::new(Family::Inet4, SockKind::Stream, 0);
	pub const UDP4: Protocol = Protocol::new(Family::Inet4, SockKind::Datagram, 0);
	pub const TCP6: Protocol = Protocol::new(Family::Inet6, SockKind::Stream, 0);
	pub const UDP6: Protocol = Protocol::new(Family::Inet6, SockKind::Datagram, 0);
	pub const UNIX: Protocol = Protocol::new(Family::Unix, SockKind::Stream, 0);

	pub const fn new(family: Family, kind: SockKind, proto: i32) -> Self {
		Self { family, kind, proto }
	}

	pub fn family(&self) -> Family {
		self.family
	}

	pub fn kind(&self) -> SockKind {
		self.kind
	}

	pub fn proto(&self) -> i32 {
		self.proto
	}

	/// Fails with `WrongSocketKind` unless this protocol is of `kind`.
	pub(crate) fn require_kind(&self, kind: SockKind) -> Result<()> {
		if self.kind == kind {
			Ok(())
		} else {
			Err(NetError::WrongSocketKind { protocol: self.to_string(), expected: kind.name() })
		}
	}

	/// `tcp`, `udp`, `tcp6`, `udp6`, `unix`, or `unix-dgram`.
	pub fn short_name(&self) -> &'static str {
		match (self.family, self.kind) {
			(Family::Inet4, SockKind::Stream) => "tcp",
			(Family::Inet4, SockKind::Datagram) => "udp",
			(Family::Inet6, SockKind::Stream) => "tcp6",
			(Family::Inet6, SockKind::Datagram) => "udp6",
			(Family::Unix, SockKind::Stream) => "unix",
			(Family::Unix, SockKind::Datagram) => "unix-dgram",
		}
	}
}

impl fmt::Display for Protocol {
	/// `inet:stream:0`, `inet6:datagram:0`, `unix:stream:0`.
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let family = match self.family {
			Family::Inet4 => "inet",
			Family::Inet6 => "inet6",
			Family::Unix => "unix",
		};
		write!(f, "{}:{}:{}", family, self.kind.name(), self.proto)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display_and_short_names() {
		assert_eq!(Protocol::TCP4.to_string(), "inet:stream:0");
		assert_eq!(Protocol::UDP6.to_string(), "inet6:datagram:0");
		assert_eq!(Protocol::UNIX.to_string(), "unix:stream:0");
		assert_eq!(Protocol::UDP4.short_name(), "udp");
		assert_eq!(Protocol::TCP6.short_name(), "tcp6");
	}

	#[test]
	fn constants_map_to_libc() {
		assert_eq!(Protocol::TCP6.family().raw(), libc::AF_INET6);
		assert_eq!(Protocol::UDP4.kind().raw(), libc::SOCK_DGRAM);
	}

	#[test]
	fn require_kind_names_protocol() {
		assert!(Protocol::TCP6.require_kind(SockKind::Stream).is_ok());
		match Protocol::UDP4.require_kind(SockKind::Stream) {
			Err(NetError::WrongSocketKind { protocol, expected }) => {
				assert_eq!(protocol, "inet:datagram:0");
				assert_eq!(expected, "stream");
			}
			other => panic!("unexpected: {other:?}"),
		}
	}
}
