use std::fmt;
use std::str::FromStr;

use super::{ipv4, ipv6, Address, Family};
use crate::error::{NetError, Result};

/// An address paired with a port.
///
/// The port may be unset; an unset port goes out as 0 on the wire. IPv6
/// endpoints also carry flow info and a scope id so a value read back from
/// the kernel converts losslessly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
	address: Address,
	port: Option<u16>,
	flow_info: u32,
	scope_id: u32,
}

impl Endpoint {
	pub fn new(address: Address, port: u16) -> Self {
		Self { address, port: Some(port), flow_info: 0, scope_id: 0 }
	}

	/// An endpoint whose port is not set.
	pub fn unset(address: Address) -> Self {
		Self { address, port: None, flow_info: 0, scope_id: 0 }
	}

	/// Sets the IPv6 scope id (interface index). Ignored for IPv4.
	pub fn with_scope_id(mut self, scope_id: u32) -> Self {
		self.scope_id = scope_id;
		self
	}

	pub fn address(&self) -> Address {
		self.address
	}

	pub fn port(&self) -> Option<u16> {
		self.port
	}

	pub fn family(&self) -> Family {
		self.address.family()
	}

	pub fn scope_id(&self) -> u32 {
		self.scope_id
	}

	pub fn flow_info(&self) -> u32 {
		self.flow_info
	}

	/// Renders `family://literal:port`, bracketing IPv6 literals.
	pub fn to_text(&self) -> String {
		format!("{}://{}", self.family(), self)
	}
}

impl fmt::Display for Endpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match (self.address, self.port) {
			(Address::V4(_), Some(port)) => write!(f, "{}:{}", self.address, port),
			(Address::V6(_), Some(port)) => write!(f, "[{}]:{}", self.address, port),
			(_, None) => write!(f, "{}", self.address),
		}
	}
}

impl FromStr for Endpoint {
	type Err = NetError;

	/// Accepts `1.2.3.4:80`, `[::1]:8080`, optionally prefixed by
	/// `inet4://` or `inet6://`.
	fn from_str(s: &str) -> Result<Self> {
		let invalid = |reason| NetError::InvalidEndpoint { input: s.to_string(), reason };

		let (scheme, rest) = match s.split_once("://") {
			Some((scheme, rest)) => (Some(scheme), rest),
			None => (None, s),
		};

		let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
			let (host, tail) = bracketed.split_once(']').ok_or_else(|| invalid("unterminated '['"))?;
			let port = tail.strip_prefix(':').ok_or_else(|| invalid("missing port"))?;
			(Address::V6(ipv6::parse(host)?), port)
		} else {
			let (host, port) = rest.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
			if host.contains(':') {
				return Err(invalid("IPv6 literal must be bracketed"));
			}
			(Address::V4(ipv4::parse(host)?), port)
		};

		if let Some(scheme) = scheme {
			if scheme != host.family().name() {
				return Err(invalid("scheme does not match address family"));
			}
		}

		let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
		Ok(Endpoint::new(host, port))
	}
}

impl From<std::net::SocketAddr> for Endpoint {
	fn from(addr: std::net::SocketAddr) -> Self {
		match addr {
			std::net::SocketAddr::V4(v4) => Endpoint::new(Address::V4(v4.ip().octets()), v4.port()),
			std::net::SocketAddr::V6(v6) => Endpoint {
				address: Address::V6(v6.ip().octets()),
				port: Some(v6.port()),
				flow_info: v6.flowinfo(),
				scope_id: v6.scope_id(),
			},
		}
	}
}

/// Conversion to a raw sockaddr for syscalls.
pub(crate) trait ToSockAddr {
	/// Calls the provided closure with a pointer to the raw sockaddr and its size.
	fn with_raw<F, R>(&self, f: F) -> R
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R;
}

impl ToSockAddr for Endpoint {
	fn with_raw<F, R>(&self, f: F) -> R
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		let port = self.port.unwrap_or(0);
		match self.address {
			Address::V4(ip) => {
				let raw = ipv4::to_raw(ip, port);
				f(
					&raw as *const libc::sockaddr_in as *const libc::sockaddr,
					std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
				)
			}
			Address::V6(ip) => {
				let raw = ipv6::to_raw(ip, port, self.flow_info, self.scope_id);
				f(
					&raw as *const libc::sockaddr_in6 as *const libc::sockaddr,
					std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t,
				)
			}
		}
	}
}

/// Storage the kernel writes an address into (accept, getsockname,
/// getpeername, recvfrom).
pub struct SockAddr {
	storage: libc::sockaddr_storage,
	len: libc::socklen_t,
}

impl SockAddr {
	pub(crate) fn empty() -> Self {
		Self {
			storage: unsafe { std::mem::zeroed() },
			len: std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t,
		}
	}

	pub(crate) fn as_mut_ptr(&mut self) -> *mut libc::sockaddr {
		&mut self.storage as *mut libc::sockaddr_storage as *mut libc::sockaddr
	}

	pub(crate) fn len_mut(&mut self) -> &mut libc::socklen_t {
		&mut self.len
	}

	pub fn family(&self) -> Option<Family> {
		Family::from_raw(self.storage.ss_family as libc::c_int)
	}

	/// Decodes the stored address. Fails for non-IP families or a short length.
	pub fn to_endpoint(&self) -> Result<Endpoint> {
		let ptr = &self.storage as *const libc::sockaddr_storage;
		match self.family() {
			Some(Family::Inet4) if self.len as usize >= std::mem::size_of::<libc::sockaddr_in>() => {
				let raw = unsafe { &*(ptr as *const libc::sockaddr_in) };
				let (ip, port) = ipv4::from_raw(raw);
				Ok(Endpoint::new(Address::V4(ip), port))
			}
			Some(Family::Inet6) if self.len as usize >= std::mem::size_of::<libc::sockaddr_in6>() => {
				let raw = unsafe { &*(ptr as *const libc::sockaddr_in6) };
				let (ip, port, flow_info, scope_id) = ipv6::from_raw(raw);
				Ok(Endpoint { address: Address::V6(ip), port: Some(port), flow_info, scope_id })
			}
			Some(Family::Unix) => Err(NetError::UnsupportedFamily { family: "unix" }),
			_ => Err(NetError::InvalidEndpoint {
				input: format!("sockaddr(family={}, len={})", self.storage.ss_family, self.len),
				reason: "not an inet address",
			}),
		}
	}
}
