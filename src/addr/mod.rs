//! Host addresses, endpoints and their wire forms.
//!
//! - `Address`: an IPv4 or IPv6 host address
//! - `Endpoint`: an address plus a port, convertible to `sockaddr_in`/`sockaddr_in6`
//! - `Family`: the address family tag passed to `socket()`

mod endpoint;
pub(crate) mod ipv4;
pub(crate) mod ipv6;
mod resolve;

use std::fmt;
use std::str::FromStr;

use crate::error::{NetError, Result};

pub use self::endpoint::{Endpoint, SockAddr};
pub(crate) use self::endpoint::ToSockAddr;
pub use self::resolve::{local_interfaces, resolve_name};

/// Address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
	Inet4,
	Inet6,
	Unix,
}

impl Family {
	/// Returns the libc constant for this address family.
	#[inline]
	pub fn raw(self) -> libc::c_int {
		match self {
			Family::Inet4 => libc::AF_INET,
			Family::Inet6 => libc::AF_INET6,
			Family::Unix => libc::AF_UNIX,
		}
	}

	pub(crate) fn from_raw(raw: libc::c_int) -> Option<Self> {
		match raw {
			libc::AF_INET => Some(Family::Inet4),
			libc::AF_INET6 => Some(Family::Inet6),
			libc::AF_UNIX => Some(Family::Unix),
			_ => None,
		}
	}

	/// Scheme prefix used by `to_text()`.
	pub fn name(self) -> &'static str {
		match self {
			Family::Inet4 => "inet4",
			Family::Inet6 => "inet6",
			Family::Unix => "unix",
		}
	}
}

impl fmt::Display for Family {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// An immutable IPv4 or IPv6 host address, stored in network byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
	V4([u8; 4]),
	V6([u8; 16]),
}

impl Address {
	pub const ANY_V4: Address = Address::V4(ipv4::ANY);
	pub const LOOPBACK_V4: Address = Address::V4(ipv4::LOOPBACK);
	pub const ANY_V6: Address = Address::V6(ipv6::ANY);
	pub const LOOPBACK_V6: Address = Address::V6(ipv6::LOOPBACK);

	/// Builds an address from raw bytes; the length must match the family exactly.
	pub fn from_bytes(family: Family, bytes: &[u8]) -> Result<Self> {
		match family {
			Family::Inet4 => <[u8; 4]>::try_from(bytes).map(Address::V4).map_err(|_| {
				NetError::InvalidAddressFormat { input: format!("{:?}", bytes), family: "inet4" }
			}),
			Family::Inet6 => <[u8; 16]>::try_from(bytes).map(Address::V6).map_err(|_| {
				NetError::InvalidAddressFormat { input: format!("{:?}", bytes), family: "inet6" }
			}),
			Family::Unix => Err(NetError::UnsupportedFamily { family: "unix" }),
		}
	}

	/// Parses dotted-decimal or colon-hex text.
	pub fn parse(text: &str) -> Result<Self> {
		if text.contains(':') {
			ipv6::parse(text).map(Address::V6)
		} else {
			ipv4::parse(text).map(Address::V4)
		}
	}

	/// Parses text as an address of the given family only.
	pub fn parse_family(text: &str, family: Family) -> Result<Self> {
		match family {
			Family::Inet4 => ipv4::parse(text).map(Address::V4),
			Family::Inet6 => ipv6::parse(text).map(Address::V6),
			Family::Unix => Err(NetError::UnsupportedFamily { family: "unix" }),
		}
	}

	pub fn family(&self) -> Family {
		match self {
			Address::V4(_) => Family::Inet4,
			Address::V6(_) => Family::Inet6,
		}
	}

	/// Raw bytes in network order (4 or 16 of them).
	pub fn octets(&self) -> &[u8] {
		match self {
			Address::V4(ip) => ip,
			Address::V6(ip) => ip,
		}
	}

	/// True for the unspecified address of the family.
	pub fn is_any(&self) -> bool {
		match self {
			Address::V4(ip) => *ip == ipv4::ANY,
			Address::V6(ip) => *ip == ipv6::ANY,
		}
	}

	/// True for 127.0.0.0/8 or `::1`.
	pub fn is_loopback(&self) -> bool {
		match self {
			Address::V4(ip) => ipv4::is_loopback(ip),
			Address::V6(ip) => *ip == ipv6::LOOPBACK,
		}
	}

	/// Renders `family://literal`, e.g. `inet4://10.0.0.1` or `inet6://fe80::1`.
	pub fn to_text(&self) -> String {
		format!("{}://{}", self.family(), self)
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Address::V4(ip) => ipv4::fmt(ip, f),
			Address::V6(ip) => ipv6::fmt(ip, f),
		}
	}
}

impl FromStr for Address {
	type Err = NetError;

	fn from_str(s: &str) -> Result<Self> {
		Address::parse(s)
	}
}

impl From<std::net::IpAddr> for Address {
	fn from(ip: std::net::IpAddr) -> Self {
		match ip {
			std::net::IpAddr::V4(v4) => Address::V4(v4.octets()),
			std::net::IpAddr::V6(v6) => Address::V6(v6.octets()),
		}
	}
}

impl From<Address> for std::net::IpAddr {
	fn from(addr: Address) -> Self {
		match addr {
			Address::V4(ip) => std::net::IpAddr::from(ip),
			Address::V6(ip) => std::net::IpAddr::from(ip),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn from_bytes_checks_length() {
		assert_eq!(Address::from_bytes(Family::Inet4, &[10, 0, 0, 1]).unwrap(), Address::V4([10, 0, 0, 1]));
		assert!(Address::from_bytes(Family::Inet4, &[10, 0, 0]).is_err());
		assert!(Address::from_bytes(Family::Inet6, &[0; 4]).is_err());
		assert!(matches!(
			Address::from_bytes(Family::Unix, &[0; 4]),
			Err(NetError::UnsupportedFamily { .. })
		));
	}

	#[test]
	fn equality_is_variant_and_bytes() {
		let mapped = Address::parse("::ffff:127.0.0.1").unwrap();
		assert_ne!(mapped, Address::LOOPBACK_V4);
		assert!(!mapped.is_loopback());
	}
}
