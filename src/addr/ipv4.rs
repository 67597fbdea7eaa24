//! IPv4 text form and `sockaddr_in` layout.

use std::fmt;

use crate::error::{NetError, Result};

pub(crate) const ANY: [u8; 4] = [0, 0, 0, 0];
pub(crate) const LOOPBACK: [u8; 4] = [127, 0, 0, 1];

/// Parses dotted-decimal text. Rejects anything other than exactly four
/// decimal octets.
pub(crate) fn parse(text: &str) -> Result<[u8; 4]> {
	text.parse::<std::net::Ipv4Addr>()
		.map(|ip| ip.octets())
		.map_err(|_| NetError::InvalidAddressFormat { input: text.to_string(), family: "inet4" })
}

pub(crate) fn fmt(ip: &[u8; 4], f: &mut fmt::Formatter<'_>) -> fmt::Result {
	write!(f, "{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3])
}

/// 127.0.0.0/8.
#[inline]
pub(crate) fn is_loopback(ip: &[u8; 4]) -> bool {
	ip[0] == 127
}

/// Converts to the raw sockaddr_in for syscalls.
pub(crate) fn to_raw(ip: [u8; 4], port: u16) -> libc::sockaddr_in {
	let mut raw: libc::sockaddr_in = unsafe { std::mem::zeroed() };
	raw.sin_family = libc::AF_INET as libc::sa_family_t;
	raw.sin_port = port.to_be();
	raw.sin_addr = libc::in_addr { s_addr: u32::from_ne_bytes(ip) };
	raw
}

/// Creates from raw sockaddr_in.
pub(crate) fn from_raw(raw: &libc::sockaddr_in) -> ([u8; 4], u16) {
	(raw.sin_addr.s_addr.to_ne_bytes(), u16::from_be(raw.sin_port))
}

/*
sockaddr_in on the wire:
  - sin_family: AF_INET
  - sin_port:   port in network byte order (big-endian)
  - sin_addr:   4 address bytes, network order
  - sin_zero:   padding to sizeof(sockaddr)
*/

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn raw_layout_is_network_order() {
		let raw = to_raw([192, 168, 1, 20], 0x1f90);
		assert_eq!(raw.sin_family as libc::c_int, libc::AF_INET);
		assert_eq!(raw.sin_port.to_ne_bytes(), [0x1f, 0x90]);
		assert_eq!(raw.sin_addr.s_addr.to_ne_bytes(), [192, 168, 1, 20]);
		assert_eq!(from_raw(&raw), ([192, 168, 1, 20], 8080));
	}

	#[test]
	fn rejects_partial_forms() {
		assert!(parse("127.1").is_err());
		assert!(parse("256.0.0.1").is_err());
		assert!(parse("1.2.3.4.5").is_err());
		assert!(parse("").is_err());
	}
}
