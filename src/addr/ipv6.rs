//! IPv6 text form and `sockaddr_in6` layout.

use std::fmt;

use crate::error::{NetError, Result};

pub(crate) const ANY: [u8; 16] = [0; 16];
pub(crate) const LOOPBACK: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];

/// Parses colon-hex text (RFC 4291 forms, including embedded IPv4 tails).
pub(crate) fn parse(text: &str) -> Result<[u8; 16]> {
	text.parse::<std::net::Ipv6Addr>()
		.map(|ip| ip.octets())
		.map_err(|_| NetError::InvalidAddressFormat { input: text.to_string(), family: "inet6" })
}

/// Canonical RFC 5952 text, without brackets.
pub(crate) fn fmt(ip: &[u8; 16], f: &mut fmt::Formatter<'_>) -> fmt::Result {
	fmt::Display::fmt(&std::net::Ipv6Addr::from(*ip), f)
}

/// Converts to the raw sockaddr_in6 for syscalls.
pub(crate) fn to_raw(ip: [u8; 16], port: u16, flow_info: u32, scope_id: u32) -> libc::sockaddr_in6 {
	let mut raw: libc::sockaddr_in6 = unsafe { std::mem::zeroed() };
	raw.sin6_family = libc::AF_INET6 as libc::sa_family_t;
	raw.sin6_port = port.to_be();
	raw.sin6_flowinfo = flow_info.to_be();
	raw.sin6_addr = libc::in6_addr { s6_addr: ip };
	raw.sin6_scope_id = scope_id;
	raw
}

/// Creates from raw sockaddr_in6: (address, port, flow info, scope id).
pub(crate) fn from_raw(raw: &libc::sockaddr_in6) -> ([u8; 16], u16, u32, u32) {
	(
		raw.sin6_addr.s6_addr,
		u16::from_be(raw.sin6_port),
		u32::from_be(raw.sin6_flowinfo),
		raw.sin6_scope_id,
	)
}

/*
Two extra fields compared to IPv4:
- sin6_flowinfo: traffic class and flow label (usually 0)
- sin6_scope_id: interface index for link-local addresses like fe80::
*/
