//! Name lookup and local interface enumeration.

use std::ffi::{CStr, CString};

use tracing::trace;

use super::{ipv4, ipv6, Address, Endpoint, Family, ToSockAddr};
use crate::error::{errno, NetError, Result};

const NI_MAXHOST: usize = 1025;

fn gai_error(host: &str, code: libc::c_int) -> NetError {
	let message = unsafe { CStr::from_ptr(libc::gai_strerror(code)) }
		.to_string_lossy()
		.into_owned();
	NetError::Resolution { host: host.to_string(), code, message }
}

/// Resolves a host name to all of its addresses, in resolver order.
///
/// Literals short-circuit without touching the resolver. With `family`
/// set, addresses of other families are dropped, so a name with no
/// address of that family yields an empty list rather than an error.
pub fn resolve_name(host: &str, family: Option<Family>) -> Result<Vec<Address>> {
	if let Ok(addr) = Address::parse(host) {
		let keep = family.is_none_or(|f| f == addr.family());
		return Ok(if keep { vec![addr] } else { Vec::new() });
	}
	if matches!(family, Some(Family::Unix)) {
		return Err(NetError::UnsupportedFamily { family: "unix" });
	}

	let c_host = CString::new(host).map_err(|_| gai_error(host, libc::EAI_NONAME))?;
	let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
	hints.ai_family = libc::AF_UNSPEC;
	hints.ai_socktype = libc::SOCK_STREAM;

	let mut res: *mut libc::addrinfo = std::ptr::null_mut();
	let rc = unsafe { libc::getaddrinfo(c_host.as_ptr(), std::ptr::null(), &hints, &mut res) };
	if rc != 0 {
		return Err(gai_error(host, rc));
	}

	let mut out = Vec::new();
	let mut cursor = res;
	while !cursor.is_null() {
		let info = unsafe { &*cursor };
		cursor = info.ai_next;
		if info.ai_addr.is_null() {
			continue;
		}
		let addr = match unsafe { (*info.ai_addr).sa_family } as libc::c_int {
			libc::AF_INET => {
				let raw = unsafe { &*(info.ai_addr as *const libc::sockaddr_in) };
				Address::V4(ipv4::from_raw(raw).0)
			}
			libc::AF_INET6 => {
				let raw = unsafe { &*(info.ai_addr as *const libc::sockaddr_in6) };
				Address::V6(ipv6::from_raw(raw).0)
			}
			_ => continue,
		};
		if family.is_some_and(|f| f != addr.family()) || out.contains(&addr) {
			continue;
		}
		out.push(addr);
	}
	unsafe { libc::freeaddrinfo(res) };

	trace!(host, count = out.len(), "resolved name");
	Ok(out)
}

/// Lists the addresses assigned to local interfaces, excluding the
/// unspecified and loopback addresses.
pub fn local_interfaces() -> Result<Vec<Address>> {
	let mut ifaddr: *mut libc::ifaddrs = std::ptr::null_mut();
	if unsafe { libc::getifaddrs(&mut ifaddr) } == -1 {
		return Err(NetError::Io { errno: errno(), op: "getifaddrs" });
	}

	let mut out = Vec::new();
	let mut cursor = ifaddr;
	while !cursor.is_null() {
		let entry = unsafe { &*cursor };
		cursor = entry.ifa_next;
		if entry.ifa_addr.is_null() {
			continue;
		}
		let addr = match unsafe { (*entry.ifa_addr).sa_family } as libc::c_int {
			libc::AF_INET => {
				let raw = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in) };
				Address::V4(ipv4::from_raw(raw).0)
			}
			libc::AF_INET6 => {
				let raw = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in6) };
				Address::V6(ipv6::from_raw(raw).0)
			}
			_ => continue,
		};
		if !addr.is_any() && !addr.is_loopback() {
			out.push(addr);
		}
	}
	unsafe { libc::freeifaddrs(ifaddr) };
	Ok(out)
}

impl Address {
	/// Reverse lookup. Falls back to the numeric form when the address has
	/// no name.
	pub fn hostname(&self) -> Result<String> {
		let mut buf = [0 as libc::c_char; NI_MAXHOST];
		let rc = Endpoint::unset(*self).with_raw(|ptr, len| unsafe {
			libc::getnameinfo(
				ptr,
				len,
				buf.as_mut_ptr(),
				buf.len() as libc::socklen_t,
				std::ptr::null_mut(),
				0,
				0,
			)
		});
		if rc != 0 {
			return Err(gai_error(&self.to_string(), rc));
		}
		Ok(unsafe { CStr::from_ptr(buf.as_ptr()) }.to_string_lossy().into_owned())
	}

	/// Resolves `host` to a single address of `family`: a literal of that
	/// family, or the first resolver answer of that family.
	pub fn resolve(host: &str, family: Family) -> Result<Address> {
		if family == Family::Unix {
			return Err(NetError::UnsupportedFamily { family: "unix" });
		}
		if let Ok(addr) = Address::parse_family(host, family) {
			return Ok(addr);
		}
		if Address::parse(host).is_ok() {
			// a literal of the other family
			return Err(NetError::InvalidAddressFormat { input: host.to_string(), family: family.name() });
		}
		resolve_name(host, Some(family))?.into_iter().next().ok_or_else(|| NetError::Resolution {
			host: host.to_string(),
			code: libc::EAI_NONAME,
			message: format!("no {} address", family.name()),
		})
	}
}
