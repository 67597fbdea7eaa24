use std::net::{Ipv4Addr, Ipv6Addr};

use proptest::prelude::*;
use selectlane::{Address, Endpoint, Family, NetError};

#[test]
fn parse_and_format_v4() {
	let addr = Address::parse("192.168.1.20").unwrap();
	assert_eq!(addr, Address::V4([192, 168, 1, 20]));
	assert_eq!(addr.family(), Family::Inet4);
	assert_eq!(addr.to_string(), "192.168.1.20");
	assert_eq!(addr.to_text(), "inet4://192.168.1.20");
}

#[test]
fn parse_and_format_v6() {
	let addr: Address = "fe80::1".parse().unwrap();
	assert_eq!(addr.family(), Family::Inet6);
	assert_eq!(addr.octets().len(), 16);
	assert_eq!(addr.to_text(), "inet6://fe80::1");
}

#[test]
fn malformed_text_names_input() {
	match Address::parse("300.1.1.1") {
		Err(NetError::InvalidAddressFormat { input, .. }) => assert_eq!(input, "300.1.1.1"),
		other => panic!("unexpected: {other:?}"),
	}
	assert!(Address::parse("").is_err());
	assert!(Address::parse("::g").is_err());
	assert!(Address::parse_family("10.0.0.1", Family::Inet6).is_err());
}

#[test]
fn from_bytes_checks_length() {
	assert_eq!(Address::from_bytes(Family::Inet4, &[10, 0, 0, 1]).unwrap(), Address::V4([10, 0, 0, 1]));
	assert!(Address::from_bytes(Family::Inet4, &[10, 0, 0]).is_err());
	assert!(Address::from_bytes(Family::Inet6, &[0; 4]).is_err());
	assert!(matches!(Address::from_bytes(Family::Unix, &[]), Err(NetError::UnsupportedFamily { .. })));
}

#[test]
fn classification_constants() {
	assert!(Address::ANY_V4.is_any());
	assert!(Address::ANY_V6.is_any());
	assert!(Address::LOOPBACK_V4.is_loopback());
	assert!(Address::LOOPBACK_V6.is_loopback());
	assert!(!Address::LOOPBACK_V4.is_any());
	assert!(!Address::ANY_V6.is_loopback());
}

#[test]
fn endpoint_text_forms() {
	let v4: Endpoint = "10.1.2.3:8080".parse().unwrap();
	assert_eq!(v4.address(), Address::V4([10, 1, 2, 3]));
	assert_eq!(v4.port(), Some(8080));
	assert_eq!(v4.to_string(), "10.1.2.3:8080");
	assert_eq!(v4.to_text(), "inet4://10.1.2.3:8080");

	let v6: Endpoint = "[::1]:443".parse().unwrap();
	assert_eq!(v6.address(), Address::LOOPBACK_V6);
	assert_eq!(v6.to_string(), "[::1]:443");

	let schemed: Endpoint = "inet6://[::1]:443".parse().unwrap();
	assert_eq!(schemed, v6);

	let unset = Endpoint::unset(Address::LOOPBACK_V4);
	assert_eq!(unset.port(), None);
	assert_eq!(unset.to_string(), "127.0.0.1");
}

#[test]
fn malformed_endpoints() {
	for input in ["10.1.2.3", "10.1.2.3:99999", "::1:80", "[::1:80", "inet6://10.0.0.1:80", "[::1]"] {
		let err = input.parse::<Endpoint>().unwrap_err();
		assert!(
			matches!(err, NetError::InvalidEndpoint { .. } | NetError::InvalidAddressFormat { .. }),
			"{input}: {err:?}"
		);
	}
}

#[test]
fn literal_resolves_without_lookup() {
	let addrs = selectlane::resolve_name("127.0.0.1", None).unwrap();
	assert_eq!(addrs, vec![Address::LOOPBACK_V4]);
	assert!(Address::resolve("::1", Family::Inet4).is_err());
}

proptest! {
	#[test]
	fn v4_text_round_trip(octets in any::<[u8; 4]>()) {
		let text = Ipv4Addr::from(octets).to_string();
		let addr = Address::parse(&text).unwrap();
		prop_assert_eq!(addr, Address::V4(octets));
		prop_assert_eq!(Address::parse(&addr.to_string()).unwrap(), addr);
		prop_assert_eq!(addr.to_text(), format!("inet4://{text}"));
	}

	#[test]
	fn v6_text_round_trip(octets in any::<[u8; 16]>()) {
		let addr = Address::V6(octets);
		let reparsed = Address::parse(&addr.to_string()).unwrap();
		prop_assert_eq!(reparsed, addr);
		prop_assert_eq!(reparsed.to_string(), Ipv6Addr::from(octets).to_string());
	}

	#[test]
	fn v4_classification(octets in any::<[u8; 4]>()) {
		let addr = Address::V4(octets);
		prop_assert_eq!(addr.is_loopback(), octets[0] == 127);
		prop_assert_eq!(addr.is_any(), octets == [0, 0, 0, 0]);
	}

	#[test]
	fn v6_classification(octets in any::<[u8; 16]>()) {
		let addr = Address::V6(octets);
		prop_assert_eq!(addr.is_loopback(), addr == Address::LOOPBACK_V6);
		prop_assert_eq!(addr.is_any(), addr == Address::ANY_V6);
	}

	#[test]
	fn endpoint_round_trip(octets in any::<[u8; 4]>(), port in any::<u16>()) {
		let endpoint = Endpoint::new(Address::V4(octets), port);
		prop_assert_eq!(endpoint.to_string().parse::<Endpoint>().unwrap(), endpoint);
	}
}
