use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use selectlane::{
	AcceptOutcome, ConnectOutcome, DatagramSocketChannel, IoOutcome, NetError, Ops, Protocol,
	SelectableChannel, SelectionKey, Selector, SelectorConfig, ServerSocketChannel, StreamSocket,
	StreamSocketChannel,
};

fn open_selector() -> Selector {
	let selector = Selector::new();
	selector.open().unwrap();
	selector
}

fn server_channel() -> (ServerSocketChannel, u16) {
	let mut server = ServerSocketChannel::open(Protocol::TCP4).unwrap();
	server.bind("127.0.0.1", 0).unwrap();
	server.listen(16).unwrap();
	let port = server.local_port().unwrap();
	(server, port)
}

/// Polls until `key` is reported and returns its ready set.
fn wait_for(selector: &Selector, key: &SelectionKey) -> Ops {
	for _ in 0..50 {
		let ready = selector.poll(Some(Duration::from_millis(100))).unwrap();
		if let Some(found) = ready.iter().find(|k| *k == key) {
			return found.ready();
		}
	}
	panic!("key never became ready: {key:?}");
}

fn connected_pair(server: &ServerSocketChannel, port: u16) -> (StreamSocket, StreamSocketChannel) {
	let mut client = StreamSocket::create(Protocol::TCP4).unwrap();
	client.connect("127.0.0.1", port).unwrap();
	for _ in 0..100 {
		match server.accept().unwrap() {
			AcceptOutcome::Accepted(channel, _) => return (client, channel),
			_ => thread::sleep(Duration::from_millis(10)),
		}
	}
	panic!("no connection queued");
}

#[test]
fn accept_only_key_reports_accept() {
	let selector = open_selector();
	let (server, port) = server_channel();
	let key = server.register(&selector, Ops::ACCEPT, None).unwrap();
	assert_eq!(key.interest(), Ops::ACCEPT);

	let mut client = StreamSocket::create(Protocol::TCP4).unwrap();
	client.connect("127.0.0.1", port).unwrap();

	let ready = selector.poll(Some(Duration::from_secs(5))).unwrap();
	assert_eq!(ready.len(), 1);
	assert_eq!(ready[0], key);
	assert_eq!(ready[0].ready(), Ops::ACCEPT);
	assert!(key.is_acceptable());
	assert!(!key.is_readable() && !key.is_writable());

	let accepted = match server.accept().unwrap() {
		AcceptOutcome::Accepted(channel, _) => channel,
		other => panic!("unexpected accept outcome: {other:?}"),
	};
	assert!(accepted.socket().is_nonblocking().unwrap());

	let ready = selector.poll(Some(Duration::from_millis(50))).unwrap();
	assert!(ready.is_empty());
	assert_eq!(key.ready(), Ops::NONE);
}

#[test]
fn wakeup_before_poll_returns_immediately() {
	let selector = open_selector();
	let (server, _) = server_channel();
	server.register(&selector, Ops::ACCEPT, None).unwrap();

	selector.wakeup().unwrap();
	let start = Instant::now();
	let ready = selector.poll(Some(Duration::from_secs(10))).unwrap();
	assert!(ready.is_empty());
	assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn wakeup_from_another_thread() {
	let selector = open_selector();
	let remote = selector.clone();
	let waker = thread::spawn(move || {
		thread::sleep(Duration::from_millis(50));
		remote.wakeup().unwrap();
	});

	let start = Instant::now();
	let ready = selector.poll(None).unwrap();
	assert!(ready.is_empty());
	assert!(start.elapsed() < Duration::from_secs(5));
	waker.join().unwrap();
}

#[test]
fn closed_channel_key_is_never_reported() {
	let selector = open_selector();
	let (mut server, port) = server_channel();
	let key = server.register(&selector, Ops::ACCEPT, None).unwrap();

	let mut client = StreamSocket::create(Protocol::TCP4).unwrap();
	client.connect("127.0.0.1", port).unwrap();

	server.close().unwrap();
	assert!(!key.is_valid());
	assert!(!server.is_registered());
	assert!(selector.keys().is_empty());

	let ready = selector.poll(Some(Duration::from_millis(100))).unwrap();
	assert!(ready.iter().all(|k| *k != key));
}

#[test]
fn dropped_channel_cancels_key() {
	let selector = open_selector();
	let key = {
		let (server, _) = server_channel();
		server.register(&selector, Ops::ACCEPT, None).unwrap()
	};
	assert!(!key.is_valid());
	assert!(selector.keys().is_empty());
}

#[test]
fn nonblocking_connect_reports_connect_once() {
	let selector = open_selector();
	let (server, port) = server_channel();

	let mut stream = StreamSocketChannel::open(Protocol::TCP4).unwrap();
	let outcome = stream.connect("127.0.0.1", port).unwrap();
	let interest = match outcome {
		ConnectOutcome::InProgress => Ops::CONNECT | Ops::WRITE,
		ConnectOutcome::Connected => Ops::WRITE,
	};
	let key = stream.register(&selector, interest, None).unwrap();

	if outcome == ConnectOutcome::InProgress {
		assert!(stream.is_connecting());
		let ready = wait_for(&selector, &key);
		assert_eq!(ready, Ops::CONNECT);
		assert!(stream.finish_connect().unwrap());
		assert_eq!(key.interest(), Ops::WRITE);
	}
	assert!(stream.is_connected());

	// the next report is plain write readiness
	assert_eq!(wait_for(&selector, &key), Ops::WRITE);
	drop(server);
}

#[test]
fn failed_connect_is_reported_through_finish_connect() {
	let selector = open_selector();
	let port = {
		let (mut server, port) = server_channel();
		server.close().unwrap();
		port
	};

	let mut stream = StreamSocketChannel::open(Protocol::TCP4).unwrap();
	match stream.connect("127.0.0.1", port) {
		Ok(ConnectOutcome::InProgress) => {
			let key = stream.register(&selector, Ops::CONNECT, None).unwrap();
			assert!(wait_for(&selector, &key).contains(Ops::CONNECT));
			assert!(matches!(stream.finish_connect(), Err(NetError::Connect { .. })));
			assert_eq!(key.interest(), Ops::NONE);
		}
		Ok(ConnectOutcome::Connected) => panic!("connected to a closed port"),
		Err(err) => assert!(matches!(err, NetError::Connect { .. })),
	}
	assert!(!stream.is_connected());
}

#[test]
fn read_readiness_follows_data() {
	let selector = open_selector();
	let (server, port) = server_channel();
	let (mut client, accepted) = connected_pair(&server, port);

	let key = accepted.register(&selector, Ops::READ, None).unwrap();
	assert!(selector.poll(Some(Duration::from_millis(50))).unwrap().is_empty());

	client.send(b"abc").unwrap();
	assert_eq!(wait_for(&selector, &key), Ops::READ);

	let mut buf = [0u8; 8];
	assert_eq!(accepted.receive(&mut buf).unwrap(), IoOutcome::Done(3));
	assert!(accepted.receive(&mut buf).unwrap().is_would_block());

	client.shutdown_write().unwrap();
	assert_eq!(wait_for(&selector, &key), Ops::READ);
	assert_eq!(accepted.receive(&mut buf).unwrap(), IoOutcome::PeerClosed);
}

#[test]
fn interest_changes_take_effect() {
	let selector = open_selector();
	let (server, port) = server_channel();
	let (_client, accepted) = connected_pair(&server, port);

	let key = accepted.register(&selector, Ops::NONE, None).unwrap();
	assert!(selector.poll(Some(Duration::from_millis(50))).unwrap().is_empty());

	key.set_interest(Ops::WRITE).unwrap();
	assert_eq!(wait_for(&selector, &key), Ops::WRITE);

	key.set_interest(Ops::NONE).unwrap();
	assert!(selector.poll(Some(Duration::from_millis(50))).unwrap().is_empty());

	assert!(matches!(key.set_interest(Ops::ACCEPT), Err(NetError::InvalidInterestOps { .. })));
}

#[test]
fn datagram_channel_reads() {
	let selector = open_selector();
	let mut receiver = DatagramSocketChannel::open(Protocol::UDP4).unwrap();
	receiver.bind("127.0.0.1", 0).unwrap();
	let target = receiver.local_endpoint().unwrap();
	let key = receiver.register(&selector, Ops::READ, None).unwrap();

	let mut sender = DatagramSocketChannel::open(Protocol::UDP4).unwrap();
	sender.bind("127.0.0.1", 0).unwrap();
	sender.send_to(b"ping", &target).unwrap();

	assert_eq!(wait_for(&selector, &key), Ops::READ);
	let mut buf = [0u8; 16];
	match receiver.recv_from(&mut buf).unwrap() {
		IoOutcome::Done((n, from)) => {
			assert_eq!(&buf[..n], b"ping");
			assert_eq!(from, sender.local_endpoint().unwrap());
		}
		other => panic!("unexpected recv outcome: {other:?}"),
	}
	assert!(receiver.recv_from(&mut buf).unwrap().is_would_block());
}

#[test]
fn invalid_interest_is_rejected() {
	let selector = open_selector();
	let (server, _) = server_channel();
	let err = server.register(&selector, Ops::READ, None).unwrap_err();
	assert!(matches!(err, NetError::InvalidInterestOps { requested: 4, valid: 1 }));
	assert!(!server.is_registered());

	let datagram = DatagramSocketChannel::open(Protocol::UDP4).unwrap();
	assert!(datagram.register(&selector, Ops::CONNECT, None).is_err());
}

#[test]
fn second_selector_is_rejected() {
	let first = open_selector();
	let second = open_selector();
	let (server, _) = server_channel();

	let key = server.register(&first, Ops::ACCEPT, None).unwrap();
	assert!(matches!(server.register(&second, Ops::ACCEPT, None), Err(NetError::AlreadyRegistered)));

	let again = server.register(&first, Ops::NONE, None).unwrap();
	assert_eq!(again, key);
	assert_eq!(key.interest(), Ops::NONE);

	key.cancel();
	let moved = server.register(&second, Ops::ACCEPT, None).unwrap();
	assert_ne!(moved, key);
	assert!(moved.selector().is_some());
}

#[test]
fn keys_and_attachments() {
	let selector = open_selector();
	let (server, _) = server_channel();
	let datagram = DatagramSocketChannel::open(Protocol::UDP4).unwrap();

	let server_key = server.register(&selector, Ops::ACCEPT, Some(Arc::new(42u32))).unwrap();
	let datagram_key = datagram.register(&selector, Ops::READ, Some(Arc::new("udp"))).unwrap();

	let keys = selector.keys();
	assert_eq!(keys.len(), 2);
	assert!(keys.contains(&server_key) && keys.contains(&datagram_key));

	let attached = server_key.attachment().unwrap();
	assert_eq!(attached.downcast_ref::<u32>(), Some(&42));
	assert_eq!(server.key(), Some(server_key.clone()));

	datagram_key.cancel();
	assert!(!datagram.is_registered());
	assert_eq!(selector.keys(), vec![server_key]);
}

#[test]
fn closing_selector_invalidates_keys() {
	let selector = Selector::with_config(SelectorConfig::new().event_capacity(8));
	selector.open().unwrap();
	let (server, _) = server_channel();
	let key = server.register(&selector, Ops::ACCEPT, None).unwrap();

	selector.close();
	assert!(!key.is_valid());
	assert!(selector.keys().is_empty());
	assert!(!server.is_registered());
	assert!(matches!(selector.poll(Some(Duration::ZERO)), Err(NetError::SelectorNotOpen)));
	assert!(matches!(server.register(&selector, Ops::ACCEPT, None), Err(NetError::SelectorNotOpen)));
}

#[test]
fn dropping_selector_releases_channels() {
	let (server, _) = server_channel();
	let key = {
		let selector = open_selector();
		server.register(&selector, Ops::ACCEPT, None).unwrap()
	};
	assert!(!key.is_valid());
	assert!(key.selector().is_none());
	assert!(!server.is_registered());

	let other = open_selector();
	let fresh = server.register(&other, Ops::ACCEPT, None).unwrap();
	assert_ne!(fresh, key);
	assert!(fresh.is_valid());
}

#[test]
fn registration_during_blocked_poll_is_observed() {
	let selector = open_selector();
	let poller = {
		let selector = selector.clone();
		thread::spawn(move || {
			for _ in 0..50 {
				let ready = selector.poll(Some(Duration::from_secs(5))).unwrap();
				if !ready.is_empty() {
					return ready;
				}
			}
			Vec::new()
		})
	};

	thread::sleep(Duration::from_millis(50));
	let (server, port) = server_channel();
	let key = server.register(&selector, Ops::ACCEPT, None).unwrap();
	let mut client = StreamSocket::create(Protocol::TCP4).unwrap();
	client.connect("127.0.0.1", port).unwrap();

	let ready = poller.join().unwrap();
	let found = ready.iter().find(|k| **k == key).expect("registered key was not reported");
	assert!(found.is_acceptable());
}

#[test]
fn many_keys_with_small_event_buffer() {
	let selector = Selector::with_config(SelectorConfig::new().event_capacity(2));
	selector.open().unwrap();
	let (server, port) = server_channel();

	let mut channels = Vec::new();
	let mut clients = Vec::new();
	for _ in 0..4 {
		let (client, channel) = connected_pair(&server, port);
		channels.push(channel);
		clients.push(client);
	}
	let keys: Vec<SelectionKey> =
		channels.iter().map(|c| c.register(&selector, Ops::WRITE, None).unwrap()).collect();

	let mut seen = Vec::new();
	for _ in 0..10 {
		for key in selector.poll(Some(Duration::from_millis(100))).unwrap() {
			assert!(key.is_writable());
			if !seen.contains(&key) {
				seen.push(key);
			}
		}
		if seen.len() == keys.len() {
			break;
		}
	}
	assert_eq!(seen.len(), keys.len());
}
