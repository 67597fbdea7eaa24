use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use selectlane::socket::{get_recv_timeout, set_recv_timeout};
use selectlane::{
	AcceptOutcome, Address, BufferConfig, ConnectOutcome, DatagramSocket, DatagramSocketBuilder, Endpoint,
	IoOutcome, KeepaliveConfig, NetError, Protocol, ReuseConfig, ServerSocket, ServerSocketBuilder,
	SocketHandle, SocketOptions, SocketState, StreamSocket, StreamSocketBuilder, TcpConfig, TimeoutConfig,
};

fn listener() -> (ServerSocket, u16) {
	let mut server = ServerSocket::create(Protocol::TCP4).unwrap();
	server.bind("127.0.0.1", 0).unwrap();
	server.listen(16).unwrap();
	let port = server.local_port().unwrap();
	(server, port)
}

fn accept_one(server: &ServerSocket) -> (StreamSocket, Endpoint) {
	match server.accept().unwrap() {
		AcceptOutcome::Accepted(stream, peer) => (stream, peer),
		other => panic!("unexpected accept outcome: {other:?}"),
	}
}

#[test]
fn lifecycle_edges() {
	let mut handle = SocketHandle::new();
	assert_eq!(handle.state(), SocketState::Closed);
	assert!(!handle.is_valid());

	handle.create(Protocol::TCP4).unwrap();
	assert_eq!(handle.state(), SocketState::Created);
	assert_eq!(handle.protocol(), Some(Protocol::TCP4));

	handle.bind("127.0.0.1", 0).unwrap();
	assert_eq!(handle.state(), SocketState::Created);

	handle.listen(8).unwrap();
	assert_eq!(handle.state(), SocketState::Open);
	assert!(handle.is_listening());
	assert!(!handle.is_connected());

	assert!(matches!(handle.bind("127.0.0.1", 0), Err(NetError::InvalidState { op: "bind", .. })));

	handle.close().unwrap();
	assert_eq!(handle.state(), SocketState::Closed);
	assert!(matches!(handle.listen(8), Err(NetError::InvalidState { .. })));
}

#[test]
fn listen_before_bind_leaves_state() {
	let mut handle = SocketHandle::open(Protocol::TCP4).unwrap();
	let err = handle.listen(16).unwrap_err();
	assert!(matches!(err, NetError::InvalidState { op: "listen", .. }));
	assert_eq!(handle.state(), SocketState::Created);
	assert!(handle.is_valid());
}

#[test]
fn close_twice_succeeds() {
	let mut handle = SocketHandle::open(Protocol::UDP4).unwrap();
	handle.close().unwrap();
	handle.close().unwrap();
	assert_eq!(handle.state(), SocketState::Closed);
	assert_eq!(std::os::fd::AsRawFd::as_raw_fd(&handle), -1);
}

#[test]
fn take_moves_ownership() {
	let mut source = SocketHandle::open(Protocol::TCP4).unwrap();
	let moved = source.take();
	assert_eq!(source.state(), SocketState::Closed);
	assert_eq!(moved.state(), SocketState::Created);

	let mut target = SocketHandle::new();
	target.adopt(moved);
	assert!(target.is_valid());
}

#[test]
fn typed_sockets_reject_wrong_protocol_kind() {
	assert!(matches!(
		DatagramSocket::create(Protocol::TCP4),
		Err(NetError::WrongSocketKind { expected: "datagram", .. })
	));
	assert!(matches!(
		ServerSocket::create(Protocol::UDP4),
		Err(NetError::WrongSocketKind { expected: "stream", .. })
	));
	assert!(matches!(
		StreamSocket::create(Protocol::UDP6),
		Err(NetError::WrongSocketKind { expected: "stream", .. })
	));
	assert!(StreamSocketBuilder::new(Protocol::UDP4).connect("127.0.0.1", 9).is_err());
}

#[test]
fn ephemeral_port_is_reported() {
	let (server, port) = listener();
	assert!(port > 0);
	let local = server.local_endpoint().unwrap();
	assert_eq!(local.address(), Address::LOOPBACK_V4);
	assert_eq!(local.port(), Some(port));
}

#[test]
fn bind_rejects_wrong_family() {
	let mut handle = SocketHandle::open(Protocol::TCP4).unwrap();
	let v6 = Endpoint::new(Address::LOOPBACK_V6, 0);
	assert!(matches!(handle.bind_endpoint(&v6), Err(NetError::UnsupportedFamily { .. })));
	assert!(handle.bind("::1", 0).is_err());
	assert_eq!(handle.state(), SocketState::Created);
}

#[test]
fn end_to_end_stream() {
	let mut server = SocketHandle::open(Protocol::TCP4).unwrap();
	server.bind("0.0.0.0", 0).unwrap();
	server.listen(16).unwrap();
	let port = server.local_port().unwrap();
	assert_ne!(port, 0);

	let mut client = SocketHandle::open(Protocol::TCP4).unwrap();
	assert_eq!(client.connect("127.0.0.1", port).unwrap(), ConnectOutcome::Connected);
	assert!(client.is_connected());

	let mut accepted = match server.accept().unwrap() {
		AcceptOutcome::Accepted(handle, peer) => {
			assert_eq!(peer.address(), Address::LOOPBACK_V4);
			handle
		}
		other => panic!("unexpected accept outcome: {other:?}"),
	};
	assert_eq!(accepted.state(), SocketState::Open);
	assert_eq!(server.state(), SocketState::Open);

	assert_eq!(client.send(b"hello").unwrap(), IoOutcome::Done(5));
	let mut buf = [0u8; 16];
	let mut received = 0;
	while received < 5 {
		match accepted.receive(&mut buf[received..]).unwrap() {
			IoOutcome::Done(n) => received += n,
			other => panic!("unexpected receive outcome: {other:?}"),
		}
	}
	assert_eq!(&buf[..5], b"hello");

	client.shutdown_write().unwrap();
	assert!(client.is_write_shutdown());
	client.shutdown_write().unwrap();
	assert_eq!(accepted.receive(&mut buf).unwrap(), IoOutcome::PeerClosed);
	assert!(matches!(
		accepted.receive(&mut buf).unwrap().into_result(),
		Err(NetError::ConnectionClosedByPeer)
	));

	accepted.close().unwrap();
	client.close().unwrap();
	server.close().unwrap();
}

#[test]
fn stream_endpoints_match() {
	let (server, port) = listener();
	let mut client = StreamSocket::create(Protocol::TCP4).unwrap();
	client.connect("127.0.0.1", port).unwrap();
	let (accepted, peer) = accept_one(&server);

	assert_eq!(client.remote_endpoint().unwrap().port(), Some(port));
	assert_eq!(accepted.remote_endpoint().unwrap(), peer);
	assert_eq!(client.local_endpoint().unwrap(), peer);
	assert!(accepted.is_connected());
}

#[test]
fn stream_implements_std_io() {
	let (server, port) = listener();
	let writer = thread::spawn(move || {
		let mut client = StreamSocket::create(Protocol::TCP4).unwrap();
		client.connect("127.0.0.1", port).unwrap();
		client.write_all(b"ping pong").unwrap();
		client.shutdown_write().unwrap();
	});

	let (mut accepted, _) = accept_one(&server);
	let mut text = String::new();
	accepted.read_to_string(&mut text).unwrap();
	assert_eq!(text, "ping pong");
	writer.join().unwrap();
}

#[test]
fn nonblocking_receive_would_block() {
	let (server, port) = listener();
	let mut client = StreamSocket::create(Protocol::TCP4).unwrap();
	client.connect("127.0.0.1", port).unwrap();
	let (accepted, _) = accept_one(&server);

	accepted.set_nonblocking(true).unwrap();
	assert!(accepted.is_nonblocking().unwrap());
	let mut buf = [0u8; 8];
	assert!(accepted.receive(&mut buf).unwrap().is_would_block());
	assert_eq!(accepted.receive(&mut buf).unwrap().into_result().unwrap(), None);

	server.set_nonblocking(true).unwrap();
	assert!(matches!(server.accept().unwrap(), AcceptOutcome::WouldBlock));
}

#[test]
fn connect_refused_returns_to_created() {
	let port = {
		let (mut server, port) = listener();
		server.close().unwrap();
		port
	};
	let mut client = StreamSocket::create(Protocol::TCP4).unwrap();
	let err = client.connect("127.0.0.1", port).unwrap_err();
	assert!(matches!(err, NetError::Connect { errno, .. } if errno == libc::ECONNREFUSED));
	assert_eq!(client.state(), SocketState::Created);
}

#[test]
fn datagram_round_trip() {
	let mut receiver = DatagramSocket::create(Protocol::UDP4).unwrap();
	receiver.bind("127.0.0.1", 0).unwrap();
	let target = receiver.local_endpoint().unwrap();

	let mut sender = DatagramSocket::create(Protocol::UDP4).unwrap();
	sender.bind("127.0.0.1", 0).unwrap();
	assert_eq!(sender.send_to(b"datagram", &target).unwrap(), IoOutcome::Done(8));

	let mut buf = [0u8; 64];
	match receiver.recv_from(&mut buf).unwrap() {
		IoOutcome::Done((n, from)) => {
			assert_eq!(&buf[..n], b"datagram");
			assert_eq!(from, sender.local_endpoint().unwrap());
		}
		other => panic!("unexpected recv outcome: {other:?}"),
	}
}

#[test]
fn option_round_trips() {
	let stream = StreamSocket::create(Protocol::TCP4).unwrap();
	assert_eq!(stream.recv_timeout().unwrap(), 0);
	assert_eq!(stream.send_timeout().unwrap(), 0);
	assert_eq!(stream.linger().unwrap(), None);

	// Whole seconds survive the kernel's tick rounding.
	stream.set_recv_timeout(2000).unwrap();
	assert_eq!(stream.recv_timeout().unwrap(), 2000);
	set_recv_timeout(&stream, 0).unwrap();
	assert_eq!(get_recv_timeout(&stream).unwrap(), 0);
	stream.set_send_timeout(1000).unwrap();
	assert_eq!(stream.send_timeout().unwrap(), 1000);

	stream.set_linger(Some(5)).unwrap();
	assert_eq!(stream.linger().unwrap(), Some(5));
	stream.set_linger(None).unwrap();
	assert_eq!(stream.linger().unwrap(), None);

	stream.set_tcp_nodelay(true).unwrap();
	assert!(stream.tcp_nodelay().unwrap());
	stream.set_keepalive(true).unwrap();
	assert!(stream.keepalive().unwrap());
	stream.set_reuse_addr(true).unwrap();
	assert!(stream.reuse_addr().unwrap());

	stream.set_recv_buffer_size(64 * 1024).unwrap();
	assert!(stream.recv_buffer_size().unwrap() >= 64 * 1024);
	assert_eq!(stream.take_error().unwrap(), None);
}

#[test]
fn builders_apply_configuration() {
	let server = ServerSocketBuilder::new(Protocol::TCP4)
		.reuse(ReuseConfig::new().addr(true))
		.tcp(TcpConfig::new().keepalive(KeepaliveConfig::new().idle(30).interval(5).count(3)))
		.buffers(BufferConfig::new().recv(32 * 1024))
		.backlog(32)
		.bind("127.0.0.1", 0)
		.unwrap();
	assert_eq!(server.state(), SocketState::Open);
	assert!(server.reuse_addr().unwrap());
	assert!(server.keepalive().unwrap());
	let port = server.local_port().unwrap();

	let client = StreamSocketBuilder::new(Protocol::TCP4)
		.tcp(TcpConfig::new().linger(Some(1)))
		.timeouts(TimeoutConfig::new().recv(2_000))
		.connect("127.0.0.1", port)
		.unwrap();
	assert!(client.is_connected());
	assert!(client.tcp_nodelay().unwrap());
	assert_eq!(client.linger().unwrap(), Some(1));
	assert_eq!(client.recv_timeout().unwrap(), 2_000);

	let datagram = DatagramSocketBuilder::new(Protocol::UDP4)
		.timeouts(TimeoutConfig::new().send(1_000))
		.bind("127.0.0.1", 0)
		.unwrap();
	assert!(datagram.local_port().unwrap() > 0);
	assert_eq!(datagram.send_timeout().unwrap(), 1_000);
}

#[test]
fn blocking_accept_from_thread() {
	let (server, port) = listener();
	let client = thread::spawn(move || {
		thread::sleep(Duration::from_millis(20));
		let mut client = StreamSocket::create(Protocol::TCP4).unwrap();
		client.connect("127.0.0.1", port).unwrap();
		client.send(b"x").unwrap();
	});
	let (accepted, _) = accept_one(&server);
	let mut buf = [0u8; 1];
	assert_eq!(accepted.receive(&mut buf).unwrap(), IoOutcome::Done(1));
	client.join().unwrap();
}
