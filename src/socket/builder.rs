//! Option bundles applied to a fresh socket before it binds or connects.
//!
//! Each bundle is a plain `Copy` value with chained setters. Builders
//! collect the bundles into one [`SetupOptions`] and apply it to the
//! socket right after `create`, so a failing option never leaves a bound
//! or connected descriptor behind.

use super::{DatagramSocket, ServerSocket, SocketOptions, StreamSocket};
use crate::addr::Endpoint;
use crate::error::Result;
use crate::protocol::Protocol;

/// Kernel send/receive buffer sizes. Unset sizes keep the OS default.
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferConfig {
	pub recv: Option<usize>,
	pub send: Option<usize>,
}

impl BufferConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn recv(self, size: usize) -> Self {
		Self { recv: Some(size), ..self }
	}

	pub fn send(self, size: usize) -> Self {
		Self { send: Some(size), ..self }
	}

	pub fn both(self, size: usize) -> Self {
		Self { recv: Some(size), send: Some(size) }
	}
}

/// `SO_REUSEADDR` / `SO_REUSEPORT`. Only enabled flags are written.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReuseConfig {
	pub addr: bool,
	pub port: bool,
}

impl ReuseConfig {
	/// Address reuse on, port reuse off; the usual listener setting.
	pub fn new() -> Self {
		Self { addr: true, port: false }
	}

	pub fn addr(self, enable: bool) -> Self {
		Self { addr: enable, ..self }
	}

	pub fn port(self, enable: bool) -> Self {
		Self { port: enable, ..self }
	}

	/// Lets several listeners share one port.
	pub fn both(self) -> Self {
		Self { addr: true, port: true }
	}
}

/// Stream-level options.
#[derive(Debug, Clone, Copy)]
pub struct TcpConfig {
	pub nodelay: bool,
	pub keepalive: Option<KeepaliveConfig>,
	/// `Some(None)` turns lingering off explicitly; `None` leaves it alone.
	pub linger: Option<Option<u32>>,
}

impl Default for TcpConfig {
	fn default() -> Self {
		Self { nodelay: true, keepalive: None, linger: None }
	}
}

impl TcpConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn nodelay(self, enable: bool) -> Self {
		Self { nodelay: enable, ..self }
	}

	pub fn keepalive(self, keepalive: KeepaliveConfig) -> Self {
		Self { keepalive: Some(keepalive), ..self }
	}

	pub fn linger(self, seconds: Option<u32>) -> Self {
		Self { linger: Some(seconds), ..self }
	}
}

/// Keep-alive probe timing. The timings only reach the kernel on Linux
/// and Android; elsewhere enabling keep-alive sets `SO_KEEPALIVE` alone.
#[derive(Debug, Clone, Copy)]
pub struct KeepaliveConfig {
	pub idle_secs: u32,
	pub interval_secs: u32,
	pub count: u32,
}

impl Default for KeepaliveConfig {
	fn default() -> Self {
		Self { idle_secs: 60, interval_secs: 10, count: 5 }
	}
}

impl KeepaliveConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn idle(self, secs: u32) -> Self {
		Self { idle_secs: secs, ..self }
	}

	pub fn interval(self, secs: u32) -> Self {
		Self { interval_secs: secs, ..self }
	}

	pub fn count(self, count: u32) -> Self {
		Self { count, ..self }
	}

	#[cfg(any(target_os = "linux", target_os = "android"))]
	fn write_timings<S: SocketOptions>(&self, socket: &S) -> Result<()> {
		super::set_keepalive_idle(socket, self.idle_secs)?;
		super::set_keepalive_interval(socket, self.interval_secs)?;
		super::set_keepalive_count(socket, self.count)
	}

	#[cfg(not(any(target_os = "linux", target_os = "android")))]
	fn write_timings<S: SocketOptions>(&self, _socket: &S) -> Result<()> {
		Ok(())
	}
}

/// Receive/send timeouts in whole milliseconds; 0 means block forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutConfig {
	pub recv_millis: Option<u64>,
	pub send_millis: Option<u64>,
}

impl TimeoutConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn recv(self, millis: u64) -> Self {
		Self { recv_millis: Some(millis), ..self }
	}

	pub fn send(self, millis: u64) -> Self {
		Self { send_millis: Some(millis), ..self }
	}
}

/// Everything a builder writes to a new descriptor.
#[derive(Debug, Clone, Copy, Default)]
struct SetupOptions {
	reuse: Option<ReuseConfig>,
	tcp: Option<TcpConfig>,
	buffers: BufferConfig,
	timeouts: TimeoutConfig,
	nonblocking: bool,
}

impl SetupOptions {
	fn apply<S: SocketOptions>(&self, socket: &S) -> Result<()> {
		if let Some(reuse) = self.reuse {
			if reuse.addr {
				socket.set_reuse_addr(true)?;
			}
			if reuse.port {
				socket.set_reuse_port(true)?;
			}
		}

		if let Some(tcp) = self.tcp {
			if tcp.nodelay {
				socket.set_tcp_nodelay(true)?;
			}
			if let Some(keepalive) = tcp.keepalive {
				socket.set_keepalive(true)?;
				keepalive.write_timings(socket)?;
			}
			if let Some(linger) = tcp.linger {
				socket.set_linger(linger)?;
			}
		}

		if let Some(size) = self.buffers.recv {
			socket.set_recv_buffer_size(size)?;
		}
		if let Some(size) = self.buffers.send {
			socket.set_send_buffer_size(size)?;
		}
		if let Some(millis) = self.timeouts.recv_millis {
			socket.set_recv_timeout(millis)?;
		}
		if let Some(millis) = self.timeouts.send_millis {
			socket.set_send_timeout(millis)?;
		}
		Ok(())
	}
}

/// Builds a listening [`ServerSocket`].
///
/// ```ignore
/// use selectlane::{KeepaliveConfig, Protocol, ReuseConfig, ServerSocketBuilder, TcpConfig};
///
/// let server = ServerSocketBuilder::new(Protocol::TCP4)
///     .reuse(ReuseConfig::new().both())
///     .tcp(TcpConfig::new().keepalive(KeepaliveConfig::new().idle(60)))
///     .backlog(1024)
///     .bind("0.0.0.0", 8080)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ServerSocketBuilder {
	protocol: Protocol,
	options: SetupOptions,
	backlog: i32,
}

impl ServerSocketBuilder {
	/// Defaults: address reuse on, `TCP_NODELAY` on, backlog 128, blocking.
	pub fn new(protocol: Protocol) -> Self {
		let options = SetupOptions {
			reuse: Some(ReuseConfig::new()),
			tcp: Some(TcpConfig::default()),
			..SetupOptions::default()
		};
		Self { protocol, options, backlog: 128 }
	}

	pub fn reuse(mut self, reuse: ReuseConfig) -> Self {
		self.options.reuse = Some(reuse);
		self
	}

	/// Stream options; most platforms copy them onto accepted sockets.
	pub fn tcp(mut self, tcp: TcpConfig) -> Self {
		self.options.tcp = Some(tcp);
		self
	}

	pub fn buffers(mut self, buffers: BufferConfig) -> Self {
		self.options.buffers = buffers;
		self
	}

	pub fn backlog(mut self, backlog: i32) -> Self {
		self.backlog = backlog;
		self
	}

	pub fn nonblocking(mut self, enable: bool) -> Self {
		self.options.nonblocking = enable;
		self
	}

	/// Resolves `host`, then binds and listens.
	pub fn bind(self, host: &str, port: u16) -> Result<ServerSocket> {
		let mut server = self.prepare()?;
		server.bind(host, port)?;
		server.listen(self.backlog)?;
		Ok(server)
	}

	pub fn bind_endpoint(self, endpoint: &Endpoint) -> Result<ServerSocket> {
		let mut server = self.prepare()?;
		server.bind_endpoint(endpoint)?;
		server.listen(self.backlog)?;
		Ok(server)
	}

	fn prepare(&self) -> Result<ServerSocket> {
		let server = ServerSocket::create(self.protocol)?;
		self.options.apply(&server)?;
		if self.options.nonblocking {
			server.set_nonblocking(true)?;
		}
		Ok(server)
	}
}

/// Builds an outgoing [`StreamSocket`].
///
/// ```ignore
/// use selectlane::{Protocol, StreamSocketBuilder, TcpConfig, TimeoutConfig};
///
/// let conn = StreamSocketBuilder::new(Protocol::TCP4)
///     .tcp(TcpConfig::new().linger(Some(5)))
///     .timeouts(TimeoutConfig::new().recv(2_000))
///     .connect("127.0.0.1", 8080)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct StreamSocketBuilder {
	protocol: Protocol,
	options: SetupOptions,
}

impl StreamSocketBuilder {
	/// Defaults: `TCP_NODELAY` on.
	pub fn new(protocol: Protocol) -> Self {
		let options = SetupOptions { tcp: Some(TcpConfig::default()), ..SetupOptions::default() };
		Self { protocol, options }
	}

	pub fn tcp(mut self, tcp: TcpConfig) -> Self {
		self.options.tcp = Some(tcp);
		self
	}

	pub fn buffers(mut self, buffers: BufferConfig) -> Self {
		self.options.buffers = buffers;
		self
	}

	pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
		self.options.timeouts = timeouts;
		self
	}

	/// A configured, still unconnected socket.
	pub fn build(self) -> Result<StreamSocket> {
		let stream = StreamSocket::create(self.protocol)?;
		self.options.apply(&stream)?;
		Ok(stream)
	}

	/// Builds, then connects in blocking mode.
	pub fn connect(self, host: &str, port: u16) -> Result<StreamSocket> {
		let mut stream = self.build()?;
		stream.connect(host, port)?;
		Ok(stream)
	}
}

/// Builds a bound [`DatagramSocket`].
///
/// ```ignore
/// use selectlane::{BufferConfig, DatagramSocketBuilder, Protocol};
///
/// let socket = DatagramSocketBuilder::new(Protocol::UDP4)
///     .buffers(BufferConfig::new().recv(1 << 20))
///     .bind("0.0.0.0", 5353)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DatagramSocketBuilder {
	protocol: Protocol,
	options: SetupOptions,
}

impl DatagramSocketBuilder {
	/// Defaults: no reuse flags, OS buffer sizes, no timeouts.
	pub fn new(protocol: Protocol) -> Self {
		Self { protocol, options: SetupOptions::default() }
	}

	pub fn reuse(mut self, reuse: ReuseConfig) -> Self {
		self.options.reuse = Some(reuse);
		self
	}

	pub fn buffers(mut self, buffers: BufferConfig) -> Self {
		self.options.buffers = buffers;
		self
	}

	pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
		self.options.timeouts = timeouts;
		self
	}

	pub fn bind(self, host: &str, port: u16) -> Result<DatagramSocket> {
		let mut socket = DatagramSocket::create(self.protocol)?;
		self.options.apply(&socket)?;
		socket.bind(host, port)?;
		Ok(socket)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn setters_keep_other_fields() {
		let buffers = BufferConfig::new().recv(4096).send(8192);
		assert_eq!((buffers.recv, buffers.send), (Some(4096), Some(8192)));

		let reuse = ReuseConfig::new().port(true);
		assert!(reuse.addr && reuse.port);
		assert!(!ReuseConfig::default().addr);

		let tcp = TcpConfig::new().linger(None).nodelay(false);
		assert_eq!(tcp.linger, Some(None));
		assert!(!tcp.nodelay);

		let keepalive = KeepaliveConfig::new().interval(3);
		assert_eq!((keepalive.idle_secs, keepalive.interval_secs, keepalive.count), (60, 3, 5));
	}

	#[test]
	fn builder_defaults() {
		let server = ServerSocketBuilder::new(Protocol::TCP4);
		assert_eq!(server.backlog, 128);
		assert!(server.options.reuse.is_some_and(|r| r.addr && !r.port));
		assert!(server.options.tcp.is_some_and(|t| t.nodelay));

		let datagram = DatagramSocketBuilder::new(Protocol::UDP4);
		assert!(datagram.options.reuse.is_none());
		assert!(datagram.options.tcp.is_none());
	}
}
