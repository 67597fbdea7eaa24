pub mod socket;
mod addr;
mod channel;
mod error;
mod protocol;
mod selector;
mod sync;

pub use self::error::{ErrorInfo, NetError, Result, errno};
pub use self::addr::{Address, Endpoint, Family, SockAddr, local_interfaces, resolve_name};
pub use self::protocol::{Protocol, SockKind};
pub use self::socket::{AcceptOutcome, ConnectOutcome, IoOutcome, SocketState, SocketHandle,
					   ServerSocket, StreamSocket, DatagramSocket, SocketOptions,
					   ServerSocketBuilder, StreamSocketBuilder, DatagramSocketBuilder,
					   BufferConfig, ReuseConfig, TcpConfig, KeepaliveConfig, TimeoutConfig};
pub use self::channel::{SelectableChannel, ServerSocketChannel, StreamSocketChannel,
						DatagramSocketChannel};
pub use self::selector::{Attachment, Ops, SelectionKey, Selector, SelectorConfig};
