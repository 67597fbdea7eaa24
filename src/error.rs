use std::collections::VecDeque;
use std::fmt;

/// Errors produced by addresses, sockets, channels and selectors.
///
/// Every variant that originates in a syscall carries the raw `errno`
/// captured immediately after the failing call.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("invalid {family} address: {input:?}")]
    InvalidAddressFormat { input: String, family: &'static str },

    #[error("invalid endpoint {input:?}: {reason}")]
    InvalidEndpoint { input: String, reason: &'static str },

    #[error("cannot resolve {host:?}: {message} (code {code})")]
    Resolution { host: String, code: i32, message: String },

    #[error("address family {family} is not supported here")]
    UnsupportedFamily { family: &'static str },

    #[error("{protocol} is not a {expected} protocol")]
    WrongSocketKind { protocol: String, expected: &'static str },

    #[error("socket({protocol}) failed: {}", errno_to_str(*.errno))]
    SocketCreate { errno: i32, protocol: String },

    #[error("bind({endpoint}) failed: {}", errno_to_str(*.errno))]
    Bind { errno: i32, endpoint: String },

    #[error("listen(backlog={backlog}) failed: {}", errno_to_str(*.errno))]
    Listen { errno: i32, backlog: i32 },

    #[error("accept() failed: {}", errno_to_str(*.errno))]
    Accept { errno: i32 },

    #[error("connect({endpoint}) failed: {}", errno_to_str(*.errno))]
    Connect { errno: i32, endpoint: String },

    #[error("{op}() failed: {}", errno_to_str(*.errno))]
    Io { errno: i32, op: &'static str },

    #[error("connection closed by peer")]
    ConnectionClosedByPeer,

    #[error("setsockopt({option}) failed: {}", errno_to_str(*.errno))]
    SetOption { errno: i32, option: &'static str },

    #[error("getsockopt({option}) failed: {}", errno_to_str(*.errno))]
    GetOption { errno: i32, option: &'static str },

    #[error("close() failed: {}", errno_to_str(*.errno))]
    Close { errno: i32 },

    #[error("{op} is not valid while the socket is {state}")]
    InvalidState { op: &'static str, state: &'static str },

    #[error("interest ops {requested:#06b} not within valid ops {valid:#06b}")]
    InvalidInterestOps { requested: u32, valid: u32 },

    #[error("channel is already registered with another selector")]
    AlreadyRegistered,

    #[error("selector is not open")]
    SelectorNotOpen,

    #[error("{op}() failed: {}", errno_to_str(*.errno))]
    Selector { errno: i32, op: &'static str },
}

pub type Result<T> = std::result::Result<T, NetError>;

impl NetError {
    /// Returns the OS error code, if this error came from a syscall.
    pub fn errno(&self) -> Option<i32> {
        match self {
            NetError::SocketCreate { errno, .. }
            | NetError::Bind { errno, .. }
            | NetError::Listen { errno, .. }
            | NetError::Accept { errno }
            | NetError::Connect { errno, .. }
            | NetError::Io { errno, .. }
            | NetError::SetOption { errno, .. }
            | NetError::GetOption { errno, .. }
            | NetError::Close { errno }
            | NetError::Selector { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// Names the call that produced the error.
    pub fn hint(&self) -> &'static str {
        match self {
            NetError::InvalidAddressFormat { .. } => "Address::parse",
            NetError::InvalidEndpoint { .. } => "Endpoint::parse",
            NetError::Resolution { .. } => "getaddrinfo",
            NetError::UnsupportedFamily { .. } => "Address::resolve",
            NetError::WrongSocketKind { .. } => "create",
            NetError::SocketCreate { .. } => "socket",
            NetError::Bind { .. } => "bind",
            NetError::Listen { .. } => "listen",
            NetError::Accept { .. } => "accept",
            NetError::Connect { .. } => "connect",
            NetError::Io { op, .. } => *op,
            NetError::ConnectionClosedByPeer => "recv",
            NetError::SetOption { .. } => "setsockopt",
            NetError::GetOption { .. } => "getsockopt",
            NetError::Close { .. } => "close",
            NetError::InvalidState { op, .. } => *op,
            NetError::InvalidInterestOps { .. } => "register",
            NetError::AlreadyRegistered => "register",
            NetError::SelectorNotOpen => "Selector",
            NetError::Selector { op, .. } => *op,
        }
    }
}

/// Returns current errno value.
#[inline]
pub fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Converts errno to human-readable string.
pub(crate) fn errno_to_str(errno: i32) -> String {
    match errno {
        libc::EACCES => "permission denied".into(),
        libc::EADDRINUSE => "address already in use".into(),
        libc::EADDRNOTAVAIL => "address not available".into(),
        libc::EAFNOSUPPORT => "address family not supported".into(),
        libc::EAGAIN => "resource temporarily unavailable".into(),
        libc::EBADF => "bad file descriptor".into(),
        libc::ECONNREFUSED => "connection refused".into(),
        libc::ECONNRESET => "connection reset by peer".into(),
        libc::EINPROGRESS => "operation in progress".into(),
        libc::EINTR => "interrupted by signal".into(),
        libc::EINVAL => "invalid argument".into(),
        libc::EMFILE => "too many open files".into(),
        libc::ENETUNREACH => "network unreachable".into(),
        libc::ENOBUFS => "no buffer space available".into(),
        libc::ENOTCONN => "not connected".into(),
        libc::EPIPE => "broken pipe".into(),
        libc::ETIMEDOUT => "connection timed out".into(),
        _ => std::io::Error::from_raw_os_error(errno).to_string(),
    }
}

/// Maps errno to std::io::ErrorKind.
fn errno_to_kind(errno: i32) -> std::io::ErrorKind {
    match errno {
        libc::EACCES | libc::EPERM => std::io::ErrorKind::PermissionDenied,
        libc::EADDRINUSE => std::io::ErrorKind::AddrInUse,
        libc::EADDRNOTAVAIL => std::io::ErrorKind::AddrNotAvailable,
        libc::EAGAIN => std::io::ErrorKind::WouldBlock,
        libc::ECONNREFUSED => std::io::ErrorKind::ConnectionRefused,
        libc::ECONNRESET => std::io::ErrorKind::ConnectionReset,
        libc::EINTR => std::io::ErrorKind::Interrupted,
        libc::EINVAL => std::io::ErrorKind::InvalidInput,
        libc::ENOTCONN => std::io::ErrorKind::NotConnected,
        libc::EPIPE => std::io::ErrorKind::BrokenPipe,
        libc::ETIMEDOUT => std::io::ErrorKind::TimedOut,
        _ => std::io::ErrorKind::Other,
    }
}

impl From<NetError> for std::io::Error {
    fn from(err: NetError) -> Self {
        let kind = match &err {
            NetError::InvalidAddressFormat { .. }
            | NetError::InvalidEndpoint { .. }
            | NetError::InvalidInterestOps { .. } => std::io::ErrorKind::InvalidInput,
            NetError::Resolution { .. } => std::io::ErrorKind::NotFound,
            NetError::UnsupportedFamily { .. } | NetError::WrongSocketKind { .. } => {
                std::io::ErrorKind::Unsupported
            }
            NetError::ConnectionClosedByPeer => std::io::ErrorKind::UnexpectedEof,
            NetError::InvalidState { .. } | NetError::AlreadyRegistered | NetError::SelectorNotOpen => {
                std::io::ErrorKind::Other
            }
            other => other.errno().map_or(std::io::ErrorKind::Other, errno_to_kind),
        };
        std::io::Error::new(kind, err)
    }
}

/// Structured error context: a numeric code, a message, the call that
/// produced it and an ordered stack of causal frames (outermost last).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    code: i32,
    message: String,
    hint: Option<String>,
    stack: VecDeque<String>,
}

impl ErrorInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn stack(&self) -> impl Iterator<Item = &str> {
        self.stack.iter().map(String::as_str)
    }

    pub fn is_set(&self) -> bool {
        self.code != 0 || !self.message.is_empty()
    }

    /// Records a new error; the message also becomes the first stack frame.
    pub fn set(&mut self, code: i32, message: impl Into<String>, hint: impl Into<String>) {
        self.code = code;
        self.message = message.into();
        self.hint = Some(hint.into());
        self.stack.push_back(self.message.clone());
    }

    /// Appends a causal frame.
    pub fn push(&mut self, frame: impl Into<String>) {
        self.stack.push_back(frame.into());
    }

    /// Takes over `other`'s code, message and hint; its frames go in front
    /// of ours. `other` is left cleared.
    pub fn merge(&mut self, other: &mut ErrorInfo) {
        self.code = std::mem::take(&mut other.code);
        self.message = std::mem::take(&mut other.message);
        self.hint = other.hint.take();
        let mut frames = std::mem::take(&mut other.stack);
        frames.append(&mut self.stack);
        self.stack = frames;
    }

    pub fn clear(&mut self) {
        self.code = 0;
        self.message.clear();
        self.hint = None;
        self.stack.clear();
    }
}

impl From<&NetError> for ErrorInfo {
    fn from(err: &NetError) -> Self {
        let mut info = ErrorInfo::new();
        info.set(err.errno().unwrap_or(-1), err.to_string(), err.hint());
        info
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error code: {}, message: {}", self.code, self.message)?;
        if let Some(hint) = &self.hint {
            writeln!(f, "hint: {}", hint)?;
        }
        writeln!(f, "stack:")?;
        for frame in &self.stack {
            writeln!(f, "  > {}", frame)?;
        }
        Ok(())
    }
}
