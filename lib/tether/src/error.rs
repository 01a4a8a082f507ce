use crate::wire::FieldId;
use std::io;
use std::net;

pub type LinkResult<T> = Result<T, LinkError>;

/// Errors surfaced by the link core. `Wait` is the transient case (timeout,
/// no data yet); everything else is a real failure.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LinkError {
    Wait,
    /// The operation is not available for this link role.
    Unsupported(&'static str),
    /// A frame references a field that has never been written.
    MissingField(FieldId),
    AddrParse,
    Io(io::ErrorKind),
}

impl From<io::Error> for LinkError {
    #[inline]
    fn from(io_error: io::Error) -> Self {
        match io_error.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => LinkError::Wait,
            kind => LinkError::Io(kind),
        }
    }
}

impl From<net::AddrParseError> for LinkError {
    #[inline]
    fn from(_: net::AddrParseError) -> Self {
        LinkError::AddrParse
    }
}

pub trait ErrorUtils {
    fn has_failed(&self) -> bool;
}

impl<T> ErrorUtils for LinkResult<T> {
    fn has_failed(&self) -> bool {
        match self {
            Ok(_) => false,
            Err(LinkError::Wait) => false,
            Err(_) => true,
        }
    }
}
