use std::error;
use std::fmt;




#[derive(Clone, Debug, PartialEq)]

/**
 * Error type for every fallible operation on box arrays, distribution
 * mappings, fab arrays and their iterators.
 */
pub enum Error {
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    InvalidArgument(String),
    NotDefined,
    InvalidState(&'static str),
    IncompatibleLayout,
    IteratorExhausted,
    CommunicationFailure(String),
}




/**
 * Result alias used throughout the crate.
 */
pub type Result<T> = core::result::Result<T, Error>;




// ============================================================================
impl Error {

    pub(crate) fn out_of_range(what: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { what, index, len }
    }

    pub(crate) fn invalid<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn comm<S: Into<String>>(message: S) -> Self {
        Self::CommunicationFailure(message.into())
    }

    /**
     * Whether this error is the normal end-of-sequence signal from an
     * iterator, rather than a true failure.
     */
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::IteratorExhausted)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;

        match self {
            IndexOutOfRange { what, index, len } => write!(fmt, "{} index {} out of range (size {})", what, index, len),
            InvalidArgument(message) => write!(fmt, "invalid argument: {}", message),
            NotDefined => write!(fmt, "container used before define"),
            InvalidState(message) => write!(fmt, "invalid state: {}", message),
            IncompatibleLayout => write!(fmt, "operands have incompatible box layouts"),
            IteratorExhausted => write!(fmt, "iterator exhausted"),
            CommunicationFailure(message) => write!(fmt, "communication failure: {}", message),
        }
    }
}

impl error::Error for Error {}




// ============================================================================
#[cfg(test)]
mod test {

    use super::Error;

    #[test]
    fn errors_format_their_payload() {
        let e = Error::out_of_range("box", 7, 4);
        assert_eq!(e.to_string(), "box index 7 out of range (size 4)");
        assert!(Error::IteratorExhausted.is_exhausted());
        assert!(!Error::NotDefined.is_exhausted());
    }
}
