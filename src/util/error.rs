use std::fmt;

#[derive(Debug)]
pub struct Error(Repr);

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    // A labeled node is missing its companion metadata, or an id is out
    // of range. Callers treat this as a precondition violation.
    Elaboration,
    // A semantic fault while running a term (misapplied partial
    // function, bad projection). Recoverable during example collection.
    Eval,
    // No candidate up to the grammar size limit satisfies the examples.
    Exhausted,
    Timeout,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match &self.0 {
            Repr::Simple(c) => *c,
            Repr::SimpleMessage(c, _) => *c,
            Repr::Message(c, _) => *c,
        }
    }

    pub fn new_const(kind: ErrorKind, message: &'static str) -> Self {
        Error(Repr::SimpleMessage(kind, message))
    }

    pub fn with_message(kind: ErrorKind, message: String) -> Self {
        Error(Repr::Message(kind, message))
    }
}

impl From<ErrorKind> for Error {
    fn from(e: ErrorKind) -> Self {
        Error(Repr::Simple(e))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Simple(k) => write!(f, "{:?}", k),
            Repr::SimpleMessage(k, m) => write!(f, "{:?}: {}", k, m),
            Repr::Message(k, m) => write!(f, "{:?}: {}", k, m),
        }
    }
}

impl std::error::Error for Error {}

#[derive(Debug)]
enum Repr {
    Simple(ErrorKind),
    SimpleMessage(ErrorKind, &'static str),
    Message(ErrorKind, String),
}
