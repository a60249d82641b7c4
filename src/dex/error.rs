use std::fmt;

/// Error kinds. `Malformed` marks container corruption (unknown value tags,
/// impossible structure): the file itself is bad and deeper callers cannot
/// safely continue, so it is never caught internally. Everything else is an
/// ordinary read-path failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind
{
    Truncated,
    Malformed,
    Other,
}

#[macro_export]
macro_rules! fail {
    ($msg:literal) => {
        return Err(DexError::new($msg))
    };
    (($msg:literal), ($context:literal)) => {
        return Err(DexError::with_context(DexError::new($msg), $context.to_string()))
    };
    ($fmtstr:literal, $($args:tt)*) => {
        return Err(DexError::new(&format!($fmtstr, $($args)*)))
    };
    (($fmtstr:literal, $($args:tt)*), ($context:literal)) => {
        return Err(DexError::with_context(DexError::new(&format!($fmtstr, $($args)*)), $context.to_string()))
    };
    (($fmtstr:literal, $($args:tt)*), ($contextfmt:literal, $($contextargs:tt)*)) => {
        return Err(DexError::with_context(DexError::new(&format!($fmtstr, $($args)*)), format!($contextfmt, $($contextargs)*)))
    };
}

/// Bail out with a `Malformed` error.
#[macro_export]
macro_rules! corrupt {
    ($msg:literal) => {
        return Err(DexError::malformed($msg))
    };
    ($fmtstr:literal, $($args:tt)*) => {
        return Err(DexError::malformed(&format!($fmtstr, $($args)*)))
    };
}

#[derive(Debug, PartialEq, Eq)]
pub struct DexError
{
    msg: String,
    contexts: Vec<String>,
    kind: ErrorKind,
}

impl DexError
{
    pub(crate) fn new(msg: &str) -> Self
    {
        DexError {
            msg: msg.to_string(),
            contexts: Vec::new(),
            kind: ErrorKind::Other,
        }
    }

    pub(crate) fn truncated(msg: &str) -> Self
    {
        DexError {
            msg: msg.to_string(),
            contexts: Vec::new(),
            kind: ErrorKind::Truncated,
        }
    }

    pub(crate) fn malformed(msg: &str) -> Self
    {
        DexError {
            msg: msg.to_string(),
            contexts: Vec::new(),
            kind: ErrorKind::Malformed,
        }
    }

    pub(crate) fn with_context(base: DexError, context: String) -> Self
    {
        let mut contexts = base.contexts;
        contexts.push(context);
        DexError { msg: base.msg, contexts, kind: base.kind }
    }

    pub fn kind(&self) -> ErrorKind
    {
        self.kind
    }

    /// True for the unrecoverable corruption class of errors.
    pub fn is_malformed(&self) -> bool
    {
        self.kind == ErrorKind::Malformed
    }
}

impl fmt::Display for DexError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.msg)?;
        let mut connector = " for ";
        for context in &self.contexts
        {
            write!(f, "{}{}", connector, context)?;
            connector = " of ";
        }
        Ok(())
    }
}

impl std::error::Error for DexError {}
