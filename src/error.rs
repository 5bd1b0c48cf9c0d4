use thiserror::Error;

/// Errors reported by the engine and the checker.
///
/// Every operation either succeeds or returns exactly one of these; there
/// are no partial-success states. A violated internal invariant (say, a
/// read walking off the end of a chain) is not an error but a panic: the
/// volume is in an undefined state at that point.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("no volume is mounted")]
    NotMounted,
    #[error("a volume is already mounted")]
    AlreadyMounted,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("size exceeds what the format can represent")]
    TooLarge,
    #[error("file name too long")]
    NameTooLong,
    #[error("no space left on volume")]
    NoSpace,
    #[error("too many open files")]
    TooManyOpenFiles,
    #[error("bad file descriptor")]
    BadDescriptor,
    #[error("no such file")]
    NoEntry,
    #[error("resource busy")]
    Busy,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FsError>;
