use snafu::Snafu;

/// The public Error type for this library.
#[derive(Debug, Snafu)]
pub struct Error(LibError);

/// The public Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// The internal Result type for this library.
pub(crate) type LibResult<T> = std::result::Result<T, LibError>;

/// The category of a failure. Callers dispatch on this instead of on the
/// internal error structure, which is free to change.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// A port, channel, note or id was out of range, or a port was not in the
    /// required open/closed state.
    BadArgument,
    /// A sequenced submission or time query was made while the sequencer was
    /// stopped.
    NotRunning,
    /// A MIDI or WAV file was malformed, or used an unsupported format.
    InvalidFile,
    /// A load targeted an id that already holds content.
    SlotInUse,
    /// An operation targeted an id with nothing loaded.
    NoSlot,
    /// The MIDI or PCM driver reported an unrecoverable failure.
    OutputDevice,
    /// The scheduler timer channel failed to arm or fire.
    TimerFault,
    /// An event record or worker thread could not be allocated.
    ResourceExhausted,
    /// An operating system level read failure.
    Io,
}

impl Error {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match &self.0 {
            LibError::Io { .. } => ErrorKind::Io,
            LibError::BadArgument { .. } => ErrorKind::BadArgument,
            LibError::NotRunning { .. } => ErrorKind::NotRunning,
            LibError::InvalidFile { .. } => ErrorKind::InvalidFile,
            LibError::SlotInUse { .. } => ErrorKind::SlotInUse,
            LibError::NoSlot { .. } => ErrorKind::NoSlot,
            LibError::OutputDevice { .. } => ErrorKind::OutputDevice,
            LibError::TimerFault { .. } => ErrorKind::TimerFault,
            LibError::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
        }
    }
}

/// The internal Error type for this library.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum LibError {
    #[snafu(display("Error while reading bytes: {}", source))]
    Io {
        site: String,
        source: crate::byte_iter::ByteError,
    },

    #[snafu(display("{}: Bad argument: {}", site, description))]
    BadArgument { site: String, description: String },

    #[snafu(display("{}: The sequencer is not running", site))]
    NotRunning { site: String },

    #[snafu(display("{}: The file is invalid: {}", site, description))]
    InvalidFile { site: String, description: String },

    #[snafu(display("{}: Content is already loaded for id {}", site, id))]
    SlotInUse { site: String, id: usize },

    #[snafu(display("{}: No content is loaded for id {}", site, id))]
    NoSlot { site: String, id: usize },

    #[snafu(display("{}: The output device failed: {}", site, description))]
    OutputDevice { site: String, description: String },

    #[snafu(display("{}: The sequencer timer failed", site))]
    TimerFault { site: String },

    #[snafu(display("{}: Out of resources: {}", site, description))]
    ResourceExhausted { site: String, description: String },
}

macro_rules! site {
    () => {
        format!("{}:{}", file!(), line!())
    };
}

macro_rules! invalid_file_s {
    () => {
        crate::error::InvalidFileSnafu {
            site: site!(),
            description: "[no description]",
        }
    };
    ($msg:expr) => {
        crate::error::InvalidFileSnafu {
            site: site!(),
            description: $msg,
        }
    };
    ($fmt:expr, $($arg:expr),+) => {
        crate::error::InvalidFileSnafu {
            site: site!(),
            description: format!($fmt, $($arg),+),
        }
    };
}

macro_rules! invalid_file_e {
    () => {
        invalid_file_s!().build()
    };
    ($msg:expr) => {
        invalid_file_s!($msg).build()
    };
    ($fmt:expr, $($arg:expr),+) => {
        invalid_file_s!($fmt, $($arg),+).build()
    };
}

macro_rules! invalid_file_r {
    () => {
        Err(invalid_file_e!())
    };
    ($msg:expr) => {
        Err(invalid_file_e!($msg))
    };
    ($fmt:expr, $($arg:expr),+) => {
        Err(invalid_file_e!($fmt, $($arg),+))
    };
}

macro_rules! invalid_file {
    () => {
        return invalid_file_r!();
    };
    ($msg:expr) => {
        return invalid_file_r!($msg)
    };
    ($fmt:expr, $($arg:expr),+) => {
        return invalid_file_r!($fmt, $($arg),+)
    };
}

macro_rules! bad_arg_e {
    ($msg:expr) => {
        crate::error::BadArgumentSnafu {
            site: site!(),
            description: String::from($msg),
        }
        .build()
    };
    ($fmt:expr, $($arg:expr),+) => {
        crate::error::BadArgumentSnafu {
            site: site!(),
            description: format!($fmt, $($arg),+),
        }
        .build()
    };
}

macro_rules! bad_arg {
    ($msg:expr) => {
        return Err(bad_arg_e!($msg))
    };
    ($fmt:expr, $($arg:expr),+) => {
        return Err(bad_arg_e!($fmt, $($arg),+))
    };
}

#[test]
fn site_test() {
    let line = line!() + 1;
    let site = site!();
    assert!(site.contains("error.rs"));
    assert!(site.contains(format!("{}", line).as_str()));
}

#[test]
fn invalid_file_macros_test_no_message() {
    fn foo() -> LibResult<u64> {
        invalid_file!();
    }
    let result = foo();
    assert!(result.is_err());
    let message = format!("{}", result.err().unwrap());
    assert!(message.as_str().contains("The file is invalid"));
}

#[test]
fn invalid_file_macros_test_fmt() {
    fn foo() -> LibResult<u64> {
        invalid_file!("hello {}, {}", "world", String::from("foo"));
    }
    let result = foo();
    assert!(result.is_err());
    let message = format!("{}", result.err().unwrap());
    assert!(message.as_str().contains("hello world, foo"));
}

#[test]
fn bad_arg_macros_test() {
    fn foo() -> LibResult<u64> {
        bad_arg!("port {} is not open", 3);
    }
    let result = foo();
    assert!(result.is_err());
    let message = format!("{}", result.err().unwrap());
    assert!(message.as_str().contains("port 3 is not open"));
}

#[test]
fn error_kind_test() {
    use snafu::OptionExt;
    fn foo() -> crate::Result<u64> {
        fn inner() -> LibResult<u64> {
            None.context(crate::error::NotRunningSnafu { site: site!() })
        }
        Ok(inner()?)
    }
    let e = foo().err().unwrap();
    assert_eq!(e.kind(), ErrorKind::NotRunning);
}
