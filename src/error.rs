/*!
 * Error Taxonomy
 *
 * Every failure a command handler can report. Each variant maps to a
 * stable wire code so clients can tell failures apart without parsing
 * the human readable message.
 */

use thiserror::Error;

/// Failures surfaced to the client as a single error reply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No command table entry matched the command token
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    /// The key does not exist in the selected dictionary or hardware table
    #[error("key not found")]
    KeyNotFound,
    /// SELECT named a dictionary that is not configured
    #[error("no such dictionary")]
    DictionaryNotFound,
    /// SUBSCRIBE/UNSUBSCRIBE/PUBLISH named an unknown channel
    #[error("no such channel")]
    ChannelNotFound,
    /// Write attempted against a ROM dictionary
    #[error("dictionary is read-only")]
    ReadOnly,
    /// The command was given the wrong number of arguments
    #[error("wrong number of arguments for '{0}'")]
    WrongArity(String),
    /// The key is empty or too long to be stored inline
    #[error("invalid key")]
    InvalidKey,
    /// The backend has no room left for the record
    #[error("not enough space in dictionary")]
    StorageFull,
    /// The connection holds no subscriber slot
    #[error("no subscriber slot available")]
    NoSubscriberSlot,
    /// A key index table violates its id constraints
    #[error("invalid key index entry '{0}'")]
    InvalidKeyIndex(String),
}

impl Error {
    /// Stable code written as the first word of an error reply
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnknownCommand(_) => "UNKNOWN",
            Error::KeyNotFound => "NOTFOUND",
            Error::DictionaryNotFound => "NODICT",
            Error::ChannelNotFound => "NOCHANNEL",
            Error::ReadOnly => "READONLY",
            Error::WrongArity(_) => "ARGS",
            Error::InvalidKey => "BADKEY",
            Error::StorageFull => "FULL",
            Error::NoSubscriberSlot => "NOSLOT",
            Error::InvalidKeyIndex(_) => "CONFIG",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let all = [
            Error::UnknownCommand("X".into()),
            Error::KeyNotFound,
            Error::DictionaryNotFound,
            Error::ChannelNotFound,
            Error::ReadOnly,
            Error::WrongArity("GET".into()),
            Error::InvalidKey,
            Error::StorageFull,
            Error::NoSubscriberSlot,
            Error::InvalidKeyIndex("k".into()),
        ];
        let mut codes: Vec<_> = all.iter().map(Error::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }
}
