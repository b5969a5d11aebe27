use thiserror::Error;

/// Errors raised where raw configuration values enter the library.
///
/// The transfer path itself never fails; see [`crate::SpiLink`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("unsupported transmission mode {0}, expected 0..=3")]
    InvalidMode(u8),

    #[error("unknown bit order `{0}`, expected `msb_first` or `lsb_first`")]
    InvalidBitOrder(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::InvalidMode(7).to_string(),
            "unsupported transmission mode 7, expected 0..=3"
        );
        assert!(Error::InvalidBitOrder("middle".into())
            .to_string()
            .contains("`middle`"));
    }
}
