//! Errors raised while bootstrapping phishpair: config loading and database setup

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// SQLite open, schema sync or migration failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Creating the data folder failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad or unreadable TOML, or an invalid setting
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "IO error: denied");
    }
}
