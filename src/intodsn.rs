use std::borrow::Cow;

use crate::dsn::{Dsn, ParseDsnError};

/// Helper trait to convert a DSN into different helpful forms of it.
///
/// This is used by the client constructors so that an already parsed
/// [`Dsn`], a string, or nothing at all can be passed as configuration.
/// An empty string is treated the same as no DSN and disables the client
/// instead of failing.
pub trait IntoDsn {
    /// Converts the value into a `Result<Option<Dsn>, E>`.
    fn into_dsn(self) -> Result<Option<Dsn>, ParseDsnError>;
}

impl<I: IntoDsn> IntoDsn for Option<I> {
    fn into_dsn(self) -> Result<Option<Dsn>, ParseDsnError> {
        match self {
            Some(into_dsn) => into_dsn.into_dsn(),
            None => Ok(None),
        }
    }
}

impl IntoDsn for () {
    fn into_dsn(self) -> Result<Option<Dsn>, ParseDsnError> {
        Ok(None)
    }
}

impl<'a> IntoDsn for &'a str {
    fn into_dsn(self) -> Result<Option<Dsn>, ParseDsnError> {
        if self.is_empty() {
            Ok(None)
        } else {
            self.parse().map(Some)
        }
    }
}

impl<'a> IntoDsn for Cow<'a, str> {
    fn into_dsn(self) -> Result<Option<Dsn>, ParseDsnError> {
        let x: &str = &self;
        x.into_dsn()
    }
}

impl<'a> IntoDsn for &'a String {
    fn into_dsn(self) -> Result<Option<Dsn>, ParseDsnError> {
        (self as &str).into_dsn()
    }
}

impl IntoDsn for String {
    fn into_dsn(self) -> Result<Option<Dsn>, ParseDsnError> {
        (&self as &str).into_dsn()
    }
}

impl<'a> IntoDsn for &'a Dsn {
    fn into_dsn(self) -> Result<Option<Dsn>, ParseDsnError> {
        Ok(Some(self.clone()))
    }
}

impl IntoDsn for Dsn {
    fn into_dsn(self) -> Result<Option<Dsn>, ParseDsnError> {
        Ok(Some(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string_means_disabled() {
        assert!("".into_dsn().unwrap().is_none());
        assert!(().into_dsn().unwrap().is_none());
    }

    #[test]
    fn test_str_into_dsn() {
        let dsn = "https://public@streply.example.com/1"
            .into_dsn()
            .unwrap()
            .unwrap();
        assert_eq!(dsn.host(), "streply.example.com");
    }
}
