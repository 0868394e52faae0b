use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

use crate::project_id::{ParseProjectIdError, ProjectId};

/// Represents a dsn url parsing error.
#[derive(Debug, Error)]
pub enum ParseDsnError {
    /// raised on completely invalid urls
    #[error("no valid url provided")]
    InvalidUrl,
    /// raised the scheme is invalid / unsupported.
    #[error("no valid scheme")]
    InvalidScheme,
    /// raised if the username (public key) portion is missing.
    #[error("username is empty")]
    NoUsername,
    /// raised the project id is missing (last path component)
    #[error("empty path")]
    NoProjectId,
    /// raised the project id is invalid.
    #[error("invalid project id")]
    InvalidProjectId(#[from] ParseProjectIdError),
}

/// Represents the scheme of an url http/https.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Scheme {
    /// unencrypted HTTP scheme (should not be used)
    Http,
    /// encrypted HTTPS scheme
    Https,
}

impl Scheme {
    /// Returns the default port for this scheme.
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Scheme::Https => write!(f, "https"),
            Scheme::Http => write!(f, "http"),
        }
    }
}

/// Represents a Streply DSN.
///
/// The DSN carries everything needed to reach the collector: the endpoint
/// (`scheme://host[:port]`), the public key used as the `Token` header and
/// the project id.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Dsn {
    scheme: Scheme,
    public_key: String,
    host: String,
    port: Option<u16>,
    project_id: ProjectId,
}

impl Dsn {
    /// Returns the scheme.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Returns the public key.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Returns the host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port, falling back to the scheme's default.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.scheme.default_port())
    }

    /// Returns the project id.
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the API url events are POSTed to.
    ///
    /// The port is only rendered when it is not one of the well-known HTTP
    /// ports.
    pub fn api_url(&self) -> String {
        let port = self.port();
        if port == 443 || port == 80 {
            format!("{}://{}", self.scheme, self.host)
        } else {
            format!("{}://{}:{}", self.scheme, self.host, port)
        }
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}@{}", self.scheme, self.public_key, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        write!(f, "/{}", self.project_id)
    }
}

impl FromStr for Dsn {
    type Err = ParseDsnError;

    fn from_str(s: &str) -> Result<Dsn, ParseDsnError> {
        let url = Url::parse(s).map_err(|_| ParseDsnError::InvalidUrl)?;

        if url.path() == "/" {
            return Err(ParseDsnError::NoProjectId);
        }

        let path_segments = url.path_segments().ok_or(ParseDsnError::NoProjectId)?;
        if path_segments.count() > 1 {
            return Err(ParseDsnError::InvalidUrl);
        }

        let public_key = match url.username() {
            "" => return Err(ParseDsnError::NoUsername),
            username => username.to_string(),
        };

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            _ => return Err(ParseDsnError::InvalidScheme),
        };

        let port = url.port();
        let host = match url.host_str() {
            Some(host) => host.into(),
            None => return Err(ParseDsnError::InvalidUrl),
        };
        let project_id = url.path().trim_matches('/').parse()?;

        Ok(Dsn {
            scheme,
            public_key,
            host,
            port,
            project_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dsn_parsing() {
        let url = "https://pub123@collector.example.com/42";
        let dsn: Dsn = url.parse().unwrap();
        assert_eq!(dsn.scheme(), Scheme::Https);
        assert_eq!(dsn.public_key(), "pub123");
        assert_eq!(dsn.host(), "collector.example.com");
        assert_eq!(dsn.port(), 443);
        assert_eq!(dsn.project_id(), ProjectId::new(42));
        assert_eq!(dsn.to_string(), url);
    }

    #[test]
    fn test_dsn_default_ports() {
        let dsn: Dsn = "http://pub@example.com/1".parse().unwrap();
        assert_eq!(dsn.port(), 80);
        let dsn: Dsn = "https://pub@example.com:4443/1".parse().unwrap();
        assert_eq!(dsn.port(), 4443);
    }

    #[test]
    fn test_api_url_elides_well_known_ports() {
        let dsn: Dsn = "https://pub@example.com/1".parse().unwrap();
        assert_eq!(dsn.api_url(), "https://example.com");
        let dsn: Dsn = "http://pub@example.com:80/1".parse().unwrap();
        assert_eq!(dsn.api_url(), "http://example.com");
        let dsn: Dsn = "https://pub@example.com:4443/1".parse().unwrap();
        assert_eq!(dsn.api_url(), "https://example.com:4443");
    }

    #[test]
    fn test_invalid_dsns() {
        assert!(matches!(
            "https://example.com/42".parse::<Dsn>(),
            Err(ParseDsnError::NoUsername)
        ));
        assert!(matches!(
            "https://pub@example.com/".parse::<Dsn>(),
            Err(ParseDsnError::NoProjectId)
        ));
        assert!(matches!(
            "ftp://pub@example.com/42".parse::<Dsn>(),
            Err(ParseDsnError::InvalidScheme)
        ));
        assert!(matches!(
            "https://pub@example.com/abc".parse::<Dsn>(),
            Err(ParseDsnError::InvalidProjectId(_))
        ));
    }
}
