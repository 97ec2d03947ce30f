//! Listen addresses and JSON configuration files.

use serde::de::DeserializeOwned;
use std::{
    fmt, fs, io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;
use tokio::net::lookup_host;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid address `{input}`: {reason}")]
    Address { input: String, reason: &'static str },

    #[error("reading {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("parsing {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Where a server listens.
///
/// Written `ADDRESS[:PORT]` for TCP, where `*` binds every interface, an
/// omitted port lets the OS choose one, IPv6 addresses go in brackets when a
/// port follows (`[::1]:4000`) and host names are resolved at bind time.
/// `unix:PATH`, or anything containing a `/`, is a Unix-domain socket path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServeAddr {
    Ip(SocketAddr),
    Host { host: String, port: u16 },
    Unix(PathBuf),
}

impl ServeAddr {
    /// The socket addresses to try binding, in resolver order.
    pub async fn resolve(&self) -> io::Result<Vec<SocketAddr>> {
        match self {
            ServeAddr::Ip(addr) => Ok(vec![*addr]),
            ServeAddr::Host { host, port } => {
                let addrs: Vec<_> = lookup_host((host.as_str(), *port)).await?.collect();
                if addrs.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("`{host}` has no addresses"),
                    ));
                }
                Ok(addrs)
            }
            ServeAddr::Unix(path) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a unix socket path", path.display()),
            )),
        }
    }
}

impl fmt::Display for ServeAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ServeAddr::Ip(addr) => fmt::Display::fmt(addr, f),
            ServeAddr::Host { host, port } => write!(f, "{host}:{port}"),
            ServeAddr::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

fn is_host_name(host: &str) -> bool {
    !host.starts_with(|c| c == '-' || c == '.')
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

impl FromStr for ServeAddr {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| ConfigError::Address {
            input: input.to_owned(),
            reason,
        };

        if let Some(path) = input.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(invalid("empty socket path"));
            }
            return Ok(ServeAddr::Unix(path.into()));
        }
        if input.contains('/') {
            return Ok(ServeAddr::Unix(input.into()));
        }

        let (host, port) = if let Some(rest) = input.strip_prefix('[') {
            let (host, rest) = rest.split_once(']').ok_or_else(|| invalid("missing `]`"))?;
            match rest {
                "" => (host, None),
                _ => match rest.strip_prefix(':') {
                    Some(port) => (host, Some(port)),
                    None => return Err(invalid("expected `:` after `]`")),
                },
            }
        } else {
            match input.rsplit_once(':') {
                // A second colon means a bare IPv6 address without a port.
                Some((host, port)) if !host.contains(':') => (host, Some(port)),
                _ => (input, None),
            }
        };

        let port = match port {
            Some(port) => port.parse().map_err(|_| invalid("bad port"))?,
            None => 0,
        };
        let ip = match host {
            "" => return Err(invalid("empty address")),
            "*" => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            host => match host.parse() {
                Ok(ip) => ip,
                Err(_) if is_host_name(host) => {
                    return Ok(ServeAddr::Host {
                        host: host.to_owned(),
                        port,
                    })
                }
                Err(_) => return Err(invalid("not an IP address or host name")),
            },
        };
        Ok(ServeAddr::Ip(SocketAddr::new(ip, port)))
    }
}

pub(crate) fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.to_owned(),
        source,
    })
}
