//! Self-describing network addresses.
//!
//! A multiaddr is a sequence of `/protocol/value` components, for example
//! `/ip4/1.2.3.4/tcp/4001` or `/memory/17`. Only the components the
//! rendezvous endpoints actually speak are supported.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use crate::error::CoreError;

/// A single multiaddr component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Protocol {
    Ip4(Ipv4Addr),
    Ip6(Ipv6Addr),
    /// Hostname resolved to any address family.
    Dns(String),
    /// Hostname resolved to IPv4 only.
    Dns4(String),
    /// Hostname resolved to IPv6 only.
    Dns6(String),
    Tcp(u16),
    /// In-process transport, keyed by a port number.
    Memory(u64),
}

impl Protocol {
    fn name(&self) -> &'static str {
        match self {
            Protocol::Ip4(_) => "ip4",
            Protocol::Ip6(_) => "ip6",
            Protocol::Dns(_) => "dns",
            Protocol::Dns4(_) => "dns4",
            Protocol::Dns6(_) => "dns6",
            Protocol::Tcp(_) => "tcp",
            Protocol::Memory(_) => "memory",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ip4(ip) => write!(f, "/ip4/{ip}"),
            Protocol::Ip6(ip) => write!(f, "/ip6/{ip}"),
            Protocol::Dns(host) => write!(f, "/dns/{host}"),
            Protocol::Dns4(host) => write!(f, "/dns4/{host}"),
            Protocol::Dns6(host) => write!(f, "/dns6/{host}"),
            Protocol::Tcp(port) => write!(f, "/tcp/{port}"),
            Protocol::Memory(port) => write!(f, "/memory/{port}"),
        }
    }
}

/// A parsed multiaddr.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Multiaddr {
    components: Vec<Protocol>,
}

impl Multiaddr {
    /// Create an empty multiaddr.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append a component.
    pub fn with(mut self, protocol: Protocol) -> Self {
        self.components.push(protocol);
        self
    }

    /// Build `/ip4|ip6/<ip>/tcp/<port>` from a socket address.
    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        let ip = match addr.ip() {
            IpAddr::V4(ip) => Protocol::Ip4(ip),
            IpAddr::V6(ip) => Protocol::Ip6(ip),
        };
        Self::empty().with(ip).with(Protocol::Tcp(addr.port()))
    }

    /// Build `/memory/<port>`.
    pub fn memory(port: u64) -> Self {
        Self::empty().with(Protocol::Memory(port))
    }

    /// The components in order.
    pub fn iter(&self) -> impl Iterator<Item = &Protocol> {
        self.components.iter()
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether there are no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// The socket address, if this is exactly an IP + TCP address.
    ///
    /// DNS addresses are not resolved here.
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        match self.components.as_slice() {
            [Protocol::Ip4(ip), Protocol::Tcp(port)] => Some(SocketAddr::new((*ip).into(), *port)),
            [Protocol::Ip6(ip), Protocol::Tcp(port)] => Some(SocketAddr::new((*ip).into(), *port)),
            _ => None,
        }
    }

    /// The memory port, if this is exactly a `/memory/<port>` address.
    pub fn memory_port(&self) -> Option<u64> {
        match self.components.as_slice() {
            [Protocol::Memory(port)] => Some(*port),
            _ => None,
        }
    }
}

impl fmt::Display for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in &self.components {
            write!(f, "{component}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multiaddr({self})")
    }
}

impl FromStr for Multiaddr {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| CoreError::InvalidMultiaddr {
            addr: s.to_string(),
            reason: reason.to_string(),
        };

        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| invalid("must start with '/'"))?;
        if rest.is_empty() {
            return Err(invalid("no components"));
        }

        let mut parts = rest.split('/');
        let mut components = Vec::new();

        while let Some(name) = parts.next() {
            let value = parts
                .next()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| invalid(&format!("missing value for '{name}'")))?;

            let protocol = match name {
                "ip4" => Protocol::Ip4(value.parse().map_err(|_| invalid("bad ip4 address"))?),
                "ip6" => Protocol::Ip6(value.parse().map_err(|_| invalid("bad ip6 address"))?),
                "dns" => Protocol::Dns(value.to_string()),
                "dns4" => Protocol::Dns4(value.to_string()),
                "dns6" => Protocol::Dns6(value.to_string()),
                "tcp" => Protocol::Tcp(value.parse().map_err(|_| invalid("bad tcp port"))?),
                "memory" => {
                    Protocol::Memory(value.parse().map_err(|_| invalid("bad memory port"))?)
                }
                other => return Err(invalid(&format!("unsupported protocol '{other}'"))),
            };
            components.push(protocol);
        }

        Ok(Self { components })
    }
}

impl Serialize for Multiaddr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Multiaddr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl From<SocketAddr> for Multiaddr {
    fn from(addr: SocketAddr) -> Self {
        Self::from_socket_addr(addr)
    }
}

impl std::iter::FromIterator<Protocol> for Multiaddr {
    fn from_iter<I: IntoIterator<Item = Protocol>>(iter: I) -> Self {
        Self {
            components: iter.into_iter().collect(),
        }
    }
}

/// Displays the protocol names of a multiaddr, e.g. `ip4/tcp`.
pub struct ProtocolList<'a>(pub &'a Multiaddr);

impl fmt::Display for ProtocolList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(Protocol::name).collect();
        f.write_str(&names.join("/"))
    }
}

impl Multiaddr {
    /// Protocol names only, for log lines.
    pub fn protocols(&self) -> ProtocolList<'_> {
        ProtocolList(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ip4_tcp() {
        let addr: Multiaddr = "/ip4/1.2.3.4/tcp/1".parse().unwrap();
        assert_eq!(addr.len(), 2);
        assert_eq!(
            addr.to_socket_addr(),
            Some("1.2.3.4:1".parse::<SocketAddr>().unwrap())
        );
        assert_eq!(addr.to_string(), "/ip4/1.2.3.4/tcp/1");
        assert_eq!(addr.protocols().to_string(), "ip4/tcp");
    }

    #[test]
    fn test_parse_ip6_and_memory() {
        let addr: Multiaddr = "/ip6/::1/tcp/4001".parse().unwrap();
        assert_eq!(addr.to_string(), "/ip6/::1/tcp/4001");
        assert!(addr.to_socket_addr().is_some());

        let mem: Multiaddr = "/memory/42".parse().unwrap();
        assert_eq!(mem.memory_port(), Some(42));
        assert_eq!(mem.to_socket_addr(), None);
    }

    #[test]
    fn test_dns_is_not_a_socket_addr() {
        let addr: Multiaddr = "/dns/example.com/tcp/443".parse().unwrap();
        assert_eq!(addr.to_socket_addr(), None);
        assert_eq!(addr.to_string(), "/dns/example.com/tcp/443");
    }

    #[test]
    fn test_dns_family_is_preserved() {
        for text in ["/dns4/example.com/tcp/443", "/dns6/example.com/tcp/443"] {
            let addr: Multiaddr = text.parse().unwrap();
            assert_eq!(addr.to_string(), text);
            assert_eq!(addr.to_socket_addr(), None);
        }

        let v4: Multiaddr = "/dns4/example.com/tcp/443".parse().unwrap();
        assert_eq!(v4.protocols().to_string(), "dns4/tcp");
        assert_ne!(v4, "/dns/example.com/tcp/443".parse::<Multiaddr>().unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "/", "ip4/1.2.3.4", "/ip4", "/ip4/999.1.1.1", "/tcp/x", "/quic/1", "/ip4//tcp/1"] {
            assert!(bad.parse::<Multiaddr>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_from_socket_addr() {
        let sock: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let addr = Multiaddr::from(sock);
        assert_eq!(addr.to_string(), "/ip4/127.0.0.1/tcp/9000");
        assert_eq!(addr.to_socket_addr(), Some(sock));
    }

    #[test]
    fn test_serde_as_string() {
        let addr = Multiaddr::memory(3);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"/memory/3\"");
        let back: Multiaddr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
