//! Built-in placeholder resolvers.
//!
//! | token | value |
//! |-------|-------|
//! | `___random___` | 16 random characters |
//! | `___random8___`, `___random32___`, `___random64___` | 8, 32, 64 random characters |
//! | `___ip_address___` | first non-loopback IPv4 address, or `localhost` |
//! | `___project_name___` | leading alphanumeric part of the executable's directory name |

use super::{PlaceholderError, PlaceholderRegistry};
use rand::Rng;
use regex_lite::Regex;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::path::Path;
use std::sync::LazyLock;

const EDGE_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const INNER_CHARS: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz!@()_+-=.";

/// Register every built-in resolver.
pub fn register_all(registry: &PlaceholderRegistry) -> Result<(), PlaceholderError> {
    registry.register("random", || random_string(16))?;
    registry.register("random8", || random_string(8))?;
    registry.register("random32", || random_string(32))?;
    registry.register("random64", || random_string(64))?;
    registry.register("ip_address", ip_address)?;
    registry.register("project_name", project_name)?;
    Ok(())
}

/// Random string whose first and last characters are alphanumeric.
pub fn random_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|i| {
            let set = if i == 0 || i + 1 == len {
                EDGE_CHARS
            } else {
                INNER_CHARS
            };
            char::from(set[rng.gen_range(0..set.len())])
        })
        .collect()
}

/// First non-loopback IPv4 address of this host.
///
/// Connecting a UDP socket sends nothing; it only asks the kernel which
/// local address would route outward.
pub fn ip_address() -> String {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
        Ok(socket.local_addr()?.ip())
    };

    match probe() {
        Ok(IpAddr::V4(addr)) if !addr.is_loopback() && !addr.is_unspecified() => addr.to_string(),
        _ => "localhost".to_string(),
    }
}

/// Project name derived from where the binary lives.
pub fn project_name() -> String {
    let source = std::env::current_exe()
        .ok()
        .and_then(|exe| {
            exe.parent()
                .and_then(Path::file_name)
                .map(|name| name.to_string_lossy().into_owned())
        })
        .or_else(|| std::env::args().next())
        .unwrap_or_default();

    leading_alphanumeric(&source)
}

static LEADING_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[a-zA-Z0-9]+").expect("alphanumeric prefix pattern is valid"));

fn leading_alphanumeric(value: &str) -> String {
    LEADING_ALPHANUMERIC
        .find(value)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| value.to_string())
}
