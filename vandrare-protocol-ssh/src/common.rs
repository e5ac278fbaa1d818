//! Small shared types for the SSH frontend, trimmed from
//! `warpgate-protocol-ssh/src/common.rs` to just what this gateway's channel/
//! request handling needs: no PTY, X11, streamlocal or agent-forward
//! variants, since none of those channel/request types are accepted by
//! this gateway.

use tokio::io::{AsyncRead, AsyncWrite};
use vandrare_common::domains::wrap_one;

/// Registry key as requested by the exposer/consumer, with the host wrapped
/// the same way `self_domains`/`subdomains` entries are: IPv4 and bare
/// `host:port` literals come back bracketed as `[host]:port`. Grounded on
/// `examples/original_source/gateway/ssh/forward_tcp.go`'s
/// `fmt.Sprintf("%v:%v", data.DestAddr, data.DestPort)`, with the bracketing
/// the Go caller applies before formatting folded in here.
pub fn endpoint_key(host: &str, port: u32) -> String {
    wrap_one(&format!("{host}:{port}"))
}

/// Blanket marker so an SSH channel's I/O stream can be stored behind one
/// trait object regardless of the concrete type `Channel::into_stream()`
/// returns.
pub trait AsyncIo: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncIo for T {}

pub type BoxedIo = Box<dyn AsyncIo>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn endpoint_key_wraps_host_port() {
        assert_eq!(endpoint_key("db.example", 5432), "[db.example]:5432");
        assert_eq!(endpoint_key("10.0.0.1", 22), "[10.0.0.1]:22");
    }
}
