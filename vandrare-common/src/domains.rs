//! Address normalization for self-domains and configured subdomains.
//!
//! A bare `host:port` entry is rewritten to `[host]:port` so that it can be
//! embedded unambiguously into SSH config stanzas and forwarding identities
//! alongside bracketed IPv6 literals. Anything that isn't cleanly a
//! `host:port` pair (no port, or an unbracketed IPv6 literal) is left as-is.

pub fn wrap_one(v: &str) -> String {
    if let Some(rest) = v.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            let host = &rest[..end];
            let after = &rest[end + 1..];
            if let Some(port) = after.strip_prefix(':') {
                return format!("[{host}]:{port}");
            }
        }
        return v.to_string();
    }

    if v.matches(':').count() == 1 {
        if let Some((host, port)) = v.split_once(':') {
            return format!("[{host}]:{port}");
        }
    }

    v.to_string()
}

/// Normalize a list of `host:port` entries (self-domains, subdomains) into
/// bracketed form.
pub fn wrap_ip<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    entries.into_iter().map(|v| wrap_one(v.as_ref())).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wraps_host_port() {
        assert_eq!(wrap_one("gateway.example.com:2222"), "[gateway.example.com]:2222");
    }

    #[test]
    fn normalizes_already_bracketed() {
        assert_eq!(wrap_one("[::1]:22"), "[::1]:22");
    }

    #[test]
    fn leaves_hostname_without_port_unchanged() {
        assert_eq!(wrap_one("gateway.example.com"), "gateway.example.com");
    }

    #[test]
    fn leaves_bare_ipv6_without_port_unchanged() {
        assert_eq!(wrap_one("::1"), "::1");
    }

    #[test]
    fn wraps_a_list() {
        assert_eq!(
            wrap_ip(["a.example.com:1", "b.example.com:2"]),
            vec!["[a.example.com]:1".to_string(), "[b.example.com]:2".to_string()]
        );
    }
}
