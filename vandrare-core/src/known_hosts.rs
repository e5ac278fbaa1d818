//! `known_hosts` text generation for the HTTP companion, grounded on
//! `gateway/generators.go` and the inline generation in
//! `gateway/ssh/http_api.go`.

/// Render the `known_hosts` fragment: a header comment carrying the CA
/// fingerprint, one `@cert-authority <principal> <ca-pubkey>` line per host
/// certificate principal, and one `@cert-authority *.<domain> <ca-pubkey>`
/// line per configured subdomain.
pub fn render(
    ca_fingerprint: &str,
    ca_pubkey_openssh: &str,
    cert_principals: &[String],
    subdomains: &[String],
) -> String {
    let mut out = String::new();
    out.push_str(&format!("# vandrare gateway / CA fingerprint: {ca_fingerprint}\n"));
    for principal in cert_principals {
        out.push_str(&format!("@cert-authority {principal} {ca_pubkey_openssh}\n"));
    }
    for domain in subdomains {
        out.push_str(&format!("@cert-authority *.{domain} {ca_pubkey_openssh}\n"));
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn renders_header_and_one_line_per_principal_and_subdomain() {
        let text = render(
            "SHA256:abc",
            "ssh-ed25519 AAAA",
            &["gateway.example.com".to_string(), "gw".to_string()],
            &["tunnels.example.com".to_string()],
        );
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "# vandrare gateway / CA fingerprint: SHA256:abc");
        assert_eq!(
            lines.iter().filter(|l| l.starts_with("@cert-authority")).count(),
            3
        );
        assert!(text.contains("@cert-authority gateway.example.com ssh-ed25519 AAAA"));
        assert!(text.contains("@cert-authority *.tunnels.example.com ssh-ed25519 AAAA"));
    }
}
