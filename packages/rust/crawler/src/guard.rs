//! SSRF protection for user-supplied sitemap and page URLs.

use std::io;
use std::net::{IpAddr, SocketAddr};

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use url::{Host, Url};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Check if a URL targets a potentially dangerous resource.
pub fn is_ssrf_target(url: &Url) -> bool {
    // Block non-HTTP schemes
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(Host::Domain(host)) => {
            let host = host.to_ascii_lowercase();
            host == "localhost"
                || host.ends_with(".localhost")
                || host.ends_with(".local")
                || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
                // 192.0.0.0/24
                || (v4.octets()[0] == 192 && v4.octets()[1] == 0 && v4.octets()[2] == 0)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local, fe80::/10 link-local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
                || v6.to_ipv4_mapped().is_some_and(|v4| is_private_ip(&IpAddr::V4(v4)))
        }
    }
}

/// Keep only the addresses that are safe to connect to.
pub fn public_addrs(addrs: impl IntoIterator<Item = SocketAddr>) -> Vec<SocketAddr> {
    addrs
        .into_iter()
        .filter(|addr| !is_private_ip(&addr.ip()))
        .collect()
}

/// DNS resolver that drops private and loopback answers, so a public
/// hostname pointing at an internal address cannot be reached.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicOnlyResolver;

impl Resolve for PublicOnlyResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(resolve_public(name.as_str().to_string()))
    }
}

async fn resolve_public(host: String) -> Result<Addrs, BoxError> {
    let resolved = tokio::net::lookup_host((host.as_str(), 0)).await?;
    let public = public_addrs(resolved);
    if public.is_empty() {
        tracing::warn!(%host, "SSRF protection: host resolves to private addresses");
        return Err(Box::new(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("{host} resolves only to private addresses"),
        )));
    }
    Ok(Box::new(public.into_iter()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocked(s: &str) -> bool {
        is_ssrf_target(&Url::parse(s).unwrap())
    }

    #[test]
    fn blocks_non_http_schemes() {
        assert!(blocked("file:///etc/passwd"));
        assert!(blocked("ftp://example.com/sitemap.xml"));
    }

    #[test]
    fn blocks_private_and_loopback_ips() {
        assert!(blocked("http://127.0.0.1:8080/"));
        assert!(blocked("http://10.0.0.5/sitemap.xml"));
        assert!(blocked("http://192.168.1.1/"));
        assert!(blocked("http://169.254.169.254/latest/meta-data"));
        assert!(blocked("http://[::1]/"));
        assert!(blocked("http://[fd00::1]/"));
    }

    #[test]
    fn blocks_local_hostnames() {
        assert!(blocked("http://localhost:3000/api"));
        assert!(blocked("http://printer.local/"));
        assert!(blocked("http://metadata.google.internal/"));
    }

    #[test]
    fn allows_public_sites() {
        assert!(!blocked("https://example.com/sitemap.xml"));
        assert!(!blocked("http://93.184.216.34/"));
    }

    #[test]
    fn resolver_filter_drops_private_answers() {
        let answers: Vec<SocketAddr> = vec![
            "127.0.0.1:0".parse().unwrap(),
            "10.1.2.3:0".parse().unwrap(),
            "93.184.216.34:0".parse().unwrap(),
            "[::1]:0".parse().unwrap(),
        ];
        let kept = public_addrs(answers);
        assert_eq!(kept, vec!["93.184.216.34:0".parse::<SocketAddr>().unwrap()]);
        assert!(public_addrs(vec!["192.168.0.10:0".parse().unwrap()]).is_empty());
    }
}
