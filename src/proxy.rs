// Proxy selection: classify proxy URIs by scheme and pick one per account.

use reqwest::Proxy;

/// Transport family of a supported proxy URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    Http,
    Socks,
}

/// Outcome of proxy selection for one account.
///
/// `Direct` means no proxy was requested, while `Unsupported` means one was
/// requested but could not be used. Both end up sending requests directly.
#[derive(Debug, Clone)]
pub enum ProxyChoice {
    Direct,
    Proxied {
        uri: String,
        kind: ProxyKind,
        proxy: Proxy,
    },
    Unsupported {
        uri: String,
        reason: String,
    },
}

impl ProxyChoice {
    /// The reqwest proxy to install on the client, if any.
    pub fn proxy(&self) -> Option<&Proxy> {
        match self {
            ProxyChoice::Proxied { proxy, .. } => Some(proxy),
            _ => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            ProxyChoice::Direct => "direct".to_string(),
            ProxyChoice::Proxied { uri, .. } => uri.clone(),
            ProxyChoice::Unsupported { uri, .. } => format!("direct (unsupported proxy {})", uri),
        }
    }
}

/// Scheme of `uri`, if it is one we know how to tunnel through.
pub fn kind_of(uri: &str) -> Option<ProxyKind> {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        Some(ProxyKind::Http)
    } else if uri.starts_with("socks4://") || uri.starts_with("socks5://") {
        Some(ProxyKind::Socks)
    } else {
        None
    }
}

/// Build the transport choice for `uri`.
pub fn classify(uri: Option<&str>) -> ProxyChoice {
    let uri = match uri.map(str::trim) {
        None | Some("") => return ProxyChoice::Direct,
        Some(u) => u,
    };
    let Some(kind) = kind_of(uri) else {
        log::warn!("Unsupported proxy type: {}", uri);
        return ProxyChoice::Unsupported {
            uri: uri.to_string(),
            reason: "unknown scheme".to_string(),
        };
    };
    match Proxy::all(uri) {
        Ok(proxy) => ProxyChoice::Proxied {
            uri: uri.to_string(),
            kind,
            proxy,
        },
        Err(e) => {
            log::warn!("Unsupported proxy {}: {}", uri, e);
            ProxyChoice::Unsupported {
                uri: uri.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// Round-robin lookup: the proxy for the account at `index`.
pub fn assign(proxies: &[String], index: usize) -> Option<&str> {
    if proxies.is_empty() {
        None
    } else {
        Some(proxies[index % proxies.len()].as_str())
    }
}
