/// Derive the tenant subdomain from a host name.
///
/// Rules, in order:
/// - bare `localhost` / `127.0.0.1` resolve to the `default` tenant;
/// - `shop.example.com` (three or more labels) resolves to the first label;
/// - `shop.localhost` resolves to `shop`;
/// - anything else (e.g. an apex domain like `example.com`) has no tenant.
///
/// A port suffix is stripped before the rules apply, so `shop.localhost:5000`
/// behaves like `shop.localhost`.
pub fn subdomain_from_host(host: &str) -> Option<String> {
    let host = host.split(':').next().unwrap_or(host);
    if host == "localhost" || host == "127.0.0.1" {
        return Some("default".to_string());
    }

    let parts: Vec<&str> = host.split('.').collect();
    if parts.len() > 2 {
        return Some(parts[0].to_string());
    }
    if parts.len() == 2 && parts[1] == "localhost" {
        return Some(parts[0].to_string());
    }
    None
}
