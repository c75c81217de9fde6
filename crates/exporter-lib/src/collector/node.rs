//! Node identity used as the `node` label

/// Environment variable overriding the node name (Kubernetes downward API)
pub const NODE_NAME_ENV: &str = "NODE_NAME";

/// Value used when neither the override nor the hostname is available
pub const UNKNOWN_NODE: &str = "unknown";

/// Resolve the node name for the current scrape. Never fails.
pub fn resolve_node_name() -> String {
    node_name_from(std::env::var(NODE_NAME_ENV).ok(), hostname())
}

fn node_name_from(override_name: Option<String>, hostname: Option<String>) -> String {
    override_name
        .filter(|name| !name.is_empty())
        .or(hostname)
        .unwrap_or_else(|| UNKNOWN_NODE.to_string())
}

fn hostname() -> Option<String> {
    hostname::get()
        .ok()
        .map(|name| name.to_string_lossy().trim().to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        assert_eq!(
            node_name_from(Some("worker-7".into()), Some("host".into())),
            "worker-7"
        );
    }

    #[test]
    fn test_empty_override_falls_back_to_hostname() {
        assert_eq!(node_name_from(Some(String::new()), Some("host".into())), "host");
        assert_eq!(node_name_from(None, Some("host".into())), "host");
    }

    #[test]
    fn test_sentinel_when_nothing_resolves() {
        assert_eq!(node_name_from(None, None), UNKNOWN_NODE);
    }

    #[test]
    fn test_hostname_comes_from_the_system() {
        let name = hostname().unwrap();
        assert!(!name.is_empty());
        assert_eq!(name, name.trim());
    }

    #[test]
    fn test_resolve_never_empty() {
        assert!(!resolve_node_name().is_empty());
    }
}
