//! Resolves the current agent identifier. Stateless: a pure function of
//! environment, never a module-level singleton (§9 design notes).

use sha2::{Digest, Sha256};

const AGENT_ID_ENV: &str = "TM_AGENT_ID";

/// Resolve the current agent id: `TM_AGENT_ID` if set, otherwise
/// `<user>_<short-hash(host)>` (§6.3).
pub fn resolve_agent_id() -> String {
    if let Ok(explicit) = std::env::var(AGENT_ID_ENV) {
        let trimmed = explicit.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    derive_agent_id(&current_user(), &current_host())
}

/// Derive `<user>_<short-hash(host)>` from explicit user/host values, used
/// both by [`resolve_agent_id`] and directly in tests.
pub fn derive_agent_id(user: &str, host: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(host.as_bytes());
    let digest = hasher.finalize();
    let short_hash = hex_prefix(&digest, 8);
    format!("{user}_{short_hash}")
}

fn hex_prefix(bytes: &[u8], chars: usize) -> String {
    let mut s = String::with_capacity(chars);
    for byte in bytes {
        if s.len() >= chars {
            break;
        }
        s.push_str(&format!("{byte:02x}"));
    }
    s.truncate(chars);
    s
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "user".to_string())
}

fn current_host() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        assert_eq!(derive_agent_id("alice", "box1"), derive_agent_id("alice", "box1"));
    }

    #[test]
    fn derive_differs_by_host() {
        assert_ne!(derive_agent_id("alice", "box1"), derive_agent_id("alice", "box2"));
    }

    #[test]
    fn derive_embeds_user_prefix() {
        assert!(derive_agent_id("alice", "box1").starts_with("alice_"));
    }

    #[test]
    fn hash_suffix_is_eight_hex_chars() {
        let id = derive_agent_id("bob", "host");
        let suffix = id.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
