use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Well-known ID prefixes.
pub mod prefix {
    pub const CONNECTION: &str = "cn";
}
