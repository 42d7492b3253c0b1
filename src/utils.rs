use uuid::Uuid;

/// Generate a cluster-unique resource name from a prefix.
///
/// Kubernetes object names must be DNS-1123 labels, so the suffix is
/// lowercase hex.
pub fn unique_name(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &suffix[..8])
}

/// Shell-quote a string for use inside a remote `sh -c` command line.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
