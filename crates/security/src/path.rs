//! Protected-path policy: mutation guard for sensitive project files.
//!
//! File names come from the in-memory snapshot, not the host filesystem, so
//! the check is purely lexical: normalize the name, split it into segments,
//! then match the segments against a deny-list of sensitive names
//! (credentials, keys, lockfiles, VCS data).

/// Built-in deny-list, matched case-insensitively against path segments.
///
/// - `.git/`: a directory anywhere in the path
/// - `.env`: a file named exactly that, a variant such as `.env.local`, or any
///   file ending in the suffix (`server.pem`, `prod.env`)
/// - `credentials`: a segment named exactly that or with an extension
///   (`credentials.json`)
/// - `config/prod.yaml`: that trailing path
pub const DEFAULT_PROTECTED_PATTERNS: &[&str] = &[
    ".env",
    "credentials",
    "secrets",
    ".pem",
    ".p12",
    ".pfx",
    ".key",
    "id_rsa",
    "id_ed25519",
    ".npmrc",
    ".pypirc",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "cargo.lock",
    "poetry.lock",
    "gemfile.lock",
    "composer.lock",
    ".git/",
];

/// Error returned when a mutation targets a protected or malformed path.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtectedPathError {
    #[error("Path '{path}' matches protected pattern '{pattern}'")]
    Protected { path: String, pattern: String },

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Path must not be empty")]
    Empty,
}

/// Deny-list policy applied to every mutating tool call.
#[derive(Debug, Clone)]
pub struct ProtectedPathPolicy {
    patterns: Vec<String>,
}

impl ProtectedPathPolicy {
    /// Built-in deny-list plus caller-supplied fragments.
    pub fn new(extra: &[String]) -> Self {
        let mut patterns: Vec<String> = DEFAULT_PROTECTED_PATTERNS.iter().map(|p| p.to_string()).collect();
        for p in extra {
            let p = p.trim().to_lowercase();
            if !p.is_empty() && !patterns.contains(&p) {
                patterns.push(p);
            }
        }
        Self { patterns }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Check a path for mutation.
    ///
    /// Returns the matched pattern as an error for protected names.
    pub fn check(&self, path: &str) -> Result<(), ProtectedPathError> {
        let normalized = normalize(path);
        if normalized.is_empty() {
            return Err(ProtectedPathError::Empty);
        }

        if normalized.split('/').any(|seg| seg == "..") {
            return Err(ProtectedPathError::PathTraversal { path: path.into() });
        }

        for pattern in &self.patterns {
            if matches_pattern(&normalized, pattern) {
                tracing::warn!(path, pattern = %pattern, "Protected path rejected");
                return Err(ProtectedPathError::Protected {
                    path: path.into(),
                    pattern: pattern.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.check(path).is_err()
    }
}

impl Default for ProtectedPathPolicy {
    fn default() -> Self {
        Self::new(&[])
    }
}

fn matches_pattern(normalized: &str, pattern: &str) -> bool {
    if let Some(dir) = pattern.strip_suffix('/') {
        return normalized.split('/').any(|seg| seg == dir);
    }
    if pattern.contains('/') {
        return normalized == pattern
            || normalized.ends_with(&format!("/{pattern}"))
            || normalized.starts_with(&format!("{pattern}/"));
    }
    normalized.split('/').any(|seg| {
        seg == pattern
            || seg.starts_with(&format!("{pattern}."))
            || (pattern.starts_with('.') && seg.ends_with(pattern))
    })
}

/// Lower-case, forward slashes, no leading `./` or `/`.
fn normalize(path: &str) -> String {
    let mut s = path.trim().replace('\\', "/").to_lowercase();
    loop {
        if let Some(rest) = s.strip_prefix("./") {
            s = rest.to_string();
        } else if let Some(rest) = s.strip_prefix('/') {
            s = rest.to_string();
        } else {
            break;
        }
    }
    s
}
