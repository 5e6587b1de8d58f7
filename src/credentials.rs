//! Credential handling for command-line and plugin inputs.

use std::collections::HashMap;
use std::path::Path;

use crate::errors::ScmError;

const FILE_SCHEME: &str = "file://";

/// Resolve a token that may be given as `file:///path/to/token`.
///
/// Literal tokens are returned unchanged. File contents are trimmed of
/// surrounding whitespace, so a trailing newline does not end up in headers.
pub fn resolve_token(token: &str) -> Result<String, ScmError> {
    match token.strip_prefix(FILE_SCHEME) {
        Some(path) => read_token_file(Path::new(path)),
        None => Ok(token.to_string()),
    }
}

fn read_token_file(path: &Path) -> Result<String, ScmError> {
    std::fs::read_to_string(path)
        .map(|data| data.trim().to_string())
        .map_err(|e| {
            ScmError::InvalidInput(format!("cannot read token file {}: {}", path.display(), e))
        })
}

/// Parse `login=token` pairs into a lookup map.
pub fn parse_token_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<HashMap<String, String>, ScmError> {
    let mut map = HashMap::with_capacity(pairs.len());
    for pair in pairs {
        let pair = pair.as_ref();
        match pair.split_once('=') {
            Some((login, token))
                if !login.is_empty() && !token.is_empty() && !token.contains('=') =>
            {
                map.insert(login.to_string(), token.to_string());
            }
            _ => {
                return Err(ScmError::InvalidInput(format!(
                    "invalid token pair '{}', expected login=token",
                    pair
                )));
            }
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_literal_token_unchanged() {
        assert_eq!(resolve_token("ghp_abc123").unwrap(), "ghp_abc123");
        assert_eq!(resolve_token("").unwrap(), "");
    }

    #[test]
    fn test_file_token_is_read_and_trimmed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token");
        fs::write(&path, "ghp_from_file\n").unwrap();
        let token = resolve_token(&format!("file://{}", path.display())).unwrap();
        assert_eq!(token, "ghp_from_file");
    }

    #[test]
    fn test_missing_token_file_is_invalid_input() {
        let err = resolve_token("file:///definitely/not/here/token").unwrap_err();
        assert!(matches!(err, ScmError::InvalidInput(_)));
        assert!(err.to_string().contains("/definitely/not/here/token"));
    }

    #[test]
    fn test_parse_token_pairs() {
        let map = parse_token_pairs(&["alice=t1", "bob=t2"]).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["alice"], "t1");
        assert_eq!(map["bob"], "t2");
    }

    #[test]
    fn test_parse_token_pairs_empty() {
        let pairs: Vec<String> = Vec::new();
        assert!(parse_token_pairs(&pairs).unwrap().is_empty());
    }

    #[test]
    fn test_parse_token_pairs_rejects_malformed() {
        for bad in ["alice", "alice=", "=t1", "a=b=c"] {
            let err = parse_token_pairs(&[bad]).unwrap_err();
            assert!(matches!(err, ScmError::InvalidInput(_)), "{}", bad);
        }
    }
}
