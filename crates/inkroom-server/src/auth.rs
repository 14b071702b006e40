//! Session providers: map a connection credential to a user id.

use std::collections::HashMap;

/// Resolves the credential presented on upgrade to an opaque user id.
pub trait SessionProvider: Send + Sync {
    fn authenticate(&self, credential: &str) -> Option<String>;
}

/// Fixed `token -> user` table, loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct TokenSessions {
    tokens: HashMap<String, String>,
}

impl TokenSessions {
    pub fn new(tokens: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl SessionProvider for TokenSessions {
    fn authenticate(&self, credential: &str) -> Option<String> {
        self.tokens.get(credential).cloned()
    }
}

/// Development provider: any non-empty credential is its own user id.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSessions;

impl SessionProvider for OpenSessions {
    fn authenticate(&self, credential: &str) -> Option<String> {
        let credential = credential.trim();
        (!credential.is_empty()).then(|| credential.to_string())
    }
}
