use std::fmt;

/// A Jenkins API token.
///
/// Wrapped so the secret never leaks through `Debug` formatting or logs.
#[derive(Clone)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

/// Jenkins authenticates API calls with HTTP basic auth: username + API token.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub token: Token,
}

impl Credentials {
    pub fn new(user: impl Into<String>, token: impl Into<Token>) -> Self {
        Self {
            user: user.into(),
            token: token.into(),
        }
    }
}
