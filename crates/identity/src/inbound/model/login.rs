use serde::Deserialize;

// ╔════════════════════════════╗
// ║     OAuth2 Callback        ║
// ╚════════════════════════════╝

/// Query parameters a provider sends to the callback URL. Everything is
/// optional at the wire level; the handler decides what is fatal.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
