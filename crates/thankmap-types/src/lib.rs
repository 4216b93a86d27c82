pub mod api;
pub mod events;
pub mod models;

/// Maximum length of a stored message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 280;

/// Characters a share code is drawn from (URL-safe).
pub const SHORT_CODE_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Length of newly generated share codes.
pub const SHORT_CODE_LEN: usize = 10;

/// Whether `code` could be a share code. Used to reject junk lookups early.
pub fn is_share_code(code: &str) -> bool {
    !code.is_empty() && code.len() <= 32 && code.bytes().all(|b| SHORT_CODE_ALPHABET.contains(&b))
}
