use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use validator::ValidationError;

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap());
static COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}){1,2}$").unwrap());

/// Names of the keyword endpoints under `/users/` (users themselves are
/// addressed by numeric id). Refused as usernames.
const RESERVED_USERNAMES: &[&str] = &["me", "subscriptions", "set_password"];

fn error(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Owned(message));
    err
}

fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || matches!(c, '.' | '@' | '+' | '-')
}

/// Usernames may contain letters, digits and `@ . + - _`.
/// The error message lists every offending character once, in order of appearance.
pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    let mut invalid: Vec<char> = Vec::new();
    for c in value.chars().filter(|c| !is_username_char(*c)) {
        if !invalid.contains(&c) {
            invalid.push(c);
        }
    }

    if !invalid.is_empty() {
        let chars: String = invalid.into_iter().collect();
        return Err(error(
            "username_charset",
            format!(
                "Invalid characters '{}' in username. Username may contain only letters, digits and @/./+/-/_.",
                chars
            ),
        ));
    }

    if RESERVED_USERNAMES.contains(&value.to_lowercase().as_str()) {
        return Err(error(
            "username_reserved",
            format!("Username '{}' is reserved.", value),
        ));
    }

    Ok(())
}

/// Slugs may contain only ASCII letters, digits, `-` and `_`.
pub fn validate_slug(value: &str) -> Result<(), ValidationError> {
    if SLUG_RE.is_match(value) {
        Ok(())
    } else {
        Err(error(
            "slug_charset",
            "Slug may contain only latin letters, digits, '-' and '_'.".to_string(),
        ))
    }
}

/// Colors are hex triplets in `#RGB` or `#RRGGBB` form.
pub fn validate_color(value: &str) -> Result<(), ValidationError> {
    if COLOR_RE.is_match(value) {
        Ok(())
    } else {
        Err(error(
            "color_format",
            "Color must be a hex value such as #49B64E or #FFF.".to_string(),
        ))
    }
}
