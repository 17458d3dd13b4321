use std::path::PathBuf;

/// Expands a leading `~` to the current user's home directory.
///
/// Paths without a leading `~`, and `~user` forms, are returned unchanged.
#[must_use]
pub fn expand_user_path(input: &str) -> PathBuf {
    let trimmed = input.trim();
    let Some(rest) = trimmed.strip_prefix('~') else {
        return PathBuf::from(trimmed);
    };
    if !(rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\')) {
        return PathBuf::from(trimmed);
    }

    match dirs::home_dir() {
        Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
        None => PathBuf::from(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::expand_user_path;

    #[test]
    fn plain_paths_are_untouched() {
        assert_eq!(expand_user_path("chat.json"), PathBuf::from("chat.json"));
        assert_eq!(
            expand_user_path("  /tmp/chat.jsonl "),
            PathBuf::from("/tmp/chat.jsonl")
        );
    }

    #[test]
    fn tilde_user_form_is_not_expanded() {
        assert_eq!(expand_user_path("~bob/x.json"), PathBuf::from("~bob/x.json"));
    }

    #[test]
    fn tilde_prefix_resolves_under_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(expand_user_path("~/chats/a.json"), home.join("chats/a.json"));
        assert_eq!(expand_user_path("~"), home);
    }
}
