use std::borrow::Cow;

/// Quotes `word` for a POSIX shell. Words made only of safe characters are
/// returned untouched.
pub fn shell_quote(word: &str) -> Cow<'_, str> {
    if word.is_empty() {
        return Cow::Borrowed("''");
    }

    let safe = word
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "_-.,:/=@%+".contains(c));
    if safe {
        Cow::Borrowed(word)
    } else {
        Cow::Owned(format!("'{}'", word.replace('\'', r"'\''")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("npx"), "npx");
        assert_eq!(shell_quote("-y"), "-y");
        assert_eq!(shell_quote("@scope/pkg@1.2"), "@scope/pkg@1.2");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("two words"), "'two words'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
        assert_eq!(shell_quote("a;rm -rf /"), "'a;rm -rf /'");
    }
}
