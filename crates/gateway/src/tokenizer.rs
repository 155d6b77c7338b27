/// Shell metacharacters that are never permitted in a single argv token,
/// since a tokenized command is executed directly (no shell) but a
/// metacharacter smuggled into one token could still be meaningful to the
/// invoked program (spec.md §4.4 point 3).
pub(crate) const FORBIDDEN: &[char] = &[';', '&', '|', '>', '<', '`', '$'];

/// Split a command string into argv tokens using POSIX-style quoting rules
/// (single quotes suppress all interpretation, double quotes allow
/// backslash-escaping of `"` and `\`, unquoted backslash escapes the next
/// character). No shell is invoked; this only determines argv.
pub fn tokenize(command: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = command.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' | '\n' if !in_token => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            '\'' => {
                in_token = true;
                for c in chars.by_ref() {
                    if c == '\'' {
                        break;
                    }
                    current.push(c);
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        None => return Err("unterminated double quote".to_owned()),
                        Some('"') => break,
                        Some('\\') => {
                            if let Some(&next) = chars.peek() {
                                if next == '"' || next == '\\' {
                                    current.push(next);
                                    chars.next();
                                } else {
                                    current.push('\\');
                                }
                            }
                        }
                        Some(c) => current.push(c),
                    }
                }
            }
            '\\' => {
                in_token = true;
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
        if c == ' ' || c == '\t' || c == '\n' {
            in_token = false;
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    for token in &tokens {
        if let Some(bad) = token.chars().find(|c| FORBIDDEN.contains(c)) {
            return Err(format!("disallowed shell metacharacter `{bad}` in token `{token}`"));
        }
    }

    Ok(tokens)
}

/// Does `argv` start with one of the whitelisted command prefixes?
#[must_use]
pub fn matches_whitelist(argv: &[String], whitelist: &[Vec<String>]) -> bool {
    whitelist
        .iter()
        .any(|prefix| argv.len() >= prefix.len() && argv[..prefix.len()] == prefix[..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_simple_command() {
        assert_eq!(tokenize("git status").unwrap(), vec!["git", "status"]);
    }

    #[test]
    fn tokenizes_quoted_argument_with_spaces() {
        assert_eq!(
            tokenize(r#"git commit -m "fix the thing""#).unwrap(),
            vec!["git", "commit", "-m", "fix the thing"]
        );
    }

    #[test]
    fn rejects_shell_metacharacters() {
        assert!(tokenize("git status; rm -rf /").is_err());
        assert!(tokenize("echo $(whoami)").is_err());
        assert!(tokenize("cat file | grep x").is_err());
    }

    #[test]
    fn single_quotes_suppress_interpretation() {
        assert_eq!(tokenize("echo 'a b c'").unwrap(), vec!["echo", "a b c"]);
    }

    #[test]
    fn whitelist_matches_prefix() {
        let whitelist = vec![vec!["git".to_owned(), "status".to_owned()]];
        assert!(matches_whitelist(&["git".into(), "status".into()], &whitelist));
        assert!(!matches_whitelist(&["git".into(), "push".into()], &whitelist));
    }

    #[test]
    fn whitelist_rejects_short_argv() {
        let whitelist = vec![vec!["python".to_owned(), "-m".to_owned(), "pytest".to_owned()]];
        assert!(!matches_whitelist(&["python".into()], &whitelist));
    }
}
