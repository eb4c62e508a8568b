//! Line-level access to one multi-line value of an INI file.
//!
//! Only what `setup.cfg` needs: locate `key` inside `[section]` and report
//! the physical lines holding its value, so that readers and editors work
//! on the same line indices.

/// One non-empty, non-comment line belonging to a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueLine {
    /// Zero-based line index in the file.
    pub index: usize,
    /// Trimmed value text.
    pub text: String,
    /// `true` when the text sits on the key line itself (`key = text`).
    pub inline: bool,
}

/// Lines of `key` in `[section]`, or `None` if the key is absent.
///
/// Section names match exactly; keys match case-insensitively. The value
/// is the remainder of the key line plus every following indented line,
/// with blank and comment lines skipped.
pub fn find_value(content: &str, section: &str, key: &str) -> Option<Vec<ValueLine>> {
    let key = key.to_lowercase();
    let mut in_section = false;
    let mut lines = content.lines().enumerate().peekable();

    while let Some((index, line)) = lines.next() {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_comment(trimmed) {
            continue;
        }
        if !is_indented(line) && trimmed.starts_with('[') && trimmed.ends_with(']') {
            in_section = &trimmed[1..trimmed.len() - 1] == section;
            continue;
        }
        if !in_section || is_indented(line) {
            continue;
        }
        let Some((name, rest)) = split_key(line) else {
            continue;
        };
        if name.trim().to_lowercase() != key {
            continue;
        }

        let mut values = Vec::new();
        let inline = rest.trim();
        if !inline.is_empty() {
            values.push(ValueLine {
                index,
                text: inline.to_string(),
                inline: true,
            });
        }
        while let Some(&(next_index, next)) = lines.peek() {
            let next_trimmed = next.trim();
            if next_trimmed.is_empty() {
                lines.next();
                continue;
            }
            if !is_indented(next) {
                break;
            }
            if !is_comment(next_trimmed) {
                values.push(ValueLine {
                    index: next_index,
                    text: next_trimmed.to_string(),
                    inline: false,
                });
            }
            lines.next();
        }
        return Some(values);
    }

    None
}

/// The key part of a key line up to and including its delimiter.
pub fn key_prefix(line: &str) -> Option<&str> {
    let pos = line.find(['=', ':'])?;
    Some(&line[..=pos])
}

fn split_key(line: &str) -> Option<(&str, &str)> {
    let pos = line.find(['=', ':'])?;
    Some((&line[..pos], &line[pos + 1..]))
}

fn is_indented(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with('#') || trimmed.starts_with(';')
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETUP_CFG: &str = "\
[metadata]
name = demo

[options]
packages = find:
install_requires =
    requests>=2.0
    # pinned for py38
    click

    rich
python_requires = >=3.8

[options.extras_require]
dev = pytest
";

    #[test]
    fn test_find_block_value() {
        let lines = find_value(SETUP_CFG, "options", "install_requires").unwrap();
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["requests>=2.0", "click", "rich"]);
        assert_eq!(lines[0].index, 6);
        assert!(!lines[0].inline);
    }

    #[test]
    fn test_inline_value() {
        let cfg = "[options]\nInstall_Requires = flask\n    jinja2\n";
        let lines = find_value(cfg, "options", "install_requires").unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].inline);
        assert_eq!(lines[0].text, "flask");
    }

    #[test]
    fn test_missing_section_or_key() {
        assert_eq!(find_value(SETUP_CFG, "tool", "install_requires"), None);
        assert_eq!(find_value(SETUP_CFG, "options", "zip_safe"), None);
    }

    #[test]
    fn test_key_prefix() {
        assert_eq!(key_prefix("install_requires = flask"), Some("install_requires ="));
        assert_eq!(key_prefix("no delimiter"), None);
    }
}
