//! Telegram MarkdownV2 helpers.

const RESERVED: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Escapes every MarkdownV2 reserved character so `text` renders literally.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if RESERVED.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub fn bold(text: &str) -> String {
    format!("*{}*", escape(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_reserved() {
        assert_eq!(escape("T-Centralen"), r"T\-Centralen");
        assert_eq!(escape("a*b_c|d"), r"a\*b\_c\|d");
        assert_eq!(escape("St. Eriksplan (Stockholm)!"), r"St\. Eriksplan \(Stockholm\)\!");
        assert_eq!(escape(r"back\slash"), r"back\\slash");
        assert_eq!(escape("Odenplan 🚌"), "Odenplan 🚌");
    }

    #[test]
    fn every_reserved_char_is_preceded_by_backslash() {
        let escaped = escape(r"\_*[]()~`>#+-=|{}.!");
        let mut chars = escaped.chars();
        while let Some(c) = chars.next() {
            assert_eq!(c, '\\', "{}", escaped);
            let next = chars.next().unwrap();
            assert!(RESERVED.contains(&next), "{}", escaped);
        }
    }

    #[test]
    fn bold_wraps_escaped() {
        assert_eq!(bold("*Slussen*"), r"*\*Slussen\**");
    }
}
