//! Address header values (RFC 5322 §3.4) for header blocks.

use super::html::escape;

/// One mailbox from an address header.
///
/// # Examples
/// - `"Ana Pérez <ana@example.com>"` → `name = "Ana Pérez"`, `email = "ana@example.com"`
/// - `"ana@example.com"` → `name = ""`, `email = "ana@example.com"`
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Mailbox {
    pub name: String,
    pub email: String,
}

impl Mailbox {
    /// Parse a single mailbox. Unparseable input is kept whole as `email`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                return Self {
                    name: unquote(&trimmed[..open]),
                    email: trimmed[open + 1..close].trim().to_string(),
                };
            }
        }

        Self {
            name: String::new(),
            email: trimmed.to_string(),
        }
    }

    /// Split a header value on commas outside quotes and angle brackets.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut mailboxes = Vec::new();
        let mut current = String::new();
        let mut quoted = false;
        let mut bracketed = false;

        for ch in raw.chars() {
            match ch {
                '"' => quoted = !quoted,
                '<' if !quoted => bracketed = true,
                '>' if !quoted => bracketed = false,
                ',' if !quoted && !bracketed => {
                    push_mailbox(&mut mailboxes, &current);
                    current.clear();
                    continue;
                }
                _ => {}
            }
            current.push(ch);
        }
        push_mailbox(&mut mailboxes, &current);
        mailboxes
    }

    /// HTML for the mailbox: the name, linked to the address.
    pub fn to_html(&self) -> String {
        if self.email.is_empty() {
            return escape(&self.name);
        }
        let label = if self.name.is_empty() {
            escape(&self.email)
        } else {
            format!("{} &lt;{}&gt;", escape(&self.name), escape(&self.email))
        };
        if self.email.contains('@') {
            format!("<a href=\"mailto:{}\">{label}</a>", escape(&self.email))
        } else {
            label
        }
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.email)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

fn push_mailbox(mailboxes: &mut Vec<Mailbox>, raw: &str) {
    let mailbox = Mailbox::parse(raw);
    if !mailbox.email.is_empty() {
        mailboxes.push(mailbox);
    }
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(s)
        .trim()
        .to_string()
}

/// Render an address header value as linked mailboxes.
pub fn format_address_list(raw: &str) -> String {
    Mailbox::parse_list(raw)
        .iter()
        .map(Mailbox::to_html)
        .collect::<Vec<_>>()
        .join(", ")
}
