//! Minimal desktop entry reader
//!
//! Only the keys of the `[Desktop Entry]` group are read; localized keys and
//! actions are ignored.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

/// Field codes that expand to file arguments or icon/name data at launch time
static FIELD_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*%[fFuUdDnNickvm]").expect("field code pattern is a valid regex")
});

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesktopEntry {
    keys: HashMap<String, String>,
}

impl DesktopEntry {
    pub fn parse(contents: &str) -> Self {
        let mut keys = HashMap::new();
        let mut in_entry = false;
        for line in contents.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') {
                in_entry = line == "[Desktop Entry]";
                continue;
            }
            if !in_entry {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                keys.entry(key.trim().to_string())
                    .or_insert_with(|| value.trim().to_string());
            }
        }
        Self { keys }
    }

    pub async fn load(path: &Path) -> std::io::Result<Self> {
        Ok(Self::parse(&tokio::fs::read_to_string(path).await?))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.keys.get(key).map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.get("Name")
    }

    pub fn comment(&self) -> Option<&str> {
        self.get("Comment")
    }

    pub fn categories(&self) -> Vec<String> {
        self.get("Categories")
            .map(|value| {
                value
                    .split(';')
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The Exec line split into argv with field codes removed
    pub fn command(&self) -> Option<Vec<String>> {
        let exec = strip_field_codes(self.get("Exec")?);
        let argv = split_command_line(&exec);
        (!argv.is_empty()).then_some(argv)
    }
}

pub fn strip_field_codes(exec: &str) -> String {
    FIELD_CODE
        .replace_all(exec, "")
        .replace("%%", "%")
        .trim()
        .to_string()
}

/// Split on whitespace, honouring double quotes and backslash escapes
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_arg = false;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_arg = true;
            }
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                    has_arg = true;
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_arg {
                    args.push(std::mem::take(&mut current));
                    has_arg = false;
                }
            }
            c => {
                current.push(c);
                has_arg = true;
            }
        }
    }
    if has_arg {
        args.push(current);
    }
    args
}

/// Menu section shown for a main desktop category
pub fn menu_section(category: &str) -> Option<&'static str> {
    Some(match category {
        "AudioVideo" | "Audio" | "Video" => "Sound & Video",
        "Development" => "Developer Tools",
        "Education" => "Education",
        "Game" => "Games",
        "Graphics" => "Graphics",
        "Network" => "Internet",
        "Office" => "Office",
        "Science" => "Science",
        "Settings" => "Settings",
        "System" => "System",
        "Utility" => "Accessories",
        _ => return None,
    })
}
