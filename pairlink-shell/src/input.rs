//! Line commands read from stdin.
//!
//! Plain lines are typed at the caret. Lines starting with `:` are commands;
//! `::text` types a literal `:text`.

use pairlink_assist::Key;

/// Language tags offered by the editor.
pub const SUPPORTED_LANGUAGES: &[&str] = &["python", "javascript", "typescript", "java", "cpp"];

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Type(String),
    Newline,
    Key(Key),
    Goto(usize),
    Click { x: f64, y: f64 },
    Language(String),
    Show,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
    if line.is_empty() {
        return Input::Empty;
    }
    if let Some(literal) = line.strip_prefix("::") {
        return Input::Type(format!(":{literal}"));
    }
    let Some(command) = line.strip_prefix(':') else {
        return Input::Type(line.to_string());
    };

    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();
    match (name, args.as_slice()) {
        ("up", []) => Input::Key(Key::ArrowUp),
        ("down", []) => Input::Key(Key::ArrowDown),
        ("tab", []) => Input::Key(Key::Tab),
        ("enter", []) => Input::Key(Key::Enter),
        ("esc", []) => Input::Key(Key::Escape),
        ("nl", []) => Input::Newline,
        ("show", []) => Input::Show,
        ("help", []) => Input::Help,
        ("quit", []) | ("q", []) => Input::Quit,
        ("goto", [offset]) => match offset.parse() {
            Ok(offset) => Input::Goto(offset),
            Err(_) => Input::Unknown(line.to_string()),
        },
        ("click", [x, y]) => match (x.parse(), y.parse()) {
            (Ok(x), Ok(y)) => Input::Click { x, y },
            _ => Input::Unknown(line.to_string()),
        },
        ("lang", [tag]) if SUPPORTED_LANGUAGES.contains(tag) => Input::Language(tag.to_string()),
        _ => Input::Unknown(line.to_string()),
    }
}

pub const HELP: &str = "\
commands:
  <text>          type text at the caret
  ::<text>        type text starting with ':'
  :nl             insert a newline
  :up :down       move the suggestion selection
  :tab :enter     accept the suggestion (Tab indents when no popup)
  :esc            dismiss suggestions
  :goto <n>       move the caret to character offset n
  :click <x> <y>  click at viewport pixels
  :lang <tag>     python | javascript | typescript | java | cpp
  :show           print the buffer
  :quit           leave the room";
