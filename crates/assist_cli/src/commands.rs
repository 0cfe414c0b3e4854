use assist_session::DetailLevel;

pub const HELP: &str = "\
/run                 execute the current code
/explain [level]     explain the current code (basic, medium, detailed)
/apply <n>           replace the code with suggestion n
/reset               clear the code buffer
/status              print the session state as JSON
/help                show this help
/quit                end the session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run,
    Explain(Option<DetailLevel>),
    Apply(usize),
    Reset,
    Status,
    Help,
    Quit,
    Invalid(String),
}

/// Parses a slash command. Returns `None` for lines that are code.
pub fn parse_command(input: &str) -> Option<Command> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut words = trimmed.split_whitespace();
    let name = words.next().unwrap_or(trimmed);
    let argument = words.next();

    let parsed = match (name, argument) {
        ("/run", None) => Command::Run,
        ("/explain", None) => Command::Explain(None),
        ("/explain", Some(level)) => match DetailLevel::parse(level) {
            Some(level) => Command::Explain(Some(level)),
            None => Command::Invalid(format!("unknown detail level '{level}'")),
        },
        ("/apply", Some(index)) => match index.parse::<usize>() {
            Ok(index) if index > 0 => Command::Apply(index),
            _ => Command::Invalid(format!("'{index}' is not a suggestion number")),
        },
        ("/apply", None) => Command::Invalid("/apply needs a suggestion number".to_string()),
        ("/reset", None) => Command::Reset,
        ("/status", None) => Command::Status,
        ("/help", None) => Command::Help,
        ("/quit", None) => Command::Quit,
        _ => Command::Invalid(format!("unknown command '{trimmed}'")),
    };

    Some(parsed)
}

/// Appends one input line to the code buffer.
pub fn append_line(code: &str, line: &str) -> String {
    let mut next = String::with_capacity(code.len() + line.len() + 1);
    next.push_str(code);
    next.push_str(line);
    next.push('\n');
    next
}
