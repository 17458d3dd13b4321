/// What a line typed at the `You:` prompt asks the session to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    Exit,
    Blank,
    Message(String),
}

/// `exit` and `quit` end the session in any letter case.
pub fn parse_input_line(input: &str) -> InputCommand {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return InputCommand::Blank;
    }

    if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        return InputCommand::Exit;
    }

    InputCommand::Message(input.trim_end_matches(['\r', '\n']).to_string())
}
