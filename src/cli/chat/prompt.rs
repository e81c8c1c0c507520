use rustyline::{Config, Editor, Result};

use crate::conversation::SessionState;

pub fn generate_prompt(state: &SessionState, attachment_staged: bool) -> String {
    let mut prompt = String::new();
    if state.is_speaking {
        prompt.push_str("[speaking] ");
    }
    if attachment_staged {
        prompt.push_str("[image] ");
    }
    prompt.push_str("> ");
    prompt
}

pub fn rl() -> Result<Editor<()>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(rustyline::CompletionType::List)
        .build();
    Editor::with_config(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_reflects_state() {
        let mut state = SessionState::default();
        assert_eq!(generate_prompt(&state, false), "> ");

        state.is_speaking = true;
        assert_eq!(generate_prompt(&state, true), "[speaking] [image] > ");
    }
}
