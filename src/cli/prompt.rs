use archive_renamer::Confirm;
use console::Term;
use std::io;
use tracing::error;

/// Yes/no on the terminal. Anything unreadable counts as no.
pub struct ConsolePrompt {
    term: Term,
}

impl ConsolePrompt {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }

    pub fn ask(&self, prompt: &str, default: Option<bool>) -> io::Result<bool> {
        let hint = match default {
            Some(true) => "(Y/n)",
            Some(false) | None => "(y/N)",
        };

        loop {
            self.term.write_str(&format!("{} {}: ", prompt, hint))?;
            let input = self.term.read_line()?;

            match input.trim().to_uppercase().as_str() {
                "Y" | "YES" => return Ok(true),
                "N" | "NO" => return Ok(false),
                "" => match default {
                    Some(default) => return Ok(default),
                    None => continue,
                },
                _ => continue,
            }
        }
    }
}

impl Confirm for ConsolePrompt {
    fn confirm(&self, question: &str) -> bool {
        match self.ask(question, Some(false)) {
            Ok(answer) => answer,
            Err(e) => {
                error!("Cannot read answer: {}", e);
                false
            }
        }
    }
}
