//! Interactive shell.
//!
//! Reads one command per line through a line editor with history and
//! prints the rendered page. A bad line or a failed command is reported
//! and the loop carries on; Ctrl-C discards the current line, and only
//! end of input or `exit` ends the session.

use crate::cli::{Command, ShellLine};
use crate::commands::dispatch;
use crate::report::render;
use crate::session::Session;
use anyhow::{Context, Result};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;
use tracing::{debug, error};

const PROMPT: &str = "protmass> ";

/// What one input line asks for.
#[derive(Debug, PartialEq)]
enum Input {
    Empty,
    Exit,
    /// Help text or a parse error, printed as is.
    Message(String),
    Run(Command),
}

/// Split a line into words. Single or double quotes group words with
/// spaces; there are no escapes.
fn split_line(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(format!("Unterminated {} quote", q));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

fn interpret(line: &str) -> Input {
    let words = match split_line(line) {
        Ok(words) => words,
        Err(e) => return Input::Message(e),
    };

    match words.first().map(String::as_str) {
        None => return Input::Empty,
        Some("exit") | Some("quit") => return Input::Exit,
        _ => {}
    }

    match ShellLine::try_parse_from(words) {
        Ok(parsed) => match parsed.command.validate() {
            Ok(()) => Input::Run(parsed.command),
            Err(e) => Input::Message(format!("Error: {}", e)),
        },
        Err(e) => Input::Message(e.to_string()),
    }
}

/// One read from the prompt.
#[derive(Debug, PartialEq)]
enum LineRead {
    Line(String),
    Interrupted,
    Eof,
}

/// Where shell lines come from.
trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Result<LineRead>;
    fn remember(&mut self, line: &str);
}

impl LineSource for DefaultEditor {
    fn read_line(&mut self, prompt: &str) -> Result<LineRead> {
        // Keep the runtime free for the archive preload while we block.
        match tokio::task::block_in_place(|| self.readline(prompt)) {
            Ok(line) => Ok(LineRead::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(LineRead::Interrupted),
            Err(ReadlineError::Eof) => Ok(LineRead::Eof),
            Err(e) => Err(e).context("Failed to read a line"),
        }
    }

    fn remember(&mut self, line: &str) {
        if let Err(e) = self.add_history_entry(line) {
            debug!("History entry dropped: {}", e);
        }
    }
}

/// Run the shell until end of input.
pub async fn run(session: &Session) -> Result<()> {
    let mut editor = DefaultEditor::new().context("Failed to start the line editor")?;
    println!("protmass shell. Type 'help' for commands, 'exit' to quit.");
    run_with(session, &mut editor, &mut std::io::stdout()).await
}

async fn run_with<S, W>(session: &Session, source: &mut S, out: &mut W) -> Result<()>
where
    S: LineSource,
    W: Write,
{
    let format = session.config.output.format;

    loop {
        let line = match source.read_line(PROMPT)? {
            LineRead::Line(line) => line,
            LineRead::Interrupted => continue,
            LineRead::Eof => break,
        };
        if !line.trim().is_empty() {
            source.remember(&line);
        }

        match interpret(&line) {
            Input::Empty => continue,
            Input::Exit => break,
            Input::Message(message) => writeln!(out, "{}", message.trim_end())?,
            Input::Run(command) => {
                debug!("Shell command: {:?}", command);
                let page = dispatch(session, &command).await;
                match render(&page, format) {
                    Ok(output) => writeln!(out, "{}", output)?,
                    Err(e) => error!("Failed to render page: {:#}", e),
                }
            }
        }
    }

    out.flush().context("Failed to flush output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ArchivePreload, ArchiveState};

    #[test]
    fn test_split_line() {
        assert_eq!(split_line("  ratio P1   P2 ").unwrap(), vec!["ratio", "P1", "P2"]);
        assert_eq!(
            split_line("compartment \"cell periphery\" P1").unwrap(),
            vec!["compartment", "cell periphery", "P1"]
        );
        assert_eq!(split_line("search ''").unwrap(), vec!["search", ""]);
        assert!(split_line("search 'YAL").is_err());
        assert!(split_line("").unwrap().is_empty());
    }

    #[test]
    fn test_interpret() {
        assert_eq!(interpret("   "), Input::Empty);
        assert_eq!(interpret("quit"), Input::Exit);
        assert_eq!(interpret("about"), Input::Run(Command::About));
        assert_eq!(
            interpret("distribution P1 P2"),
            Input::Run(Command::Distribution {
                condition: "P1".to_string(),
                second: Some("P2".to_string()),
            })
        );
        assert!(matches!(interpret("frobnicate"), Input::Message(_)));
        assert!(matches!(interpret("overview --rows 0"), Input::Message(_)));
        assert!(matches!(interpret("help"), Input::Message(_)));
    }

    struct Scripted {
        reads: std::collections::VecDeque<LineRead>,
        history: Vec<String>,
    }

    impl Scripted {
        fn new(reads: Vec<LineRead>) -> Self {
            Self {
                reads: reads.into(),
                history: Vec::new(),
            }
        }
    }

    impl LineSource for Scripted {
        fn read_line(&mut self, _prompt: &str) -> Result<LineRead> {
            Ok(self.reads.pop_front().unwrap_or(LineRead::Eof))
        }

        fn remember(&mut self, line: &str) {
            self.history.push(line.to_string());
        }
    }

    fn line(text: &str) -> LineRead {
        LineRead::Line(text.to_string())
    }

    fn test_session(dir: &tempfile::TempDir) -> Session {
        let mut config = crate::config::Config::default();
        config.output.dir = dir.path().join("charts");
        Session::from_parts(
            config,
            crate::models::fixtures::dataset(),
            ArchivePreload::settled(ArchiveState::Loading),
        )
    }

    #[tokio::test]
    async fn test_failures_keep_the_shell_running() {
        let dir = tempfile::TempDir::new().unwrap();
        let session = test_session(&dir);
        let mut source = Scripted::new(vec![
            line("compartment golgi P1"),
            line("frobnicate"),
            LineRead::Interrupted,
            line(""),
            line("about"),
            line("exit"),
            line("about"),
        ]);
        let mut out = Vec::new();

        run_with(&session, &mut source, &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("The compartment 'golgi' was not found."));
        assert_eq!(out.matches("# About Us").count(), 1);
        assert_eq!(
            source.history,
            vec!["compartment golgi P1", "frobnicate", "about", "exit"]
        );
        // The line after exit was never read.
        assert_eq!(source.reads.len(), 1);
    }

    #[tokio::test]
    async fn test_end_of_input_ends_the_shell() {
        let dir = tempfile::TempDir::new().unwrap();
        let session = test_session(&dir);
        let mut source = Scripted::new(vec![LineRead::Eof, line("about")]);
        let mut out = Vec::new();

        run_with(&session, &mut source, &mut out).await.unwrap();

        assert!(out.is_empty());
        assert_eq!(source.reads.len(), 1);
    }
}
