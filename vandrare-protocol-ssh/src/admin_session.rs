//! Session command grammar (first-token-prefix match after word-split on
//! whitespace) and the admin evaluator's stdin-accumulation loop. Grounded on
//! `examples/original_source/internal/pattern/match.go` (`Prefix`/`Match`)
//! and `gateway/ssh/{admin.go,session.go}`.

use std::sync::Arc;

use rhai::{Engine, ParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Admin,
    Whoami,
    Refused,
}

const ADMIN_PREFIX: &[&str] = &["vandrare", "gateway", "ssh", "admin"];
const WHOAMI_PREFIX: &[&str] = &["vandrare", "whoami"];

/// Classifies an exec/shell command line.
pub fn classify_command(cmd: &str) -> SessionCommand {
    let tokens: Vec<&str> = cmd.split_whitespace().collect();
    if is_prefix(&tokens, ADMIN_PREFIX) {
        SessionCommand::Admin
    } else if is_prefix(&tokens, WHOAMI_PREFIX) {
        SessionCommand::Whoami
    } else {
        SessionCommand::Refused
    }
}

fn is_prefix(tokens: &[&str], prefix: &[&str]) -> bool {
    tokens.len() >= prefix.len() && tokens.iter().zip(prefix).all(|(a, b)| a == b)
}

/// Heuristic for "the accumulated script is merely incomplete, keep reading
/// more stdin" vs "this is a genuine syntax error, report it now". `rhai`'s
/// `ParseErrorType` has no single documented variant reserved for this (and
/// the crate isn't vendored anywhere in this workspace to consult directly),
/// so this keys off the rendered message naming end-of-input, the same
/// surface rhai's own REPL sample checks.
fn looks_incomplete(err: &ParseError) -> bool {
    let msg = err.to_string().to_ascii_lowercase();
    msg.contains("end of script") || msg.contains("end of input") || msg.contains("eof")
}

pub enum AdminOutcome {
    /// The buffer doesn't parse as a complete script yet; keep reading.
    NeedMoreInput,
    /// A complete script was evaluated; `Err` carries the message to write to
    /// stderr before terminating the session with exit code 1.
    Evaluated(Result<(), String>),
}

/// One admin session's evaluator state: the `rhai::Engine` (pre-wired with
/// `echo`/`keyset`/`tokenset` by `vandrare_core::admin::build_engine`) plus
/// the text accumulated so far.
pub struct AdminSession {
    engine: Arc<Engine>,
    buffer: String,
}

impl AdminSession {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
            buffer: String::new(),
        }
    }

    /// Feed one chunk of incoming stdin. Evaluation of a complete script runs
    /// on a blocking thread: the registered native functions call
    /// `vandrare_core::admin::block_on` internally, which is only safe off
    /// the async runtime's core worker threads.
    pub async fn feed(&mut self, chunk: &str) -> AdminOutcome {
        self.buffer.push_str(chunk);
        match self.engine.compile(&self.buffer) {
            Ok(ast) => {
                self.buffer.clear();
                let engine = self.engine.clone();
                let outcome = match tokio::task::spawn_blocking(move || {
                    engine.eval_ast::<rhai::Dynamic>(&ast).map(|_| ())
                })
                .await
                {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(eval_err)) => Err(eval_err.to_string()),
                    Err(join_err) => Err(format!("evaluator task failed: {join_err}")),
                };
                AdminOutcome::Evaluated(outcome)
            }
            Err(err) if looks_incomplete(&err) => AdminOutcome::NeedMoreInput,
            Err(err) => {
                self.buffer.clear();
                AdminOutcome::Evaluated(Err(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classifies_admin_prefix() {
        assert_eq!(
            classify_command("vandrare gateway ssh admin"),
            SessionCommand::Admin
        );
    }

    #[test]
    fn classifies_whoami_prefix() {
        assert_eq!(classify_command("vandrare whoami"), SessionCommand::Whoami);
    }

    #[test]
    fn refuses_unknown_commands() {
        assert_eq!(classify_command("sh"), SessionCommand::Refused);
        assert_eq!(classify_command(""), SessionCommand::Refused);
        assert_eq!(classify_command("vandrare"), SessionCommand::Refused);
    }

    #[tokio::test]
    async fn feed_waits_for_a_complete_script() {
        let engine = Engine::new();
        let mut session = AdminSession::new(engine);
        match session.feed("let x =").await {
            AdminOutcome::NeedMoreInput => {}
            AdminOutcome::Evaluated(_) => panic!("expected more input to be requested"),
        }
        match session.feed(" 1;").await {
            AdminOutcome::Evaluated(Ok(())) => {}
            _ => panic!("expected a successful evaluation"),
        }
    }

    #[tokio::test]
    async fn feed_reports_genuine_syntax_errors() {
        let engine = Engine::new();
        let mut session = AdminSession::new(engine);
        match session.feed(")));;;(((").await {
            AdminOutcome::Evaluated(Err(_)) => {}
            _ => panic!("expected a syntax error"),
        }
    }
}
