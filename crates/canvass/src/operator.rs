use async_trait::async_trait;
use canvass_engine::intervention::{InterventionPrompt, OperatorAborted, OperatorSignal};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Operator prompt on the terminal.
///
/// Each deferral prints the question to stderr and waits for a line on stdin.
/// Enter hands control back to the wrapped signal; `q`, `quit`, `abort` or
/// end of input stop the session.
pub struct ConsoleOperator<O> {
    inner: O,
    lines: Lines<BufReader<Stdin>>,
}

impl<O: OperatorSignal> ConsoleOperator<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

#[async_trait]
impl<O: OperatorSignal> OperatorSignal for ConsoleOperator<O> {
    async fn resume(&mut self, prompt: &InterventionPrompt) -> Result<(), OperatorAborted> {
        eprintln!();
        eprintln!(
            "Question {} needs you ({}): {}",
            prompt.question_index, prompt.reason, prompt.question
        );
        if let Some(detail) = &prompt.detail {
            eprintln!("  {}", detail);
        }
        eprint!("Answer it on the page, then press Enter (q to abort) > ");
        let _ = std::io::stderr().flush();

        match self.lines.next_line().await {
            Ok(Some(line)) => match line.trim() {
                "q" | "quit" | "abort" => Err(OperatorAborted),
                _ => self.inner.resume(prompt).await,
            },
            Ok(None) | Err(_) => Err(OperatorAborted),
        }
    }
}
