//! Line-buffered driver for the external morphological analyzer.
//!
//! Half-duplex: one input line produces token lines terminated by `EOS`.
//! The analyzer (mecab by default) stays alive for the whole ingest run.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use anyhow::{Context, Result, bail};

use kioku_core::tokenizer::{END_OF_SENTENCE, Token, parse_analysis_line};

pub struct Analyzer {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Analyzer {
    /// Spawn the analyzer. `command` is whitespace-split so flags like
    /// `mecab -d /path/to/dic` work.
    pub fn spawn(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .context("analyzer command must not be empty")?;
        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn analyzer '{command}'"))?;
        let stdin = child.stdin.take().context("analyzer stdin unavailable")?;
        let stdout = child.stdout.take().context("analyzer stdout unavailable")?;
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    /// Feed one sentence and collect its tokens. Blank output lines are
    /// tolerated; anything else that fails to parse aborts the sentence.
    pub fn analyze(&mut self, sentence: &str) -> Result<Vec<Token>> {
        writeln!(self.stdin, "{sentence}").context("failed to write to analyzer")?;
        self.stdin.flush().context("failed to flush analyzer input")?;

        let mut tokens = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .stdout
                .read_line(&mut line)
                .context("failed to read analyzer output")?;
            if read == 0 {
                bail!("analyzer closed its output mid-sentence");
            }
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                continue;
            }
            if line == END_OF_SENTENCE {
                return Ok(tokens);
            }
            tokens.push(parse_analysis_line(line)?);
        }
    }
}

impl Drop for Analyzer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
