// src/process/output.rs

//! Captured output of a managed process.

/// Which pipe a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub fn as_str(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

/// One scrubbed chunk (a line, newline included) in the combined buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub stream: Stream,
    pub text: String,
}

/// Events published by a managed process.
///
/// `Closed` is always the last event and is only sent after every chunk read
/// from the pipes has been published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Stdout(String),
    Stderr(String),
    /// Terminal event with the final exit code.
    Closed { exit_code: i32 },
}

/// Ordered stdout, stderr and combined buffers.
///
/// Per-stream order is OS delivery order. The combined order is the order in
/// which the two pipe readers got to append, which is not necessarily the
/// order the child wrote in.
#[derive(Debug, Default, Clone)]
pub struct OutputBuffers {
    stdout: Vec<String>,
    stderr: Vec<String>,
    combined: Vec<OutputChunk>,
}

impl OutputBuffers {
    pub(crate) fn push(&mut self, stream: Stream, text: &str) {
        match stream {
            Stream::Stdout => self.stdout.push(text.to_string()),
            Stream::Stderr => self.stderr.push(text.to_string()),
        }
        self.combined.push(OutputChunk {
            stream,
            text: text.to_string(),
        });
    }

    pub fn stdout_chunks(&self) -> &[String] {
        &self.stdout
    }

    pub fn stderr_chunks(&self) -> &[String] {
        &self.stderr
    }

    pub fn combined_chunks(&self) -> &[OutputChunk] {
        &self.combined
    }

    pub fn stdout(&self) -> String {
        self.stdout.concat()
    }

    pub fn stderr(&self) -> String {
        self.stderr.concat()
    }

    pub fn combined(&self) -> String {
        self.combined.iter().map(|c| c.text.as_str()).collect()
    }

    pub(crate) fn stdout_contains(&self, partial: &str) -> bool {
        self.stdout.iter().any(|chunk| chunk.contains(partial))
    }
}
