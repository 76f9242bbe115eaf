//! Line-buffered editor surface for the REPL

/// The program shown when the playground first opens
pub const SAMPLE_PROGRAM: &str = r#"kaj ghumano(nayok)
show(nayok + " is sleeping!")
sesh

ghumano("Palash");
"#;

/// Source text being edited
#[derive(Debug, Default)]
pub struct SourceBuffer {
    lines: Vec<String>,
}

impl SourceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    /// Replace the buffer with `text`
    pub fn load(&mut self, text: &str) {
        self.lines = text.lines().map(str::to_string).collect();
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Current source text, newline-terminated
    pub fn source(&self) -> String {
        let mut text = self.lines.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        text
    }

    /// Source with a right-aligned line-number gutter
    pub fn numbered(&self) -> String {
        let width = self.lines.len().to_string().len();
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{:>width$} | {}\n", i + 1, line, width = width))
            .collect()
    }
}

/// A line typed at the REPL prompt
#[derive(Debug, PartialEq, Eq)]
pub enum ReplInput<'a> {
    Run,
    Clear,
    Show,
    Sample,
    Help,
    Quit,
    Unknown(&'a str),
    Source(&'a str),
}

impl<'a> ReplInput<'a> {
    pub fn parse(line: &'a str) -> Self {
        let Some(command) = line.trim().strip_prefix(':') else {
            return ReplInput::Source(line);
        };
        match command.trim() {
            "run" | "r" => ReplInput::Run,
            "clear" | "c" => ReplInput::Clear,
            "show" | "s" => ReplInput::Show,
            "sample" => ReplInput::Sample,
            "help" | "h" | "?" => ReplInput::Help,
            "quit" | "q" | "exit" => ReplInput::Quit,
            other => ReplInput::Unknown(other),
        }
    }
}

pub const REPL_HELP: &str = "\
Type source lines, then:
  :run     run the buffer
  :show    print the buffer with line numbers
  :clear   empty the buffer
  :sample  load the sample program
  :quit    leave
";
