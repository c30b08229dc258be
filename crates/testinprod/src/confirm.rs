use std::{
    cell::RefCell,
    collections::VecDeque,
    fmt,
    io::{self, BufRead as _, Write as _},
    rc::Rc,
};

/// A question/answer channel used to confirm generated test cases.
pub trait Prompt {
    /// Shows `question` and returns the raw answer.
    ///
    /// End of input is reported as an [`io::ErrorKind::UnexpectedEof`] error.
    fn ask(&mut self, question: &str) -> io::Result<String>;
}

/// Asks on stdout and reads answers line by line from stdin.
#[derive(Debug, Default)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(question.as_bytes())?;
        stdout.flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
        }
        Ok(line)
    }
}

/// A `Prompt` that replays queued answers and remembers the questions asked.
///
/// Runs out as end of input, which the confirmation loop treats as a reject.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    questions: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            questions: Vec::new(),
        }
    }

    #[must_use]
    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    /// Answers not consumed yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompt for ScriptedPrompt {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        self.questions.push(question.to_owned());
        self.answers
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted answers left"))
    }
}

impl<P: Prompt> Prompt for Rc<RefCell<P>> {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        self.borrow_mut().ask(question)
    }
}

/// Failure of the confirmation channel.
#[derive(Debug)]
pub enum ConfirmError {
    /// The channel reported an error or ran out of input.
    Channel(io::Error),
}

impl fmt::Display for ConfirmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(error) => write!(f, "confirmation channel failed: {error}"),
        }
    }
}

impl std::error::Error for ConfirmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Channel(error) => Some(error),
        }
    }
}

impl From<io::Error> for ConfirmError {
    fn from(error: io::Error) -> Self {
        Self::Channel(error)
    }
}

/// Asks whether `preview` should be kept until the answer is a clear yes or no.
///
/// Answers are trimmed and compared case-insensitively (`y`, `yes`, `n`, `no`); anything
/// else asks again.
pub fn confirm(prompt: &mut dyn Prompt, preview: &str) -> Result<bool, ConfirmError> {
    let mut question = format!("{preview}\nKeep this test case? [y/n] ");
    loop {
        let answer = prompt.ask(&question)?;
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            other => {
                tracing::debug!(answer = other, "unrecognized confirmation answer");
                question = "Please answer 'y' or 'n': ".to_owned();
            }
        }
    }
}
