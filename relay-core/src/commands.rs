// ABOUTME: Command front-end: quote-aware tokenizer and job argument parsing.
// ABOUTME: Parse errors carry complete user-facing text; processors reply with it verbatim.

use relay_jobs::{JobArgs, JobCatalog};
use thiserror::Error;

/// Unicode Quotation_Mark code points
const QUOTATION_MARKS: &[char] = &[
    '\u{0022}', '\u{0027}', '\u{00AB}', '\u{00BB}', '\u{2018}', '\u{2019}', '\u{201A}',
    '\u{201B}', '\u{201C}', '\u{201D}', '\u{201E}', '\u{201F}', '\u{2039}', '\u{203A}',
    '\u{2E42}', '\u{300C}', '\u{300D}', '\u{300E}', '\u{300F}', '\u{301D}', '\u{301E}',
    '\u{301F}', '\u{FE41}', '\u{FE42}', '\u{FE43}', '\u{FE44}', '\u{FF02}', '\u{FF07}',
    '\u{FF62}', '\u{FF63}',
];

fn is_quotation_mark(c: char) -> bool {
    QUOTATION_MARKS.contains(&c)
}

/// Split `text` on runs of whitespace.
///
/// A quotation mark opens a literal span that ends at the next occurrence of
/// the same mark; whitespace inside the span does not split, and the marks
/// stay in the token. There is no escaping: a mark cannot appear inside a
/// span opened by the same mark. An unterminated span runs to the end.
///
/// ```
/// use relay_core::commands::tokenize;
///
/// assert_eq!(tokenize(r#"a "b c" d"#), vec!["a", "\"b c\"", "d"]);
/// assert!(tokenize("").is_empty());
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut open_quote: Option<char> = None;

    for c in text.chars() {
        match open_quote {
            Some(q) if c == q => open_quote = None,
            Some(_) => {}
            None if is_quotation_mark(c) => open_quote = Some(c),
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                continue;
            }
            None => {}
        }
        current.push(c);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Remove the first token equal to `word`
fn remove_word(tokens: &mut Vec<String>, word: &str) {
    if let Some(index) = tokens.iter().position(|t| t == word) {
        tokens.remove(index);
    }
}

/// Failure to turn a command into a job invocation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("You must specify, at least, one job. You can use `list` to get a list of defined jobs and `describe <job>` to get all details about a job")]
    MissingJob,
    #[error("The job `{0}` doesn't exist in current job list. If it's new addition, try using `reload` to refresh the list of jobs")]
    UnknownJob(String),
}

/// A command resolved against the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// First positional token
    pub job: String,
    /// Remaining positional tokens
    pub options: Vec<String>,
    /// `key=value` tokens; the last write wins on duplicate keys
    pub args: JobArgs,
}

/// Parse `text` as `<command> <job> [key=value ...] [positional ...]`.
///
/// The first token equal to `command` is discarded. Tokens containing `=`
/// are split once on the first `=`; everything else is positional.
pub fn parse_args(
    text: &str,
    command: &str,
    catalog: &JobCatalog,
) -> Result<ParsedCommand, CommandError> {
    let mut tokens = tokenize(text);
    remove_word(&mut tokens, command);

    let mut args = JobArgs::new();
    let mut positional = Vec::new();
    for token in tokens {
        match token.split_once('=') {
            Some((key, value)) => {
                args.insert(key.to_string(), value.to_string());
            }
            None => positional.push(token),
        }
    }

    let mut positional = positional.into_iter();
    let job = positional.next().ok_or(CommandError::MissingJob)?;
    if !catalog.contains(&job) {
        return Err(CommandError::UnknownJob(job));
    }

    Ok(ParsedCommand {
        job,
        options: positional.collect(),
        args,
    })
}
