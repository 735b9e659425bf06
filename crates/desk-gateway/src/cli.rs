//! Interactive console
//!
//! One terminal plays both sides of a call: plain lines are caller
//! questions, slash commands are supervisor actions. Questions run on a
//! background task so a supervisor can `/resolve` while the caller waits.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use desk_agent::{CallerVoice, Receptionist, SupervisorDesk, TurnOutcome};
use desk_core::{AnswerMatcher, KnowledgeRepository};
use nu_ansi_term::{Color, Style};
use reedline::{
    ColumnarMenu, Completer, DefaultHinter, Emacs, KeyCode, KeyModifiers, Keybindings, MenuBuilder,
    Prompt, PromptEditMode, PromptHistorySearch, Reedline, ReedlineEvent, ReedlineMenu, Signal,
    Suggestion,
};
use tracing::{error, info};

/// Available commands for autocomplete display
const COMMANDS: &[(&str, &str)] = &[
    ("/pending", "List unresolved help requests"),
    ("/resolve", "Answer a request: /resolve <id> <category> <answer...>"),
    ("/kb", "List knowledge base entries"),
    ("/help", "Show help"),
    ("/exit", "Quit"),
];

/// Command completer for reedline
#[derive(Clone)]
struct CommandCompleter {
    commands: Vec<(&'static str, &'static str)>,
}

impl CommandCompleter {
    fn new() -> Self {
        Self {
            commands: COMMANDS.to_vec(),
        }
    }
}

impl Completer for CommandCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        if !line.starts_with('/') {
            return Vec::new();
        }

        self.commands
            .iter()
            .filter(|(cmd, _)| cmd.starts_with(line))
            .map(|(cmd, desc)| Suggestion {
                value: cmd.to_string(),
                description: Some(desc.to_string()),
                extra: None,
                span: reedline::Span::new(0, pos),
                append_whitespace: true,
                style: None,
            })
            .collect()
    }
}

struct ColoredPrompt {
    style: Style,
}

impl Prompt for ColoredPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Owned(self.style.paint("desk> ").to_string())
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _prompt_mode: PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_history_search_indicator(&self, _history_search: PromptHistorySearch) -> Cow<'_, str> {
        Cow::Borrowed("")
    }
}

/// Prints agent speech to the terminal
pub struct ConsoleVoice {
    style: Style,
}

impl ConsoleVoice {
    pub fn new() -> Self {
        Self {
            style: Color::Green.bold(),
        }
    }
}

impl Default for ConsoleVoice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallerVoice for ConsoleVoice {
    async fn say(&self, text: &str) -> desk_core::Result<()> {
        println!("{} {}", self.style.paint("Agent:"), text);
        Ok(())
    }
}

/// Everything the console drives
pub struct Console {
    pub receptionist: Arc<Receptionist>,
    pub desk: SupervisorDesk,
    pub knowledge: Arc<KnowledgeRepository>,
    pub matcher: Arc<dyn AnswerMatcher>,
    pub threshold: f64,
}

/// A parsed console line
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Question(&'a str),
    Pending,
    Resolve {
        id: &'a str,
        category: &'a str,
        answer: &'a str,
    },
    Knowledge,
    Help,
    Exit,
    Usage(&'static str),
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    fn parse(input: &'a str) -> Self {
        if !input.starts_with('/') {
            return Self::Question(input);
        }

        let (name, rest) = input
            .split_once(char::is_whitespace)
            .map(|(name, rest)| (name, rest.trim()))
            .unwrap_or((input, ""));

        match name.to_lowercase().as_str() {
            "/pending" => Self::Pending,
            "/resolve" => {
                let mut parts = rest.splitn(3, char::is_whitespace);
                let id = parts.next().unwrap_or_default();
                let category = parts.next().unwrap_or_default();
                let answer = parts.next().unwrap_or_default().trim();
                if id.is_empty() || category.is_empty() || answer.is_empty() {
                    Self::Usage("/resolve <id> <category> <answer...>")
                } else {
                    Self::Resolve { id, category, answer }
                }
            }
            "/kb" => Self::Knowledge,
            "/help" | "/?" => Self::Help,
            "/exit" | "/quit" | "/q" => Self::Exit,
            _ => Self::Unknown(input),
        }
    }
}

/// Run the console until `/exit` or Ctrl-D
pub async fn run_console(console: Console) -> anyhow::Result<()> {
    print_welcome();
    console.receptionist.greet().await;

    let mut keybindings = default_keybindings();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Char('/'),
        ReedlineEvent::Edit(vec![reedline::EditCommand::InsertChar('/'), reedline::EditCommand::Complete]),
    );

    let menu = Box::new(
        ColumnarMenu::default()
            .with_name("command_menu")
            .with_columns(1)
            .with_column_width(Some(60))
            .with_only_buffer_difference(false),
    );
    let hinter = DefaultHinter::default().with_style(Style::new().dimmed());

    let mut line_editor = Reedline::create()
        .with_completer(Box::new(CommandCompleter::new()))
        .with_menu(ReedlineMenu::EngineCompleter(menu))
        .with_hinter(Box::new(hinter))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    let prompt = ColoredPrompt {
        style: Color::Cyan.bold(),
    };
    let mut calls = Vec::new();

    loop {
        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }

                match Command::parse(input) {
                    Command::Question(question) => {
                        calls.retain(|handle: &tokio::task::JoinHandle<()>| !handle.is_finished());
                        calls.push(spawn_question(Arc::clone(&console.receptionist), question.to_string()));
                    }
                    Command::Pending => print_pending(&console),
                    Command::Resolve { id, category, answer } => {
                        resolve(&console, id, category, answer).await;
                    }
                    Command::Knowledge => print_knowledge(&console),
                    Command::Help => print_help(),
                    Command::Exit => break,
                    Command::Usage(usage) => eprintln!("\nUsage: {}\n", usage),
                    Command::Unknown(input) => {
                        eprintln!("\nUnknown command: {}. Type /help for the command list.\n", input);
                    }
                }
            }
            Ok(Signal::CtrlC) => {
                println!("^C");
                continue;
            }
            Ok(Signal::CtrlD) => break,
            Err(err) => {
                eprintln!("\nError: {}\n", err);
                break;
            }
        }
    }

    for call in calls {
        call.abort();
    }
    println!("\n{}\n", console.receptionist.closing());
    Ok(())
}

fn spawn_question(receptionist: Arc<Receptionist>, question: String) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match receptionist.handle_question(&question).await {
            Ok(TurnOutcome::Answered(answer)) => {
                info!(entry_id = %answer.entry_id, "Answered from knowledge base");
            }
            Ok(TurnOutcome::Escalated(result)) => {
                info!(is_error = result.is_error, "Escalation: {}", result.output);
            }
            Err(e) => error!("Failed to handle question: {}", e),
        }
    })
}

async fn resolve(console: &Console, id: &str, category: &str, answer: &str) {
    let resolution = match console.desk.resolve(id, answer, category) {
        Ok(resolution) => resolution,
        Err(e) => {
            eprintln!("\nCould not resolve {}: {}\n", id, e);
            return;
        }
    };

    println!("\nResolved {}", resolution.request.id());
    println!("Text-back: {}", resolution.follow_up);
    if let Some(entry) = &resolution.learned {
        println!("Learned: {} -> {}", entry.question_text, entry.answer_text);
    }
    println!();

    match console
        .knowledge
        .load_base(Arc::clone(&console.matcher), console.threshold)
    {
        Ok(base) => console.receptionist.replace_knowledge(base).await,
        Err(e) => error!("Failed to reload knowledge base: {}", e),
    }
}

fn print_pending(console: &Console) {
    match console.desk.pending() {
        Ok(requests) if requests.is_empty() => println!("\nNo pending help requests.\n"),
        Ok(requests) => {
            println!();
            for request in requests {
                println!(
                    "  {}  {}  {}",
                    Color::Yellow.paint(request.id()),
                    request.received_at().format("%H:%M:%S"),
                    request.question_text()
                );
            }
            println!();
        }
        Err(e) => eprintln!("\nFailed to list help requests: {}\n", e),
    }
}

fn print_knowledge(console: &Console) {
    match console.knowledge.list_all() {
        Ok(entries) if entries.is_empty() => println!("\nKnowledge base is empty.\n"),
        Ok(entries) => {
            println!();
            for entry in entries {
                let category = entry.category.as_deref().unwrap_or("-");
                println!("  [{}] {}", category, Style::new().bold().paint(&entry.question_text));
                println!("      {}", entry.answer_text);
            }
            println!();
        }
        Err(e) => eprintln!("\nFailed to list knowledge base: {}\n", e),
    }
}

fn default_keybindings() -> Keybindings {
    let mut keybindings = Keybindings::new();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Enter, ReedlineEvent::Submit);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Esc, ReedlineEvent::Esc);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('c'), ReedlineEvent::CtrlC);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('d'), ReedlineEvent::CtrlD);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Up, ReedlineEvent::Up);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Down, ReedlineEvent::Down);
    keybindings
}

fn print_welcome() {
    println!();
    println!("desk-gateway console");
    println!("  Type a question to ask as the caller.");
    println!("  Supervisor commands: /pending, /resolve, /kb, /help, /exit");
    println!();
}

fn print_help() {
    println!();
    println!("Commands:");
    for (cmd, desc) in COMMANDS {
        println!("  {:<10} {}", cmd, desc);
    }
    println!();
    println!("Any other line is asked as the caller.");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_question() {
        assert_eq!(
            Command::parse("Do you do color treatments?"),
            Command::Question("Do you do color treatments?")
        );
    }

    #[test]
    fn test_resolve_keeps_answer_whitespace() {
        assert_eq!(
            Command::parse("/resolve abc-123 pricing Twenty dollars, cash only"),
            Command::Resolve {
                id: "abc-123",
                category: "pricing",
                answer: "Twenty dollars, cash only",
            }
        );
    }

    #[test]
    fn test_resolve_without_answer_shows_usage() {
        assert!(matches!(Command::parse("/resolve abc-123 pricing"), Command::Usage(_)));
        assert!(matches!(Command::parse("/resolve"), Command::Usage(_)));
    }

    #[test]
    fn test_commands_are_case_insensitive() {
        assert_eq!(Command::parse("/PENDING"), Command::Pending);
        assert_eq!(Command::parse("/kb"), Command::Knowledge);
        assert_eq!(Command::parse("/quit"), Command::Exit);
        assert_eq!(Command::parse("/nope"), Command::Unknown("/nope"));
    }

    #[test]
    fn test_completer_filters_by_prefix() {
        let mut completer = CommandCompleter::new();
        let suggestions = completer.complete("/re", 3);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].value, "/resolve");
        assert!(completer.complete("hello", 5).is_empty());
    }
}
