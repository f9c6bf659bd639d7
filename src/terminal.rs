//! Line-oriented terminal rendering for the chat prompt.

use std::io::{self, Write};

use crossterm::{
    cursor::MoveLeft,
    queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};

use crate::config::ColorConfig;
use crate::message::{Message, Role, PENDING_PLACEHOLDER};

/// Foreground color for a role.
pub fn role_color(colors: &ColorConfig, role: Role) -> Color {
    let rgb = match role {
        Role::User => &colors.user,
        Role::Assistant => &colors.assistant,
        Role::System => &colors.system,
    };
    ColorConfig::to_color(rgb)
}

/// A line typed at the chat prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptInput<'a> {
    Empty,
    Quit,
    ShowModel,
    SwitchModel(&'a str),
    Text(&'a str),
}

/// Classify a prompt line. Commands must match whole words, so `/models`
/// is sent as text.
pub fn parse_prompt(line: &str) -> PromptInput<'_> {
    let input = line.trim();
    match input {
        "" => PromptInput::Empty,
        "/quit" | "/exit" => PromptInput::Quit,
        "/model" => PromptInput::ShowModel,
        _ => match input.strip_prefix("/model ") {
            Some(model) => PromptInput::SwitchModel(model.trim()),
            None => PromptInput::Text(input),
        },
    }
}

/// Print a whole message on its own line. Chat turns carry their time.
///
/// `incoming` marks the reply still being assembled, which renders as the
/// pending placeholder while empty.
pub fn print_message<W: Write>(
    out: &mut W,
    colors: &ColorConfig,
    message: &Message,
    incoming: bool,
) -> io::Result<()> {
    queue!(
        out,
        SetForegroundColor(role_color(colors, message.role)),
        Print(message.role.prefix()),
        ResetColor,
        Print(message.display_content(incoming)),
    )?;
    if message.role == Role::System {
        queue!(out, Print("\n"))?;
    } else {
        print_time(out, colors, message)?;
    }
    out.flush()
}

/// Print a line in the error color.
pub fn print_error<W: Write>(out: &mut W, colors: &ColorConfig, text: &str) -> io::Result<()> {
    queue!(
        out,
        SetForegroundColor(ColorConfig::to_color(&colors.error)),
        Print(text),
        ResetColor,
        Print("\n"),
    )?;
    out.flush()
}

fn print_time<W: Write>(out: &mut W, colors: &ColorConfig, message: &Message) -> io::Result<()> {
    queue!(
        out,
        SetForegroundColor(ColorConfig::to_color(&colors.system)),
        Print(format!("  {}", message.time_label())),
        ResetColor,
        Print("\n"),
    )
}

/// Renders one assistant reply as it grows.
///
/// Each update renders the in-flight message the way the view shows it:
/// the pending placeholder while it is empty and loading, and only the
/// newly appended text after that.
pub struct ReplyPrinter<'a, W: Write> {
    out: W,
    colors: &'a ColorConfig,
    printed: usize,
    placeholder: bool,
    last: Option<Message>,
    error: Option<io::Error>,
}

impl<'a, W: Write> ReplyPrinter<'a, W> {
    pub fn start(mut out: W, colors: &'a ColorConfig) -> io::Result<Self> {
        queue!(
            out,
            SetForegroundColor(role_color(colors, Role::Assistant)),
            Print(Role::Assistant.prefix()),
            ResetColor,
        )?;
        out.flush()?;
        Ok(Self {
            out,
            colors,
            printed: 0,
            placeholder: false,
            last: None,
            error: None,
        })
    }

    /// Show the current state of the in-flight message.
    pub fn update(&mut self, message: &Message, incoming: bool) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.render(message, incoming) {
            self.error = Some(e);
        }
        self.last = Some(message.clone());
    }

    fn render(&mut self, message: &Message, incoming: bool) -> io::Result<()> {
        if message.content.is_empty() {
            if message.display_content(incoming) == PENDING_PLACEHOLDER && !self.placeholder {
                queue!(self.out, Print(PENDING_PLACEHOLDER))?;
                self.placeholder = true;
            }
            return self.out.flush();
        }

        self.erase_placeholder()?;

        // Content only ever grows by appending.
        let content = &message.content;
        let suffix = content.get(self.printed..).unwrap_or(content);
        queue!(self.out, Print(suffix))?;
        self.printed = content.len();
        self.out.flush()
    }

    fn erase_placeholder(&mut self) -> io::Result<()> {
        if self.placeholder {
            let width = PENDING_PLACEHOLDER.chars().count() as u16;
            queue!(self.out, MoveLeft(width), Clear(ClearType::UntilNewLine))?;
            self.placeholder = false;
        }
        Ok(())
    }

    /// End the reply line, reporting any write error seen while streaming.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.erase_placeholder()?;
        match self.last.take() {
            Some(message) if self.printed > 0 => print_time(&mut self.out, self.colors, &message)?,
            _ => queue!(self.out, Print("\n"))?,
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    #[test]
    fn test_reply_printer_writes_only_new_text() {
        let colors = ColorConfig::default();
        let mut printer = ReplyPrinter::start(Vec::new(), &colors).unwrap();

        let mut message = Message::assistant("");
        printer.update(&message, true);
        message.content = "Hel".to_string();
        printer.update(&message, true);
        message.content = "Hello".to_string();
        printer.update(&message, true);

        let out = text(&printer.finish().unwrap());
        assert!(out.contains("Assistant: "));
        assert_eq!(out.matches(PENDING_PLACEHOLDER).count(), 1);
        assert_eq!(out.matches("Hel").count(), 1);
        assert!(out.contains("Hello"));
        assert!(out.contains(&message.time_label()));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_reply_printer_no_placeholder_when_not_loading() {
        let colors = ColorConfig::default();
        let mut printer = ReplyPrinter::start(Vec::new(), &colors).unwrap();

        printer.update(&Message::assistant(""), false);

        let out = text(&printer.finish().unwrap());
        assert!(!out.contains(PENDING_PLACEHOLDER));
    }

    #[test]
    fn test_print_message_uses_prefix_and_time() {
        let colors = ColorConfig::default();
        let mut out = Vec::new();
        let message = Message::user("hi");
        print_message(&mut out, &colors, &message, false).unwrap();
        let out = text(&out);
        assert!(out.contains("You: "));
        assert!(out.contains("hi"));
        assert!(out.contains(&message.time_label()));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_system_lines_have_no_time() {
        let colors = ColorConfig::default();
        let mut out = Vec::new();
        let message = Message::system("Connected.");
        print_message(&mut out, &colors, &message, false).unwrap();
        let out = text(&out);
        assert!(out.contains("System: Connected."));
        assert!(!out.contains(&message.time_label()));
    }

    #[test]
    fn test_parse_prompt_commands() {
        assert_eq!(parse_prompt("   "), PromptInput::Empty);
        assert_eq!(parse_prompt("/quit"), PromptInput::Quit);
        assert_eq!(parse_prompt(" /exit "), PromptInput::Quit);
        assert_eq!(parse_prompt("/model"), PromptInput::ShowModel);
        assert_eq!(parse_prompt("/model   "), PromptInput::ShowModel);
        assert_eq!(
            parse_prompt("/model  openai/gpt-4o "),
            PromptInput::SwitchModel("openai/gpt-4o")
        );
        assert_eq!(parse_prompt("hello"), PromptInput::Text("hello"));
    }

    #[test]
    fn test_parse_prompt_model_prefix_is_not_a_command() {
        assert_eq!(parse_prompt("/models"), PromptInput::Text("/models"));
        assert_eq!(parse_prompt("/modelx y"), PromptInput::Text("/modelx y"));
    }

    #[test]
    fn test_print_message_incoming_empty_shows_placeholder() {
        let colors = ColorConfig::default();
        let mut out = Vec::new();
        print_message(&mut out, &colors, &Message::assistant(""), true).unwrap();
        assert!(text(&out).contains(PENDING_PLACEHOLDER));
    }
}
