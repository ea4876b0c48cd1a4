use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, MenuOption, Screen, ThemeOption};
use crate::provider;
use crate::theme::{color_name, to_color, Theme};
use crate::transcript::ChatRole;

fn screen_title(screen: Screen) -> &'static str {
    match screen {
        Screen::MainMenu => "Main Menu",
        Screen::ProviderSelect => "Select Provider",
        Screen::ModelSelect => "Select Model",
        Screen::ApiKeyInput => "Set API Key",
        Screen::Chat => "Chat",
        Screen::SystemMessageEdit => "System Message",
        Screen::ThemeEdit => "Customize Theme",
        Screen::MarkdownExport => "Export Chat",
        Screen::About => "About",
    }
}

fn header_style(theme: &Theme) -> Style {
    Style::default().fg(to_color(theme.header_fg)).bg(to_color(theme.header_bg))
}

fn selected_style(theme: &Theme) -> Style {
    Style::default()
        .fg(to_color(theme.selected_fg))
        .bg(to_color(theme.selected_bg))
        .add_modifier(Modifier::BOLD)
}

/// Style `**bold**` runs in a reply line; everything else is literal.
fn styled_reply_line(text: &str) -> Line<'static> {
    let mut spans = Vec::new();
    for (i, part) in text.split("**").enumerate() {
        if part.is_empty() {
            continue;
        }
        // Odd segments sit between a pair of markers
        if i % 2 == 1 {
            spans.push(Span::styled(part.to_string(), Style::default().add_modifier(Modifier::BOLD)));
        } else {
            spans.push(Span::raw(part.to_string()));
        }
    }
    // An unmatched marker leaves an even number of segments; show the text unchanged.
    if text.matches("**").count() % 2 == 1 {
        return Line::from(text.to_string());
    }
    Line::from(spans)
}

/// `*` per character, with the last four shown once the key is longer than four.
pub fn mask_key(key: &str) -> String {
    let len = key.chars().count();
    if len <= 4 {
        return "*".repeat(len);
    }
    let last_four: String = key.chars().skip(len - 4).collect();
    format!("{}{}", "*".repeat(len - 4), last_four)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let [header_area, body_area, status_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    render_header(app, frame, header_area);

    match app.ui.screen {
        Screen::MainMenu => render_main_menu(app, frame, body_area),
        Screen::ProviderSelect => render_provider_select(app, frame, body_area),
        Screen::ModelSelect => render_model_select(app, frame, body_area),
        Screen::ApiKeyInput => render_api_key_input(app, frame, body_area),
        Screen::Chat => render_chat(app, frame, body_area),
        Screen::SystemMessageEdit => render_system_message(app, frame, body_area),
        Screen::ThemeEdit => render_theme_edit(app, frame, body_area),
        Screen::MarkdownExport => render_export(app, frame, body_area),
        Screen::About => render_about(app, frame, body_area),
    }

    render_status(app, frame, status_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::raw(" Synthara ").bold(),
        Span::raw(format!("v{} ", env!("CARGO_PKG_VERSION"))),
        Span::raw(format!("- {} ", screen_title(app.ui.screen))),
    ];
    if app.ui.screen == Screen::Chat {
        spans.push(Span::raw(format!(
            "- {}: {} ",
            app.config.selected_provider().display_name(),
            app.config.selected_model()
        )));
    }
    let header = Paragraph::new(Line::from(spans)).style(header_style(&app.theme));
    frame.render_widget(header, area);
}

fn render_status(app: &App, frame: &mut Frame, area: Rect) {
    let status = &app.ui.status_line;
    let style = if status.starts_with("Error") {
        Style::default().fg(to_color(app.theme.error_msg_fg)).bold()
    } else {
        Style::default().fg(Color::Yellow)
    };
    frame.render_widget(Paragraph::new(format!(" {status}")).style(style), area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let hints = match app.ui.screen {
        Screen::MainMenu => "↑/↓ navigate | Enter select | Ctrl+C/F10 quit",
        Screen::ProviderSelect | Screen::ModelSelect => "↑/↓ navigate | Enter select | Esc back",
        Screen::ThemeEdit => "↑/↓ navigate | Enter change/apply | Esc cancel",
        Screen::ApiKeyInput | Screen::SystemMessageEdit => "Enter save | Esc cancel",
        Screen::Chat => "Enter send | ↑/↓/PgUp/PgDn scroll | M export | Ctrl+L clear | Esc menu",
        Screen::MarkdownExport => "Enter export | Esc back to chat",
        Screen::About => "Press any key to return",
    };
    let footer = Paragraph::new(format!(" {hints}")).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, area);
}

fn render_list(app: &App, frame: &mut Frame, area: Rect, title: &str, items: Vec<ListItem>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(to_color(app.theme.header_bg)))
        .title(format!(" {title} "));
    let list = List::new(items)
        .block(block)
        .highlight_style(selected_style(&app.theme))
        .highlight_symbol("> ");
    let mut state = ListState::default().with_selected(Some(app.ui.selected_index));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_main_menu(app: &App, frame: &mut Frame, area: Rect) {
    let [menu_area, info_area] =
        Layout::horizontal([Constraint::Length(30), Constraint::Min(0)]).areas(area);

    let items = MenuOption::ALL
        .iter()
        .map(|option| ListItem::new(format!(" {} ", option.label())))
        .collect();
    render_list(app, frame, menu_area, "Menu", items);

    let provider = app.config.selected_provider();
    let model = app.config.selected_model();
    let key_status = match app.config.key_source(provider) {
        Some(source) => Span::styled(format!("Set ({})", source.label()), Style::default().fg(Color::Green)),
        None => Span::styled("Not set", Style::default().fg(to_color(app.theme.error_msg_fg))),
    };
    let model_name = provider::model_info(provider, model)
        .map(|info| info.display_name)
        .unwrap_or(model);

    let label = Style::default().fg(Color::DarkGray);
    let lines = vec![
        Line::from(vec![Span::styled("Provider: ", label), Span::raw(provider.display_name())]),
        Line::from(vec![Span::styled("Model:    ", label), Span::raw(model_name)]),
        Line::from(vec![Span::styled("API key:  ", label), key_status]),
        Line::default(),
        Line::from(Span::styled(
            format!("Messages in conversation: {}", app.session.turn_count()),
            label,
        )),
    ];
    let info = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Current Settings "))
        .wrap(Wrap { trim: false });
    frame.render_widget(info, info_area);
}

fn render_provider_select(app: &App, frame: &mut Frame, area: Rect) {
    let current = app.config.selected_provider();
    let items = provider::providers()
        .into_iter()
        .map(|p| {
            let marker = if p == current { "* " } else { "  " };
            let status = app
                .config
                .key_source(p)
                .map(|source| format!("({})", source.label()))
                .unwrap_or_else(|| "(needs key)".to_string());
            ListItem::new(format!("{marker}{} {status}", p.display_name()))
        })
        .collect();
    render_list(app, frame, area, "Select Provider", items);
}

fn render_model_select(app: &App, frame: &mut Frame, area: Rect) {
    let provider = app.config.selected_provider();
    let current = app.config.selected_model();
    let items = provider::models(provider)
        .iter()
        .map(|model| {
            let marker = if model.id == current { "* " } else { "  " };
            ListItem::new(Text::from(vec![
                Line::from(format!("{marker}{} ({})", model.display_name, model.id)),
                Line::from(Span::styled(
                    format!("    {}", model.description),
                    Style::default().fg(Color::DarkGray),
                )),
            ]))
        })
        .collect();
    render_list(app, frame, area, &format!("Select Model - {}", provider.display_name()), items);
}

fn render_api_key_input(app: &App, frame: &mut Frame, area: Rect) {
    let provider = app.config.selected_provider();
    let buffer = &app.ui.input_buffer;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(format!(" Enter API Key for {} ", provider.display_name()));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [hint_area, input_area, count_area, _, help_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(0),
    ])
    .areas(inner);

    frame.render_widget(
        Paragraph::new("Paste or type your API key. Press Enter to save, Esc to cancel.")
            .style(Style::default().fg(Color::DarkGray)),
        hint_area,
    );
    frame.render_widget(
        Paragraph::new(format!("> {}", mask_key(buffer))).style(Style::default().fg(Color::Cyan)),
        input_area,
    );
    frame.render_widget(
        Paragraph::new(format!("{} characters", buffer.chars().count()))
            .style(Style::default().fg(Color::DarkGray)),
        count_area,
    );

    let help: Vec<Line> = provider.key_help().iter().map(|line| Line::from(*line)).collect();
    frame.render_widget(Paragraph::new(help).wrap(Wrap { trim: false }), help_area);

    let cursor_x = (mask_key(buffer).chars().count() as u16 + 2).min(input_area.width.saturating_sub(1));
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
}

/// Rows a line occupies once wrapped to `width` columns.
fn wrapped_height(line: &Line, width: u16) -> u16 {
    let width = width.max(1) as usize;
    let chars = line.width().max(1);
    chars.div_ceil(width) as u16
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    let user_style = Style::default().fg(to_color(app.theme.user_msg_fg)).bold();
    let assistant_style = Style::default().fg(to_color(app.theme.assistant_msg_fg)).bold();

    let history = app.history();
    let mut lines: Vec<Line> = Vec::new();
    for message in history.iter().filter(|m| m.role != ChatRole::System) {
        match message.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled("You:", user_style)));
                lines.extend(message.content.lines().map(|l| Line::from(l.to_string())));
            }
            ChatRole::Assistant => {
                lines.push(Line::from(Span::styled("Assistant:", assistant_style)));
                lines.extend(message.content.lines().map(styled_reply_line));
            }
            ChatRole::System => continue,
        }
        lines.push(Line::default());
    }

    if app.is_waiting() {
        lines.push(Line::from(Span::styled("Assistant:", assistant_style)));
        let dots = ".".repeat(app.animation_frame as usize + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{dots}"),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "Type a message and press Enter to start the conversation.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    // Keep the scroll offset within the wrapped text; reaching the end resumes following.
    let inner_width = chat_area.width.saturating_sub(2);
    let inner_height = chat_area.height.saturating_sub(2);
    let total: u16 = lines
        .iter()
        .map(|line| wrapped_height(line, inner_width))
        .fold(0u16, u16::saturating_add);
    let max_scroll = total.saturating_sub(inner_height);
    if app.follow_chat || app.chat_scroll >= max_scroll {
        app.chat_scroll = max_scroll;
        app.follow_chat = true;
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title(" Conversation "))
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    render_text_input(app, frame, input_area, "Message");
}

/// Single-line input box that keeps the end of the buffer visible.
fn render_text_input(app: &App, frame: &mut Frame, area: Rect, title: &str) {
    let inner_width = area.width.saturating_sub(2) as usize;
    let len = app.ui.input_buffer.chars().count();
    // Leave a column for the cursor after the last character
    let offset = if inner_width == 0 { len } else { (len + 1).saturating_sub(inner_width) };
    let visible: String = app.ui.input_buffer.chars().skip(offset).collect();

    let input = Paragraph::new(visible)
        .style(Style::default().fg(to_color(app.theme.user_msg_fg)))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(format!(" {title} ")),
        );
    frame.render_widget(input, area);

    if inner_width == 0 || area.height < 3 {
        return;
    }
    let cursor_x = (len - offset) as u16;
    frame.set_cursor_position((area.x + 1 + cursor_x, area.y + 1));
}

fn render_system_message(app: &App, frame: &mut Frame, area: Rect) {
    let [help_area, edit_area] =
        Layout::vertical([Constraint::Length(2), Constraint::Min(0)]).areas(area);

    frame.render_widget(
        Paragraph::new("The system message sets the assistant's behaviour for the whole conversation.")
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true }),
        help_area,
    );

    let text = format!("{}_", app.ui.input_buffer);
    let editor = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(" System Message "),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(editor, edit_area);
}

fn render_theme_edit(app: &App, frame: &mut Frame, area: Rect) {
    let [options_area, preview_area] =
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(area);

    let items = ThemeOption::all()
        .into_iter()
        .map(|option| match option {
            ThemeOption::Color(slot) => {
                let value = app.theme.get(slot);
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{:<32}", option.label())),
                    Span::styled("  ", Style::default().bg(to_color(value))),
                    Span::raw(format!(" {}", color_name(value))),
                ]))
            }
            _ => ListItem::new(option.label()),
        })
        .collect();
    render_list(app, frame, options_area, "Theme", items);

    let theme = &app.theme;
    let preview = vec![
        Line::from(Span::styled(" Header ", header_style(theme))),
        Line::default(),
        Line::from(Span::styled(" Selected item ", selected_style(theme))),
        Line::from(" Normal item"),
        Line::default(),
        Line::from(Span::styled("You:", Style::default().fg(to_color(theme.user_msg_fg)).bold())),
        Line::from("Hello there"),
        Line::from(Span::styled(
            "Assistant:",
            Style::default().fg(to_color(theme.assistant_msg_fg)).bold(),
        )),
        Line::from("Hi! How can I help?"),
        Line::default(),
        Line::from(Span::styled("Error: example", Style::default().fg(to_color(theme.error_msg_fg)))),
    ];
    frame.render_widget(
        Paragraph::new(preview).block(Block::default().borders(Borders::ALL).title(" Preview ")),
        preview_area,
    );
}

fn render_export(app: &App, frame: &mut Frame, area: Rect) {
    let [help_area, input_area, _] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    let count = app.session.turn_count();
    frame.render_widget(
        Paragraph::new(format!("Export {count} messages as Markdown. Enter a file path:"))
            .style(Style::default().fg(Color::DarkGray)),
        help_area,
    );
    render_text_input(app, frame, input_area, "File Path");
}

fn render_about(app: &App, frame: &mut Frame, area: Rect) {
    let title_style = Style::default().fg(to_color(app.theme.assistant_msg_fg)).bold();
    let lines = vec![
        Line::from(Span::styled("Synthara", title_style)),
        Line::from(format!("Version {}", env!("CARGO_PKG_VERSION"))),
        Line::default(),
        Line::from("A terminal interface for conversing with hosted language models."),
        Line::default(),
        Line::from("Providers: Google Gemini, Anthropic Claude, OpenAI"),
        Line::from("Conversations can be exported as Markdown from the chat screen."),
        Line::default(),
        Line::from(Span::styled("Press any key to return", Style::default().fg(Color::DarkGray))),
    ];
    let about = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(" About "))
        .wrap(Wrap { trim: true });
    frame.render_widget(about, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use crate::session::SessionController;
    use crate::transcript::{ChatMessage, Transcript};
    use ratatui::{backend::TestBackend, Terminal};
    use tempfile::TempDir;

    fn draw(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key(""), "");
        assert_eq!(mask_key("abcd"), "****");
        assert_eq!(mask_key("abcdefgh"), "****efgh");
    }

    #[test]
    fn test_reply_bold_markers() {
        let line = styled_reply_line("a **b** c");
        assert_eq!(line.spans.len(), 3);
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));

        let unmatched = styled_reply_line("a ** b");
        assert_eq!(unmatched.spans.len(), 1);
    }

    #[test]
    fn test_every_screen_renders() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        for screen in [
            Screen::MainMenu,
            Screen::ProviderSelect,
            Screen::ModelSelect,
            Screen::ApiKeyInput,
            Screen::Chat,
            Screen::SystemMessageEdit,
            Screen::ThemeEdit,
            Screen::MarkdownExport,
            Screen::About,
        ] {
            app.enter(screen);
            let screen_text = draw(&mut app);
            assert!(screen_text.contains(screen_title(screen)), "{screen:?}");
        }
    }

    #[test]
    fn test_narrow_terminal_does_not_panic() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.enter(Screen::Chat);
        app.ui.input_buffer = "hello".to_string();

        for screen in [Screen::MarkdownExport, Screen::Chat, Screen::ApiKeyInput, Screen::ThemeEdit] {
            app.enter(screen);
            for width in [1, 2, 3] {
                let mut terminal = Terminal::new(TestBackend::new(width, 30)).unwrap();
                terminal.draw(|frame| render(&mut app, frame)).unwrap();
            }
            let mut terminal = Terminal::new(TestBackend::new(80, 2)).unwrap();
            terminal.draw(|frame| render(&mut app, frame)).unwrap();
        }
    }

    #[test]
    fn test_api_key_is_masked() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.enter(Screen::ApiKeyInput);
        app.ui.input_buffer = "supersecretkey".to_string();

        let screen_text = draw(&mut app);

        assert!(!screen_text.contains("supersecret"));
        assert!(screen_text.contains("**********tkey"));
        assert!(screen_text.contains("14 characters"));
    }

    #[test]
    fn test_chat_follows_latest_message() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        let mut messages = vec![ChatMessage::system("S")];
        for i in 0..40 {
            messages.push(ChatMessage::user(format!("question {i}")));
            messages.push(ChatMessage::assistant(format!("answer {i}")));
        }
        app.session = SessionController::new(Transcript::from(messages));
        app.enter(Screen::Chat);

        let screen_text = draw(&mut app);

        assert!(screen_text.contains("answer 39"));
        assert!(app.chat_scroll > 0);
    }
}
