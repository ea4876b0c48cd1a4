use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{App, Screen};
use crate::tui::AppEvent;

const PAGE_LINES: u16 = 10;
const WHEEL_LINES: u16 = 3;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
    }
    Ok(())
}

pub fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work on every screen
    if (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
        || key.code == KeyCode::F(10)
    {
        app.should_quit = true;
        return;
    }

    match app.ui.screen {
        Screen::MainMenu => handle_main_menu(app, key),
        Screen::ProviderSelect => handle_list(app, key, App::commit_provider),
        Screen::ModelSelect => handle_list(app, key, App::commit_model),
        Screen::ApiKeyInput => handle_api_key(app, key),
        Screen::Chat => handle_chat(app, key),
        Screen::SystemMessageEdit => handle_system_message(app, key),
        Screen::ThemeEdit => handle_theme(app, key),
        Screen::MarkdownExport => handle_export(app, key),
        Screen::About => app.return_to_menu(),
    }
}

/// Shared Up/Down/j/k navigation. Returns true if the key was consumed.
fn navigate(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1),
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(1),
        KeyCode::Home => app.ui.selected_index = 0,
        KeyCode::End => app.move_selection(isize::MAX),
        _ => return false,
    }
    true
}

fn handle_main_menu(app: &mut App, key: KeyEvent) {
    if navigate(app, key) {
        return;
    }
    if key.code == KeyCode::Enter {
        if let Some(option) = app.selected_menu_option() {
            app.activate_menu_option(option);
        }
    }
}

fn handle_list(app: &mut App, key: KeyEvent, commit: fn(&mut App)) {
    if navigate(app, key) {
        return;
    }
    match key.code {
        KeyCode::Enter => commit(app),
        KeyCode::Esc => app.return_to_menu(),
        _ => {}
    }
}

fn handle_theme(app: &mut App, key: KeyEvent) {
    if navigate(app, key) {
        return;
    }
    match key.code {
        KeyCode::Enter => {
            if let Some(option) = app.selected_theme_option() {
                app.activate_theme_option(option);
            }
        }
        KeyCode::Esc => app.cancel_theme_edit(),
        _ => {}
    }
}

/// Typing into the input buffer. Returns true if the key was consumed.
fn edit_buffer(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char(c)
            if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            app.ui.input_buffer.push(c);
            true
        }
        KeyCode::Backspace => {
            app.ui.input_buffer.pop();
            true
        }
        _ => false,
    }
}

fn handle_api_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.commit_api_key(),
        KeyCode::Esc => app.return_to_menu(),
        _ => {
            edit_buffer(app, key);
        }
    }
}

fn handle_system_message(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.commit_system_message(),
        KeyCode::Esc => app.return_to_menu(),
        _ => {
            edit_buffer(app, key);
        }
    }
}

fn handle_export(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.export_transcript(),
        KeyCode::Esc => app.cancel_export(),
        _ => {
            edit_buffer(app, key);
        }
    }
}

fn handle_chat(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.leave_chat(),
        KeyCode::Enter => app.send_message(),
        KeyCode::Char('l') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.clear_conversation()
        }
        // Export only from an empty prompt, so "M" can still be typed in a message.
        KeyCode::Char('M') if app.ui.input_buffer.is_empty() => app.open_export(),
        KeyCode::Up => app.scroll_chat_up(1),
        KeyCode::Down => app.scroll_chat_down(1),
        KeyCode::PageUp => app.scroll_chat_up(PAGE_LINES),
        KeyCode::PageDown => app.scroll_chat_down(PAGE_LINES),
        _ => {
            edit_buffer(app, key);
        }
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.ui.screen != Screen::Chat {
        return;
    }
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_chat_up(WHEEL_LINES),
        MouseEventKind::ScrollDown => app.scroll_chat_down(WHEEL_LINES),
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    if !app.ui.screen.is_text_entry() {
        return;
    }
    let text = text.replace('\r', "");
    match app.ui.screen {
        // Keys and paths are single-line values
        Screen::ApiKeyInput | Screen::MarkdownExport => app.ui.input_buffer.push_str(text.trim()),
        _ => app.ui.input_buffer.push_str(&text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use crate::ai::testing::ScriptedGateway;
    use crate::ai::GatewayRegistry;
    use crate::app::{MenuOption, ThemeOption};
    use crate::config::ConfigStore;
    use crate::theme::ThemeStore;
    use std::sync::Arc;
    use crate::provider::Provider;
    use crate::session::SessionStatus;
    use crate::theme::Theme;
    use crate::transcript::ChatMessage;
    use tempfile::TempDir;

    fn press(app: &mut App, code: KeyCode) {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn select_menu(app: &mut App, option: MenuOption) {
        let index = MenuOption::ALL.iter().position(|o| *o == option).unwrap();
        app.ui.selected_index = index;
        press(app, KeyCode::Enter);
    }

    #[test]
    fn test_selection_stays_in_range_under_random_navigation() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        let keys = [KeyCode::Up, KeyCode::Down, KeyCode::Char('j'), KeyCode::Char('k'), KeyCode::End, KeyCode::Home];

        for screen in [Screen::MainMenu, Screen::ProviderSelect, Screen::ModelSelect, Screen::ThemeEdit] {
            app.enter(screen);
            let count = app.option_count(screen);
            let mut seed: u64 = 0x2545_f491;
            for _ in 0..500 {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                press(&mut app, keys[(seed >> 33) as usize % keys.len()]);
                assert!(app.ui.selected_index < count, "{screen:?} index {}", app.ui.selected_index);
            }
        }
    }

    #[test]
    fn test_start_chat_without_credential_stays_on_menu() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);

        select_menu(&mut app, MenuOption::StartChat);

        assert_eq!(app.ui.screen, Screen::MainMenu);
        assert!(!app.ui.status_line.is_empty());
    }

    #[tokio::test]
    async fn test_chat_send_appends_user_turn_before_reply() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        let (gateway, gate) = crate::ai::testing::ScriptedGateway::gated("hello");
        let gateway = std::sync::Arc::new(gateway);
        let shared = gateway.clone();
        app.gateways.register(Provider::Google, move |_| shared.clone());
        app.config.set_credential(Provider::Google, "key").unwrap();
        select_menu(&mut app, MenuOption::StartChat);
        assert_eq!(app.ui.screen, Screen::Chat);

        type_text(&mut app, "hi");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.history().last(), Some(&ChatMessage::user("hi")));
        assert!(matches!(app.session.status(), SessionStatus::Pending(_)));
        assert!(app.ui.input_buffer.is_empty());
        assert_eq!(app.ui.status_line, "Sending message to Google (Gemini)...");

        gate.notify_one();
        for _ in 0..100 {
            if !app.is_waiting() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        app.observe_session();
        assert_eq!(app.history().last(), Some(&ChatMessage::assistant("hello")));
        assert!(app.ui.status_line.is_empty());
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_escape_from_chat_abandons_pending_reply() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        let (gateway, gate) = crate::ai::testing::ScriptedGateway::gated("late");
        let gateway = std::sync::Arc::new(gateway);
        let shared = gateway.clone();
        app.gateways.register(Provider::Google, move |_| shared.clone());
        app.config.set_credential(Provider::Google, "key").unwrap();
        select_menu(&mut app, MenuOption::StartChat);
        type_text(&mut app, "hi");
        press(&mut app, KeyCode::Enter);

        press(&mut app, KeyCode::Esc);
        gate.notify_one();
        for _ in 0..100 {
            if gateway.call_count() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(app.ui.screen, Screen::MainMenu);
        assert_eq!(app.ui.selected_index, 0);
        assert_eq!(app.session.status(), SessionStatus::Idle);
        assert_eq!(app.history().last(), Some(&ChatMessage::user("hi")));
    }

    #[test]
    fn test_api_key_entry_commits_and_empty_enter_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        select_menu(&mut app, MenuOption::SetApiKey);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.ui.screen, Screen::ApiKeyInput);

        type_text(&mut app, "secret");
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.ui.screen, Screen::MainMenu);
        assert_eq!(app.config.credential(Provider::Google).as_deref(), Some("secre"));
    }

    #[test]
    fn test_escape_discards_system_message_edit() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        let original = app.session.system_message();
        select_menu(&mut app, MenuOption::SetSystemMessage);

        type_text(&mut app, " extra");
        press(&mut app, KeyCode::Esc);

        assert_eq!(app.ui.screen, Screen::MainMenu);
        assert_eq!(app.session.system_message(), original);
    }

    #[test]
    fn test_system_message_commit() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        select_menu(&mut app, MenuOption::SetSystemMessage);
        app.ui.input_buffer.clear();

        type_text(&mut app, "Answer in French");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.history()[0], ChatMessage::system("Answer in French"));
    }

    #[test]
    fn test_model_select_commits_highlighted_model() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        select_menu(&mut app, MenuOption::SelectModel);
        assert_eq!(app.ui.selected_index, 0);

        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);

        let expected = crate::provider::models(Provider::Google)[1].id;
        assert_eq!(app.config.selected_model(), expected);
        assert_eq!(app.ui.screen, Screen::MainMenu);
    }

    #[test]
    fn test_theme_cycle_then_escape_reverts() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        select_menu(&mut app, MenuOption::CustomizeTheme);

        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.theme.header_fg, 1);

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.theme, Theme::default());
    }

    #[test]
    fn test_theme_back_keeps_live_theme() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        select_menu(&mut app, MenuOption::CustomizeTheme);
        press(&mut app, KeyCode::Enter);

        let back = ThemeOption::all().iter().position(|o| *o == ThemeOption::Back).unwrap();
        app.ui.selected_index = back;
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.ui.screen, Screen::MainMenu);
        assert_eq!(app.theme.header_fg, 0);
    }

    #[test]
    fn test_export_from_chat_writes_file() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.config.set_credential(Provider::Google, "key").unwrap();
        select_menu(&mut app, MenuOption::StartChat);

        press(&mut app, KeyCode::Char('M'));
        assert_eq!(app.ui.screen, Screen::MarkdownExport);
        assert!(app.ui.input_buffer.ends_with("chat_export.md"));

        let target = dir.path().join("out/chat.md");
        app.ui.input_buffer.clear();
        handle_event(&mut app, AppEvent::Paste(target.display().to_string())).unwrap();
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.ui.screen, Screen::Chat);
        assert!(app.ui.status_line.starts_with("Chat history exported to"));
        let written = std::fs::read_to_string(&target).unwrap();
        assert_eq!(crate::export::parse_markdown(&written), app.history());
    }

    #[test]
    fn test_capital_m_is_typed_mid_message() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.config.set_credential(Provider::Google, "key").unwrap();
        select_menu(&mut app, MenuOption::StartChat);

        type_text(&mut app, "I'M");

        assert_eq!(app.ui.screen, Screen::Chat);
        assert_eq!(app.ui.input_buffer, "I'M");
    }

    /// An app whose config directory is a regular file, so every save fails.
    fn unwritable_app(dir: &TempDir) -> App {
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, "").unwrap();
        App::new(
            ConfigStore::load(&blocker).without_env(),
            ThemeStore::new(&blocker),
            GatewayRegistry::new(),
        )
    }

    async fn wait_for_calls(gateway: &ScriptedGateway, calls: usize) {
        for _ in 0..100 {
            if gateway.call_count() == calls {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    #[test]
    fn test_failed_provider_save_is_reported_and_kept() {
        let dir = TempDir::new().unwrap();
        let mut app = unwritable_app(&dir);
        select_menu(&mut app, MenuOption::SelectProvider);

        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.ui.screen, Screen::MainMenu);
        assert!(app.ui.status_line.starts_with("Error: failed to save settings"));
        assert_eq!(app.config.selected_provider(), Provider::Claude);
    }

    #[test]
    fn test_failed_api_key_save_is_reported_and_kept() {
        let dir = TempDir::new().unwrap();
        let mut app = unwritable_app(&dir);
        select_menu(&mut app, MenuOption::SetApiKey);

        type_text(&mut app, "k1");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.ui.screen, Screen::MainMenu);
        assert!(app.ui.status_line.starts_with("Error: failed to save settings"));
        assert_eq!(app.config.credential(Provider::Google).as_deref(), Some("k1"));
    }

    #[test]
    fn test_failed_theme_save_is_reported() {
        let dir = TempDir::new().unwrap();
        let mut app = unwritable_app(&dir);
        select_menu(&mut app, MenuOption::CustomizeTheme);

        let save = ThemeOption::all().iter().position(|o| *o == ThemeOption::Save).unwrap();
        app.ui.selected_index = save;
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.ui.screen, Screen::ThemeEdit);
        assert_eq!(app.ui.status_line, "Error: Failed to save theme");
    }

    #[test]
    fn test_failed_export_returns_to_chat() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.config.set_credential(Provider::Google, "key").unwrap();
        select_menu(&mut app, MenuOption::StartChat);
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        press(&mut app, KeyCode::Char('M'));
        app.ui.input_buffer = blocker.join("out.md").display().to_string();
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.ui.screen, Screen::Chat);
        assert_eq!(app.ui.status_line, "Error: Failed to export chat history");
    }

    #[test]
    fn test_escape_from_export_returns_to_chat() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.config.set_credential(Provider::Google, "key").unwrap();
        select_menu(&mut app, MenuOption::StartChat);
        press(&mut app, KeyCode::Char('M'));

        press(&mut app, KeyCode::Esc);

        assert_eq!(app.ui.screen, Screen::Chat);
        assert!(app.ui.input_buffer.is_empty());
    }

    #[tokio::test]
    async fn test_clear_while_pending_discards_late_reply() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        let (gateway, gate) = ScriptedGateway::gated("late");
        let gateway = Arc::new(gateway);
        let shared = gateway.clone();
        app.gateways.register(Provider::Google, move |_| shared.clone());
        app.config.set_credential(Provider::Google, "key").unwrap();
        select_menu(&mut app, MenuOption::StartChat);
        type_text(&mut app, "hi");
        press(&mut app, KeyCode::Enter);
        assert!(app.is_waiting());

        handle_key(&mut app, KeyEvent::new(KeyCode::Char('l'), KeyModifiers::CONTROL));
        assert_eq!(app.history().len(), 1);
        assert_eq!(app.session.status(), SessionStatus::Idle);

        gate.notify_one();
        wait_for_calls(&gateway, 1).await;
        app.observe_session();

        assert_eq!(app.history().len(), 1);
        assert_eq!(app.session.status(), SessionStatus::Idle);
        assert_eq!(app.ui.status_line, "Conversation cleared");
    }

    #[test]
    fn test_q_is_not_a_quit_key() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);

        press(&mut app, KeyCode::Char('q'));

        assert!(!app.should_quit);
    }

    #[test]
    fn test_global_quit_keys() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.enter(Screen::SystemMessageEdit);
        handle_key(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);

        let mut app = test_app(&dir);
        app.enter(Screen::ThemeEdit);
        press(&mut app, KeyCode::F(10));
        assert!(app.should_quit);
    }

    #[test]
    fn test_about_returns_on_any_key() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        select_menu(&mut app, MenuOption::About);
        assert_eq!(app.ui.screen, Screen::About);

        press(&mut app, KeyCode::Char('x'));

        assert_eq!(app.ui.screen, Screen::MainMenu);
    }
}
