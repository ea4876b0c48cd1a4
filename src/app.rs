use tracing::{debug, info, warn};

use crate::ai::GatewayRegistry;
use crate::config::ConfigStore;
use crate::export;
use crate::provider::{self, Provider};
use crate::session::{Route, SessionController, SessionError, SessionStatus};
use crate::theme::{Theme, ThemeSlot, ThemeStore};
use crate::transcript::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    MainMenu,
    ProviderSelect,
    ModelSelect,
    ApiKeyInput,
    Chat,
    SystemMessageEdit,
    ThemeEdit,
    MarkdownExport,
    About,
}

impl Screen {
    /// Screens whose keystrokes go into the input buffer.
    pub fn is_text_entry(&self) -> bool {
        matches!(
            self,
            Screen::ApiKeyInput | Screen::Chat | Screen::SystemMessageEdit | Screen::MarkdownExport
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOption {
    SelectProvider,
    SelectModel,
    SetApiKey,
    StartChat,
    SetSystemMessage,
    CustomizeTheme,
    About,
    Exit,
}

impl MenuOption {
    pub const ALL: [MenuOption; 8] = [
        MenuOption::SelectProvider,
        MenuOption::SelectModel,
        MenuOption::SetApiKey,
        MenuOption::StartChat,
        MenuOption::SetSystemMessage,
        MenuOption::CustomizeTheme,
        MenuOption::About,
        MenuOption::Exit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MenuOption::SelectProvider => "Select Provider",
            MenuOption::SelectModel => "Select Model",
            MenuOption::SetApiKey => "Set API Key",
            MenuOption::StartChat => "Start Chat",
            MenuOption::SetSystemMessage => "Set System Message",
            MenuOption::CustomizeTheme => "Customize Theme",
            MenuOption::About => "About",
            MenuOption::Exit => "Exit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeOption {
    Color(ThemeSlot),
    Save,
    Reset,
    Back,
}

impl ThemeOption {
    pub fn all() -> Vec<ThemeOption> {
        ThemeSlot::ALL
            .iter()
            .map(|slot| ThemeOption::Color(*slot))
            .chain([ThemeOption::Save, ThemeOption::Reset, ThemeOption::Back])
            .collect()
    }

    pub fn label(&self) -> &'static str {
        match self {
            ThemeOption::Color(slot) => slot.label(),
            ThemeOption::Save => "Save Theme",
            ThemeOption::Reset => "Reset to Default",
            ThemeOption::Back => "Back to Main Menu",
        }
    }
}

/// Navigational state of the UI. Replaced as a whole on every screen change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UiState {
    pub screen: Screen,
    pub selected_index: usize,
    pub input_buffer: String,
    pub status_line: String,
}

pub fn clamp_selection(index: usize, count: usize) -> usize {
    index.min(count.saturating_sub(1))
}

pub struct App {
    pub should_quit: bool,
    pub ui: UiState,

    // Session
    pub session: SessionController,
    pub gateways: GatewayRegistry,
    observed_status: SessionStatus,

    // Settings
    pub config: ConfigStore,
    pub theme: Theme,
    pub theme_store: ThemeStore,
    theme_on_entry: Theme,

    // Chat view
    pub chat_scroll: u16,
    pub follow_chat: bool,
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(config: ConfigStore, theme_store: ThemeStore, gateways: GatewayRegistry) -> Self {
        let theme = theme_store.load();
        Self {
            should_quit: false,
            ui: UiState::default(),

            session: SessionController::default(),
            gateways,
            observed_status: SessionStatus::Idle,

            config,
            theme,
            theme_store,
            theme_on_entry: theme,

            chat_scroll: 0,
            follow_chat: true,
            animation_frame: 0,
        }
    }

    pub fn option_count(&self, screen: Screen) -> usize {
        match screen {
            Screen::MainMenu => MenuOption::ALL.len(),
            Screen::ProviderSelect => provider::providers().len(),
            Screen::ModelSelect => provider::models(self.config.selected_provider()).len(),
            Screen::ThemeEdit => ThemeOption::all().len(),
            _ => 0,
        }
    }

    pub fn selected_menu_option(&self) -> Option<MenuOption> {
        MenuOption::ALL.get(self.ui.selected_index).copied()
    }

    pub fn selected_theme_option(&self) -> Option<ThemeOption> {
        ThemeOption::all().get(self.ui.selected_index).copied()
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.ui.status_line = message.into();
    }

    pub fn clear_status(&mut self) {
        self.ui.status_line.clear();
    }

    /// Move the list cursor by `delta`, clamped to the current screen's options.
    pub fn move_selection(&mut self, delta: isize) {
        let count = self.option_count(self.ui.screen);
        let index = self.ui.selected_index.saturating_add_signed(delta);
        self.ui.selected_index = clamp_selection(index, count);
    }

    /// Switch screens. Selection and input buffer are derived for the new
    /// screen; the status line carries over so commit messages stay visible.
    pub fn enter(&mut self, screen: Screen) {
        let selected_index = match screen {
            Screen::ProviderSelect => {
                let current = self.config.selected_provider();
                provider::providers().iter().position(|p| *p == current).unwrap_or(0)
            }
            Screen::ModelSelect => {
                let current = self.config.selected_model();
                provider::models(self.config.selected_provider())
                    .iter()
                    .position(|m| m.id == current)
                    .unwrap_or(0)
            }
            _ => 0,
        };
        let input_buffer = match screen {
            Screen::SystemMessageEdit => self.session.system_message(),
            Screen::MarkdownExport => export::default_export_path(),
            _ => String::new(),
        };
        if screen == Screen::ThemeEdit {
            self.theme_on_entry = self.theme;
        }
        if screen == Screen::Chat {
            self.follow_chat = true;
        }

        debug!(from = ?self.ui.screen, to = ?screen, "screen change");
        self.ui = UiState {
            screen,
            selected_index: clamp_selection(selected_index, self.option_count(screen)),
            input_buffer,
            status_line: std::mem::take(&mut self.ui.status_line),
        };
    }

    pub fn return_to_menu(&mut self) {
        self.enter(Screen::MainMenu);
    }

    pub fn credential_is_set(&self) -> bool {
        self.config.credential(self.config.selected_provider()).is_some()
    }

    // Main menu

    pub fn activate_menu_option(&mut self, option: MenuOption) {
        match option {
            MenuOption::SelectProvider => self.enter(Screen::ProviderSelect),
            MenuOption::SelectModel => self.enter(Screen::ModelSelect),
            MenuOption::SetApiKey => self.enter(Screen::ApiKeyInput),
            MenuOption::StartChat => self.start_chat(),
            MenuOption::SetSystemMessage => self.enter(Screen::SystemMessageEdit),
            MenuOption::CustomizeTheme => self.enter(Screen::ThemeEdit),
            MenuOption::About => self.enter(Screen::About),
            MenuOption::Exit => {
                info!("exit selected");
                self.should_quit = true;
            }
        }
    }

    /// Chat requires a credential for the selected provider; without one we
    /// stay on the menu and say why.
    pub fn start_chat(&mut self) {
        let provider = self.config.selected_provider();
        if !self.credential_is_set() {
            warn!(provider = provider.as_str(), "chat refused: no API key");
            self.set_status(format!("Error: API key not set for {}", provider.display_name()));
            return;
        }
        self.clear_status();
        self.enter(Screen::Chat);
    }

    // Settings commits

    pub fn commit_provider(&mut self) {
        let Some(&provider) = provider::providers().get(self.ui.selected_index) else {
            return;
        };
        match self.config.set_selected_provider(provider) {
            Ok(()) => self.set_status(format!("Provider set to {}", provider.display_name())),
            Err(e) => self.report_persistence_error(e),
        }
        self.return_to_menu();
    }

    pub fn commit_model(&mut self) {
        let models = provider::models(self.config.selected_provider());
        let Some(model) = models.get(self.ui.selected_index) else {
            return;
        };
        match self.config.set_selected_model(model.id) {
            Ok(()) => self.set_status(format!("Model set to {}", model.display_name)),
            Err(e) => self.report_persistence_error(e),
        }
        self.return_to_menu();
    }

    /// Store the typed key for the selected provider. Empty input is ignored.
    pub fn commit_api_key(&mut self) {
        if self.ui.input_buffer.is_empty() {
            return;
        }
        let provider = self.config.selected_provider();
        let key = std::mem::take(&mut self.ui.input_buffer);
        match self.config.set_credential(provider, &key) {
            Ok(()) => self.set_status(format!("API key set for {}", provider.display_name())),
            Err(e) => self.report_persistence_error(e),
        }
        self.return_to_menu();
    }

    pub fn commit_system_message(&mut self) {
        let message = std::mem::take(&mut self.ui.input_buffer);
        self.session.set_system_message(&message);
        self.set_status("System message updated");
        self.return_to_menu();
    }

    fn report_persistence_error(&mut self, error: crate::config::PersistenceError) {
        warn!(error = %error, "settings not saved");
        self.set_status(format!("Error: failed to save settings: {error}"));
    }

    // Theme

    pub fn activate_theme_option(&mut self, option: ThemeOption) {
        match option {
            ThemeOption::Color(slot) => self.theme.cycle(slot),
            ThemeOption::Save => match self.theme_store.save(&self.theme) {
                Ok(()) => {
                    self.theme_on_entry = self.theme;
                    self.set_status("Theme saved successfully");
                }
                Err(e) => {
                    warn!(error = %e, "theme not saved");
                    self.set_status("Error: Failed to save theme");
                }
            },
            ThemeOption::Reset => {
                self.theme = Theme::default();
                self.set_status("Theme reset to default");
            }
            ThemeOption::Back => self.return_to_menu(),
        }
    }

    /// Leave the theme screen discarding changes made since entering it.
    pub fn cancel_theme_edit(&mut self) {
        self.theme = self.theme_on_entry;
        self.return_to_menu();
    }

    // Chat

    fn route(&self) -> Route {
        let provider: Provider = self.config.selected_provider();
        let gateway = self
            .config
            .credential(provider)
            .and_then(|key| self.gateways.connect(provider, &key));
        let model = Some(self.config.selected_model().to_string()).filter(|m| !m.is_empty());
        Route {
            provider_name: provider.display_name().to_string(),
            gateway,
            model,
        }
    }

    /// Send the input buffer as the next user turn.
    pub fn send_message(&mut self) {
        if self.ui.input_buffer.is_empty() {
            return;
        }
        let route = self.route();
        let provider_name = route.provider_name.clone();
        match self.session.send(&self.ui.input_buffer, route) {
            Ok(_) => {
                self.ui.input_buffer.clear();
                self.follow_chat = true;
                self.set_status(format!("Sending message to {provider_name}..."));
            }
            // The turn was not recorded; keep the text so it can be sent later.
            Err(SessionError::Busy) => {
                self.set_status("Please wait for the current reply before sending another message");
            }
            Err(SessionError::EmptyMessage) => {}
            Err(e) => {
                // The user turn is in the transcript, so the text is not lost.
                self.ui.input_buffer.clear();
                self.follow_chat = true;
                self.set_status(format!("Error: {e}"));
            }
        }
        self.observed_status = self.session.status();
    }

    /// Fold the latest session status into the UI. Called once per loop iteration.
    pub fn observe_session(&mut self) {
        let status = self.session.status();
        if status == self.observed_status {
            return;
        }
        match &status {
            SessionStatus::Succeeded(_) => {
                self.clear_status();
                self.follow_chat = true;
            }
            SessionStatus::Failed(reason) => {
                self.set_status(format!("Error: {reason}"));
            }
            SessionStatus::Idle | SessionStatus::Pending(_) => {}
        }
        self.observed_status = status;
    }

    pub fn is_waiting(&self) -> bool {
        self.session.status().is_pending()
    }

    /// Leave the chat. A pending exchange is abandoned; its reply will be dropped.
    pub fn leave_chat(&mut self) {
        if self.is_waiting() {
            self.session.abandon();
            self.set_status("Previous request abandoned");
        }
        self.observed_status = self.session.status();
        self.return_to_menu();
    }

    pub fn clear_conversation(&mut self) {
        self.session.clear_history();
        self.observed_status = self.session.status();
        self.chat_scroll = 0;
        self.follow_chat = true;
        self.set_status("Conversation cleared");
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.session.history()
    }

    pub fn scroll_chat_up(&mut self, lines: u16) {
        self.follow_chat = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    /// The renderer clamps the offset and re-enables following at the bottom.
    pub fn scroll_chat_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    // Export

    pub fn open_export(&mut self) {
        self.enter(Screen::MarkdownExport);
    }

    pub fn export_transcript(&mut self) {
        if self.ui.input_buffer.is_empty() {
            return;
        }
        let path = std::mem::take(&mut self.ui.input_buffer);
        match export::write_markdown(&self.session.history(), &path) {
            Ok(()) => self.set_status(format!("Chat history exported to {path}")),
            Err(e) => {
                warn!(error = %e, "export failed");
                self.set_status("Error: Failed to export chat history");
            }
        }
        self.enter(Screen::Chat);
    }

    pub fn cancel_export(&mut self) {
        self.enter(Screen::Chat);
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick(&mut self) {
        if self.is_waiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}
