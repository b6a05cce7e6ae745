use connect_core::{NotificationSink, UiSettings};
use nu_ansi_term::{Color, Style};
use tracing::{info, warn};

/// Prints user notices to the terminal as a boxed dialog.
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    fn render(title: &str, message: &str, action_label: &str) -> String {
        let title = Style::new().fg(Color::LightYellow).bold().paint(title);
        let action = Style::new().fg(Color::LightCyan).paint(format!("[{}]", action_label));
        format!("\n  {}\n  {}\n  {}\n", title, message, action)
    }
}

impl NotificationSink for ConsoleNotifier {
    fn notify(&self, title: &str, message: &str, action_label: &str) {
        warn!(target: "wallet_event", "{}: {}", title, message);
        println!("{}", Self::render(title, message, action_label));
    }
}

/// The CLI has no view to switch, so the selected mode is only logged.
pub struct ConsoleUiSettings;

impl UiSettings for ConsoleUiSettings {
    fn set_ui_mode(&self, mode: &str) {
        info!(mode, "UI mode selected");
    }
}
