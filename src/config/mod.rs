mod claude_settings;
mod settings;

pub use claude_settings::{default_settings_path, register_hooks, HOOK_EVENTS};
pub use settings::{Command, Config, Settings, UsageSettings, WebhookSettings};
