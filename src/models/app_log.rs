//! App activity log entries.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    InstallAddon,
    /// A reviewer or developer verified a receipt for the app
    ReceiptChecked,
}

impl LogAction {
    pub fn as_str(self) -> &'static str {
        match self {
            LogAction::InstallAddon => "install_addon",
            LogAction::ReceiptChecked => "receipt_checked",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppLogEntry {
    pub app_id: u64,
    pub user_id: Option<u64>,
    pub action: LogAction,
    /// ISO 8601
    pub created: String,
}
