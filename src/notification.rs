use serde::Deserialize;

/// Token separating the old and new paths of a rename or move.
pub const PATH_CHANGE_SEPARATOR: &str = " -> ";

/// The closed set of changes the watcher reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Delete,
    Rename,
    Move,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "CREATE",
            Action::Delete => "DELETE",
            Action::Rename => "RENAME",
            Action::Move => "MOVE",
        }
    }
}

impl std::str::FromStr for Action {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Action::Create),
            "DELETE" => Ok(Action::Delete),
            "RENAME" => Ok(Action::Rename),
            "MOVE" => Ok(Action::Move),
            other => Err(DecodeError::UnsupportedAction(other.to_owned())),
        }
    }
}

/// A decoded change notification. Transient: consumed once, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub action: Action,
    /// Single path for create/delete; `old -> new` for rename/move.
    pub path: String,
    pub is_dir: bool,
    /// Root of the watch session that produced the event.
    pub watch_folder: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid notification payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported action {0:?}")]
    UnsupportedAction(String),
    #[error("isDir must be \"true\" or \"false\", got {0:?}")]
    InvalidIsDir(String),
}

/// `isDir` travels as a string on the wire; booleans are accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireFlag {
    Bool(bool),
    Text(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNotification {
    action: String,
    path: String,
    is_dir: WireFlag,
    #[serde(default)]
    watch_folder: String,
}

impl TryFrom<WireNotification> for ChangeNotification {
    type Error = DecodeError;

    fn try_from(wire: WireNotification) -> Result<Self, Self::Error> {
        let is_dir = match wire.is_dir {
            WireFlag::Bool(b) => b,
            WireFlag::Text(s) => match s.as_str() {
                "true" => true,
                "false" => false,
                _ => return Err(DecodeError::InvalidIsDir(s)),
            },
        };
        Ok(ChangeNotification {
            action: wire.action.parse()?,
            path: wire.path,
            is_dir,
            watch_folder: wire.watch_folder,
        })
    }
}

impl ChangeNotification {
    /// Decode a JSON payload as delivered by the transport.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let wire: WireNotification = serde_json::from_slice(bytes)?;
        wire.try_into()
    }
}

/// The `old -> new` pair carried by a rename or move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathChange<'a> {
    pub old: &'a str,
    pub new: &'a str,
}

impl<'a> PathChange<'a> {
    /// Split on the separator token. Anything other than exactly two non-empty
    /// sides is rejected.
    pub fn parse(path: &'a str) -> Option<Self> {
        let mut parts = path.split(PATH_CHANGE_SEPARATOR);
        let old = parts.next()?;
        let new = parts.next()?;
        if parts.next().is_some() || old.is_empty() || new.is_empty() {
            return None;
        }
        Some(Self { old, new })
    }
}
