//! Process exit codes, namespaced by the subsystem that failed.
//!
//! Each bootstrap subsystem owns a band of ten codes so an operator can
//! tell from the exit status alone which phase aborted the process.

/// Fatal bootstrap outcomes. `0` is reserved for clean shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    // 10-19: configuration
    ConfigLoadFailed,
    ConfigInvalid,
    // 30-39: plugin loader
    PluginConfigInvalid,
    LoadOrderUnresolvable,
    PluginInitFailed,
    // 50-59: plugin selector
    SelectionFailed,
    // 70-79: backend
    BindFailed,
    ServeFailed,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        match self {
            Self::ConfigLoadFailed => 10,
            Self::ConfigInvalid => 11,
            Self::PluginConfigInvalid => 30,
            Self::LoadOrderUnresolvable => 31,
            Self::PluginInitFailed => 32,
            Self::SelectionFailed => 50,
            Self::BindFailed => 70,
            Self::ServeFailed => 71,
        }
    }

    pub fn subsystem(self) -> &'static str {
        match self {
            Self::ConfigLoadFailed | Self::ConfigInvalid => "config",
            Self::PluginConfigInvalid | Self::LoadOrderUnresolvable | Self::PluginInitFailed => {
                "plugin-loader"
            }
            Self::SelectionFailed => "plugin-selector",
            Self::BindFailed | Self::ServeFailed => "backend",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_stay_in_their_subsystem_band() {
        assert_eq!(ExitCode::ConfigInvalid.code() / 10, 1);
        assert_eq!(ExitCode::PluginInitFailed.code() / 10, 3);
        assert_eq!(ExitCode::SelectionFailed.code() / 10, 5);
        assert_eq!(ExitCode::ServeFailed.code() / 10, 7);
    }
}
