//! Display proxy command lines.

use crate::config::types::DisplayIndex;
use crate::registry::GuiPermissions;

/// Flags passed to both halves of the proxy pair.
pub const COMMON_ARGS: [&str; 2] = ["--no-daemon", "--no-notifications"];

const SERVER_PREFIX: [&str; 4] = ["start", "--no-pulseaudio", "--no-mdns", "--encoding=rgb"];
const CLIENT_PREFIX: [&str; 4] = ["attach", "--no-tray", "--compress=0", "--encoding=rgb"];

/// Environment variable telling the client which host runs the server.
pub const SOCKET_HOSTNAME_ENV: &str = "XPRA_SOCKET_HOSTNAME";

fn switch(enabled: bool, on: &str, off: &str) -> String {
    let flag = if enabled { on } else { off };
    flag.to_string()
}

/// Translate GUI permissions into proxy switches: the common flags followed
/// by one on/off flag per capability.
pub fn translate(gui: &GuiPermissions) -> Vec<String> {
    let mut args: Vec<String> = COMMON_ARGS.iter().map(|a| a.to_string()).collect();
    args.push(switch(gui.system_tray, "--system-tray", "--no-system-tray"));
    args.push(switch(gui.cursors, "--cursors", "--no-cursors"));
    args.push(switch(gui.clipboard, "--clipboard", "--no-clipboard"));
    args
}

pub fn server_args(permission_args: &[String], display: DisplayIndex) -> Vec<String> {
    let mut args: Vec<String> = SERVER_PREFIX.iter().map(|a| a.to_string()).collect();
    args.extend(permission_args.iter().cloned());
    args.push(display.to_string());
    args
}

pub fn client_args(permission_args: &[String]) -> Vec<String> {
    let mut args: Vec<String> = CLIENT_PREFIX.iter().map(|a| a.to_string()).collect();
    args.extend(permission_args.iter().cloned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn as_set(args: &[String]) -> BTreeSet<&str> {
        args.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_translate_every_permission_combination() {
        for bits in 0..8u8 {
            let gui = GuiPermissions {
                system_tray: bits & 1 != 0,
                cursors: bits & 2 != 0,
                clipboard: bits & 4 != 0,
            };
            let args = translate(&gui);
            assert_eq!(args.len(), 5);

            let set = as_set(&args);
            assert!(set.contains("--no-daemon"));
            assert!(set.contains("--no-notifications"));
            assert_eq!(set.contains("--system-tray"), gui.system_tray);
            assert_eq!(set.contains("--no-system-tray"), !gui.system_tray);
            assert_eq!(set.contains("--cursors"), gui.cursors);
            assert_eq!(set.contains("--no-cursors"), !gui.cursors);
            assert_eq!(set.contains("--clipboard"), gui.clipboard);
            assert_eq!(set.contains("--no-clipboard"), !gui.clipboard);
        }
    }

    #[test]
    fn test_server_args_end_with_display() {
        let perms = translate(&GuiPermissions::default());
        let args = server_args(&perms, DisplayIndex(100));
        assert_eq!(args[0], "start");
        assert_eq!(args.last().map(String::as_str), Some(":100"));
        let set = as_set(&args);
        for flag in ["--no-pulseaudio", "--no-mdns", "--encoding=rgb", "--no-clipboard"] {
            assert!(set.contains(flag), "missing {}", flag);
        }
        assert_eq!(args.len(), SERVER_PREFIX.len() + perms.len() + 1);
    }

    #[test]
    fn test_client_args_attach_without_display() {
        let perms = translate(&GuiPermissions {
            clipboard: true,
            ..GuiPermissions::default()
        });
        let args = client_args(&perms);
        assert_eq!(args[0], "attach");
        let set = as_set(&args);
        assert!(set.contains("--no-tray"));
        assert!(set.contains("--compress=0"));
        assert!(set.contains("--clipboard"));
        assert!(!args.iter().any(|a| a.starts_with(':')));
    }
}
