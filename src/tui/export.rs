use anyhow::Result;
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

use super::state::UiState;

// Global clipboard manager channel - initialized once on first use
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Text that Ctrl-Y copies: the loaded artifact's id, else whatever is typed in the id field.
pub fn copy_target(state: &UiState) -> Option<String> {
    state
        .session
        .artifact
        .as_ref()
        .map(|a| a.id.clone())
        .or_else(|| Some(state.session.artifact_id.trim().to_string()))
        .filter(|s| !s.is_empty())
}

/// Copy the artifact id and report the result on the info line.
pub fn copy_and_show(state: &mut UiState) {
    match copy_target(state) {
        Some(id) => match copy_to_clipboard(&id) {
            Ok(()) => state.info = format!("Copied: {id}"),
            Err(e) => state.info = format!("Copy failed: {e:#}"),
        },
        None => state.info = "No artifact id to copy yet.".into(),
    }
}

/// Initialize the clipboard manager thread if not already initialized.
/// The thread keeps each clipboard instance alive long enough for clipboard
/// managers on Linux to read the contents.
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                if let Ok(mut clipboard) = Clipboard::new() {
                    if clipboard.set_text(&text).is_ok() {
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Queue `text` for the clipboard without blocking the UI thread.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}
