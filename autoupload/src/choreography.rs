//! Fixed keystroke sequences against the upload UI and the native file dialog.
//!
//! Each function assumes one known dialog or panel layout. When the target UI
//! changes, this is the file to edit; the workflow only calls these by name.

use crate::errors::AutomationError;
use crate::pacing::Pause;
use crate::screen::{Key, Screen};
use crate::templates::Marker;
use std::path::Path;
use std::time::Duration;

const FILE_NAME_TIMEOUT: Duration = Duration::from_secs(60);
const FILE_NAME_CONFIDENCE: f32 = 0.75;

pub const CARD_TIMESTAMPS: [&str; 5] = ["30:00:00", "10:00:00", "15:00:00", "20:00:00", "25:00:00"];

async fn shift_tab(screen: &Screen, times: usize) -> Result<(), AutomationError> {
    for _ in 0..times {
        screen.hotkey(&[Key::Shift], Key::Tab)?;
        screen.pause(Pause::Tiny).await;
    }
    Ok(())
}

/// Focuses the file-name box of an open dialog if it can be seen.
async fn focus_file_name(screen: &Screen, settle: Pause) -> bool {
    match screen
        .click_marker(Marker::FileName, FILE_NAME_TIMEOUT, FILE_NAME_CONFIDENCE)
        .await
    {
        Ok(_) => {
            screen.pause(settle).await;
            true
        }
        Err(_) => false,
    }
}

/// Open dialog: browse to `folder`, filter to `*.mp4`, open the first hit.
pub async fn select_first_video(screen: &Screen, folder: &Path) -> Result<(), AutomationError> {
    screen.pause(Pause::Long).await;
    focus_file_name(screen, Pause::Medium).await;

    screen.ctrl('l').await?;
    screen.ctrl('a').await?;
    screen.paste_text(&folder.to_string_lossy()).await?;
    screen.key(Key::Enter)?;
    screen.pause(Pause::Medium).await;

    screen.hotkey(&[Key::Alt], Key::Char('n'))?;
    screen.pause(Pause::Tiny).await;
    screen.ctrl('a').await?;
    screen.paste_text("*.mp4").await?;
    screen.key(Key::Enter)?;
    screen.pause(Pause::Long).await;

    shift_tab(screen, 2).await?;
    screen.press(Key::Space, 1, Pause::Tiny).await?;
    screen.press(Key::Tab, 2, Pause::Small).await?;
    screen.key(Key::Enter)?;
    screen.pause(Pause::Long).await;
    Ok(())
}

/// Open dialog already in the job folder: pick the first image.
pub async fn select_thumbnail(screen: &Screen) -> Result<(), AutomationError> {
    screen.pause(Pause::Medium).await;
    shift_tab(screen, 2).await?;
    screen.press(Key::Space, 1, Pause::Small).await?;
    screen.press(Key::Tab, 4, Pause::Tiny).await?;
    screen.key(Key::Enter)?;
    screen.pause(Pause::Long).await;
    Ok(())
}

/// Open dialog already in the job folder: filter to `*.srt`, open the first hit.
pub async fn select_subtitle(screen: &Screen) -> Result<(), AutomationError> {
    focus_file_name(screen, Pause::Small).await;

    screen.paste_text("*.srt").await?;
    screen.pause(Pause::Tiny).await;
    screen.key(Key::Enter)?;
    screen.pause(Pause::Small).await;
    shift_tab(screen, 2).await?;
    screen.press(Key::Space, 1, Pause::Medium).await?;
    screen.press(Key::Tab, 4, Pause::Tiny).await?;
    screen.key(Key::Enter)?;
    screen.pause(Pause::Long).await;
    Ok(())
}

pub async fn maximize_window(screen: &Screen) -> Result<(), AutomationError> {
    screen.hotkey(&[Key::Alt], Key::Space)?;
    screen.pause(Pause::Tiny).await;
    screen.press(Key::Char('x'), 1, Pause::Small).await
}

/// Title box focused: move to the description box. The experimental form
/// has one extra field in between.
pub async fn title_to_description(
    screen: &Screen,
    experimental_ui: bool,
) -> Result<(), AutomationError> {
    let tabs = if experimental_ui { 3 } else { 2 };
    screen.press(Key::Tab, tabs, Pause::Tiny).await?;
    screen.pause(Pause::Small).await;
    Ok(())
}

/// Description focused: scroll to the bottom and open the thumbnail picker.
pub async fn open_thumbnail_picker(screen: &Screen) -> Result<(), AutomationError> {
    screen.press(Key::Enter, 1, Pause::Tiny).await?;
    screen.press(Key::Tab, 2, Pause::Tiny).await?;
    screen.pause(Pause::Small).await;
    screen.press(Key::End, 2, Pause::Small).await?;
    screen.pause(Pause::Medium).await;
    screen.press(Key::Enter, 1, Pause::Small).await
}

/// Playlist dropdown open: tick the first playlist and close.
pub async fn choose_first_playlist(screen: &Screen) -> Result<(), AutomationError> {
    screen.press(Key::Tab, 1, Pause::Tiny).await?;
    screen.press(Key::Enter, 1, Pause::Small).await?;
    screen.press(Key::Tab, 2, Pause::Tiny).await?;
    screen.press(Key::Enter, 1, Pause::Small).await
}

/// Step-2 entry clicked: open the subtitle row.
pub async fn open_subtitle_panel(screen: &Screen) -> Result<(), AutomationError> {
    screen.press(Key::Tab, 4, Pause::Tiny).await?;
    screen.press(Key::Enter, 1, Pause::Small).await
}

/// "Continue" not clickable: reach it by keyboard.
pub async fn continue_by_keyboard(screen: &Screen) -> Result<(), AutomationError> {
    screen.press(Key::Tab, 3, Pause::Tiny).await?;
    screen.press(Key::Enter, 1, Pause::Long).await
}

/// End-screen panel visible: open the template picker.
pub async fn open_end_screen_picker(screen: &Screen) -> Result<(), AutomationError> {
    screen.press(Key::Tab, 2, Pause::Tiny).await?;
    screen.press(Key::Enter, 1, Pause::Medium).await?;
    screen.pause(Pause::Medium).await;
    Ok(())
}

/// End-screen template chosen: fill two video slots and the subscribe slot.
pub async fn fill_end_screen_elements(screen: &Screen) -> Result<(), AutomationError> {
    screen.press(Key::Tab, 3, Pause::Tiny).await?;
    screen.press(Key::Enter, 2, Pause::Small).await?; // video 1
    screen.press(Key::Enter, 2, Pause::Small).await?; // video 2
    screen.press(Key::Enter, 1, Pause::Small).await?;
    screen.press(Key::Char('d'), 1, Pause::Tiny).await?;
    screen.press(Key::Enter, 1, Pause::Small).await?;
    screen.press(Key::Tab, 3, Pause::Tiny).await?;
    screen.press(Key::Enter, 2, Pause::Small).await
}

/// End screen saved: open the cards panel.
pub async fn open_cards_panel(screen: &Screen) -> Result<(), AutomationError> {
    screen.pause(Pause::Small).await;
    screen.press(Key::Tab, 1, Pause::Tiny).await?;
    screen.press(Key::Enter, 1, Pause::Small).await
}

/// Card menu open: add a playlist card.
pub async fn add_playlist_card(screen: &Screen) -> Result<(), AutomationError> {
    screen.press(Key::Tab, 4, Pause::Tiny).await?;
    screen.press(Key::Enter, 1, Pause::Small).await?;
    screen.pause(Pause::Small).await;
    screen.press(Key::Tab, 3, Pause::Tiny).await?;
    screen.press(Key::Enter, 1, Pause::Medium).await
}

/// Card menu open: choose the "video" card type.
pub async fn open_video_card(screen: &Screen) -> Result<(), AutomationError> {
    screen.pause(Pause::Tiny).await;
    screen.press(Key::Tab, 1, Pause::Tiny).await?;
    screen.press(Key::Enter, 1, Pause::Medium).await?;
    screen.pause(Pause::Small).await;
    Ok(())
}

/// "Specific video" chosen: paste the link into the search box.
pub async fn enter_card_link(screen: &Screen, link: &str) -> Result<(), AutomationError> {
    screen.press(Key::Tab, 3, Pause::Tiny).await?;
    screen.paste_text(link).await?;
    screen.pause(Pause::Small).await;
    Ok(())
}

/// Card selected: type its start timestamp.
pub async fn enter_card_timestamp(screen: &Screen, timestamp: &str) -> Result<(), AutomationError> {
    screen.press(Key::Tab, 5, Pause::Tiny).await?;
    screen.paste_text(timestamp).await?;
    screen.pause(Pause::Tiny).await;
    screen.press(Key::Tab, 1, Pause::Small).await
}

/// Schedule panel open: move to the date field and open it.
pub async fn open_schedule_date(screen: &Screen) -> Result<(), AutomationError> {
    screen.press(Key::Tab, 8, Pause::Tiny).await?;
    screen.press(Key::Enter, 1, Pause::Small).await
}

/// Replace the focused field's content and confirm with Enter.
pub async fn replace_field(screen: &Screen, value: &str) -> Result<(), AutomationError> {
    screen.ctrl('a').await?;
    screen.paste_text(value).await?;
    screen.press(Key::Enter, 1, Pause::Small).await
}

/// Browser tab: go to `url` and hard-refresh after maximising.
pub async fn navigate(screen: &Screen, url: &str, new_tab: bool) -> Result<(), AutomationError> {
    if new_tab {
        screen.hotkey(&[Key::Ctrl], Key::Char('t'))?;
        screen.pause(Pause::Small).await;
    }
    screen.ctrl('l').await?;
    screen.paste_text(url).await?;
    screen.press(Key::Enter, 1, Pause::Medium).await?;

    if let Err(e) = maximize_window(screen).await {
        tracing::debug!("Maximize failed: {e}");
    }

    screen.press(Key::F5, 1, Pause::Medium).await
}
