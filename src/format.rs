use std::time::Duration;

use crate::gateway::Payload;
use crate::guild::{NowPlaying, PlayerState};

const BAR_SEGMENTS: usize = 12;

/// A 12-segment bar with a marker at `percent` (0.0..=1.0). Values outside that
/// range render an empty bar.
pub fn progress_bar(percent: f64) -> String {
    let marker = (percent * BAR_SEGMENTS as f64).floor();
    (0..BAR_SEGMENTS)
        .map(|i| if i as f64 == marker { "🔘" } else { "▬" })
        .collect()
}

/// `m:ss`, or `h:mm:ss` once past the hour.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Defuses mass mentions and direction overrides in user-supplied text.
pub fn filter(input: &str) -> String {
    input
        .replace('\u{202E}', "")
        .replace("@everyone", "@\u{0435}veryone")
        .replace("@here", "@h\u{0435}re")
        .trim()
        .to_string()
}

pub fn render_active(now: &NowPlaying, state: &PlayerState) -> Payload {
    let track = &now.item.payload;
    let mut content = format!(
        "🎶 **{}**\nRequested by {}",
        filter(&track.title),
        now.item.requester.mention()
    );

    let elapsed = now.elapsed();
    match track.length {
        Some(length) if !length.is_zero() => {
            let elapsed = elapsed.min(length);
            let percent = elapsed.as_secs_f64() / length.as_secs_f64();
            content.push_str(&format!(
                "\n▶ {} `[{}/{}]`",
                progress_bar(percent),
                format_duration(elapsed),
                format_duration(length)
            ));
        }
        _ => content.push_str(&format!("\n▶ `[{}/LIVE]`", format_duration(elapsed))),
    }

    if let Some(emoji) = state.repeat.emoji() {
        content.push(' ');
        content.push_str(emoji);
    }
    if state.queued > 0 {
        content.push_str(&format!("\n{} more in queue", state.queued));
    }
    Payload::new(content)
}

pub fn render_idle() -> Payload {
    Payload::new(format!("⏹ **No music playing**\n{}", progress_bar(-1.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guild::{RepeatMode, Track};
    use crate::queue::QueueItem;
    use tokio::time::Instant;

    #[test]
    fn bar_marks_position() {
        let bar = progress_bar(0.0);
        assert!(bar.starts_with("🔘"));
        assert_eq!(bar.chars().count(), 12);

        let bar = progress_bar(0.5);
        assert_eq!(bar.chars().position(|c| c == '🔘'), Some(6));

        assert!(!progress_bar(-1.0).contains('🔘'));
        assert!(!progress_bar(1.0).contains('🔘'));
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_secs(5)), "0:05");
        assert_eq!(format_duration(Duration::from_secs(754)), "12:34");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1:02:03");
    }

    #[test]
    fn filter_defuses_mentions() {
        assert_eq!(filter(" hi @everyone "), "hi @\u{0435}veryone");
        assert_eq!(filter("@here\u{202E}"), "@h\u{0435}re");
    }

    #[tokio::test(start_paused = true)]
    async fn active_render_includes_progress_and_queue() {
        let now = NowPlaying {
            item: QueueItem::new(
                9u64,
                Track::new("Song @everyone", "https://example.invalid/s", Some(Duration::from_secs(120))),
            ),
            started_at: Instant::now(),
        };
        tokio::time::advance(Duration::from_secs(60)).await;

        let state = PlayerState {
            current: Some(now.clone()),
            queued: 2,
            repeat: RepeatMode::All,
        };
        let payload = render_active(&now, &state);
        assert!(payload.content.contains("Song @\u{0435}veryone"));
        assert!(payload.content.contains("<@9>"));
        assert!(payload.content.contains("[1:00/2:00]"));
        assert!(payload.content.contains("🔁"));
        assert!(payload.content.contains("2 more in queue"));
    }

    #[test]
    fn idle_render() {
        let payload = render_idle();
        assert!(payload.content.starts_with("⏹ **No music playing**"));
        assert!(!payload.content.contains('🔘'));
    }
}
