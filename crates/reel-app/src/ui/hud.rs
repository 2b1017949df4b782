//! Progress HUD drawn over the video: a bar along the bottom edge, a
//! position knob, and a `position/duration` time label.

use egui::{Align2, Color32, Context, FontId, Pos2, Stroke};

const PROGRESS_RED: Color32 = Color32::from_rgb(0xFF, 0x5C, 0x5C);
const TRACK_GRAY: Color32 = Color32::from_rgb(0x82, 0x82, 0x82);

const BAR_THICKNESS: f32 = 3.0;
const KNOB_RADIUS: f32 = 5.0;
const BOTTOM_PAD: f32 = 40.0;
const LABEL_SIZE: f32 = 20.0;

pub fn draw_hud(ctx: &Context, position_secs: f64, duration_secs: f64, paused: bool) {
    let painter = ctx.layer_painter(egui::LayerId::new(
        egui::Order::Foreground,
        egui::Id::new("playback-hud"),
    ));
    let rect = ctx.screen_rect();

    let y = rect.bottom() - BOTTOM_PAD;
    let fraction = if duration_secs > 0.0 {
        (position_secs / duration_secs).clamp(0.0, 1.0) as f32
    } else {
        0.0
    };
    let knob_x = rect.left() + rect.width() * fraction;

    painter.line_segment(
        [Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)],
        Stroke::new(BAR_THICKNESS, TRACK_GRAY),
    );
    painter.line_segment(
        [Pos2::new(rect.left(), y), Pos2::new(knob_x, y)],
        Stroke::new(BAR_THICKNESS, PROGRESS_RED),
    );
    painter.circle_filled(Pos2::new(knob_x, y), KNOB_RADIUS, PROGRESS_RED);

    let label = format!(
        "{}/{}{}",
        format_time(position_secs),
        format_time(duration_secs),
        if paused { "  ⏸" } else { "" }
    );
    painter.text(
        Pos2::new(rect.left() + 10.0, y - 10.0),
        Align2::LEFT_BOTTOM,
        label,
        FontId::proportional(LABEL_SIZE),
        PROGRESS_RED,
    );
}

/// `MM:SS`, or `HH:MM:SS` once an hour is reached.
pub fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total / 60) % 60;
    let seconds = total % 60;

    if hours == 0 {
        format!("{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(59.9), "00:59");
        assert_eq!(format_time(60.0), "01:00");
        assert_eq!(format_time(3599.0), "59:59");
    }

    #[test]
    fn switches_to_hours_past_one_hour() {
        assert_eq!(format_time(3600.0), "01:00:00");
        assert_eq!(format_time(3661.0), "01:01:01");
    }

    #[test]
    fn negative_positions_clamp_to_zero() {
        assert_eq!(format_time(-5.0), "00:00");
    }
}
