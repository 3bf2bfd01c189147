use ratatui::style::Color;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct Theme {
    pub header_bg: Color,
    pub feed_bg: Color,
    pub input_bg: Color,
    pub text_fg: Color,
    pub muted_fg: Color,
    pub accent_fg: Color,
    pub user_fg: Color,
    pub tool_fg: Color,
    pub error_fg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header_bg: Color::Rgb(36, 36, 36),
            feed_bg: Color::Rgb(24, 24, 24),
            input_bg: Color::Rgb(44, 44, 44),
            text_fg: Color::Rgb(225, 225, 225),
            muted_fg: Color::Rgb(150, 150, 150),
            accent_fg: Color::Rgb(90, 145, 200),
            user_fg: Color::Rgb(80, 190, 100),
            tool_fg: Color::Rgb(230, 150, 60),
            error_fg: Color::Rgb(220, 90, 90),
        }
    }
}

impl Theme {
    pub fn with_overrides(overrides: Option<&ThemeColorsToml>) -> Self {
        let mut theme = Self::default();
        let Some(colors) = overrides else {
            return theme;
        };
        apply(&mut theme.header_bg, colors.header_bg.as_ref());
        apply(&mut theme.feed_bg, colors.feed_bg.as_ref());
        apply(&mut theme.input_bg, colors.input_bg.as_ref());
        apply(&mut theme.text_fg, colors.text_fg.as_ref());
        apply(&mut theme.muted_fg, colors.muted_fg.as_ref());
        apply(&mut theme.accent_fg, colors.accent_fg.as_ref());
        apply(&mut theme.user_fg, colors.user_fg.as_ref());
        apply(&mut theme.tool_fg, colors.tool_fg.as_ref());
        apply(&mut theme.error_fg, colors.error_fg.as_ref());
        theme
    }
}

fn apply(slot: &mut Color, value: Option<&RgbToml>) {
    if let Some(rgb) = value {
        *slot = rgb.to_color();
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThemeColorsToml {
    pub header_bg: Option<RgbToml>,
    pub feed_bg: Option<RgbToml>,
    pub input_bg: Option<RgbToml>,
    pub text_fg: Option<RgbToml>,
    pub muted_fg: Option<RgbToml>,
    pub accent_fg: Option<RgbToml>,
    pub user_fg: Option<RgbToml>,
    pub tool_fg: Option<RgbToml>,
    pub error_fg: Option<RgbToml>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RgbToml {
    r: u8,
    g: u8,
    b: u8,
}

impl RgbToml {
    fn to_color(self) -> Color {
        Color::Rgb(self.r, self.g, self.b)
    }
}
