use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::{HubError, Result};

/// Highest brightness a pixel can have
pub const MAX_BRIGHTNESS: u8 = 9;

/// A grid of pixel brightness values for the hub's light matrix
///
/// Rows are stored top to bottom, each left to right. Every row has the same width and every
/// pixel is in `0..=9`.
///
/// ```
/// use hubrepl::Image;
///
/// let image = Image::parse("09090:99999:99999:09990:00900")?;
/// assert_eq!((image.width(), image.height()), (5, 5));
/// assert_eq!(image.pixel(1, 0), Some(9));
/// assert_eq!(image.to_string(), "Image('09090:99999:99999:09990:00900:')");
/// # Ok::<(), hubrepl::HubError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Image {
    rows: Vec<Vec<u8>>,
}

impl Image {
    /// Parse row notation: digit rows separated by `:` or by newlines
    ///
    /// Blank rows and whitespace around rows are ignored, so a trailing `:` is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidArgument`] if a character is not a digit, the rows differ in
    /// width, or there are no rows.
    pub fn parse(notation: &str) -> Result<Self> {
        let separator = if notation.contains(':') { ':' } else { '\n' };
        let rows = notation
            .split(separator)
            .map(str::trim)
            .filter(|row| !row.is_empty())
            .map(|row| {
                row.chars()
                    .map(|c| {
                        c.to_digit(10)
                            .and_then(|d| u8::try_from(d).ok())
                            .ok_or_else(|| {
                                HubError::InvalidArgument(format!(
                                    "{c:?} is not a brightness digit"
                                ))
                            })
                    })
                    .collect::<Result<Vec<u8>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_rows(rows)
    }

    /// Build an image from a flat row-major buffer
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidArgument`] if the buffer length is not `width * height`, a
    /// dimension is zero, or a value exceeds [`MAX_BRIGHTNESS`].
    pub fn from_buffer(width: usize, height: usize, buffer: &[u8]) -> Result<Self> {
        if buffer.len() != pixel_count(width, height)? {
            return Err(HubError::InvalidArgument(format!(
                "buffer length {} must be width*height ({width}*{height})",
                buffer.len()
            )));
        }
        if width == 0 {
            return Err(HubError::InvalidArgument("image width must not be zero".to_string()));
        }
        Self::from_rows(buffer.chunks(width).map(<[u8]>::to_vec).collect())
    }

    /// Build an image from nested rows
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidArgument`] if the rows are empty or uneven, or a value
    /// exceeds [`MAX_BRIGHTNESS`].
    pub fn from_rows(rows: Vec<Vec<u8>>) -> Result<Self> {
        let width = rows.first().map_or(0, Vec::len);
        if width == 0 {
            return Err(HubError::InvalidArgument("image has no pixels".to_string()));
        }
        if rows.iter().any(|row| row.len() != width) {
            return Err(HubError::InvalidArgument(
                "not all rows have equal width".to_string(),
            ));
        }
        if let Some(bad) = rows.iter().flatten().find(|&&b| b > MAX_BRIGHTNESS) {
            return Err(HubError::InvalidArgument(format!(
                "brightness {bad} is above {MAX_BRIGHTNESS}"
            )));
        }
        Ok(Self { rows })
    }

    /// An all-dark image
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidArgument`] if a dimension is zero or the size overflows.
    pub fn blank(width: usize, height: usize) -> Result<Self> {
        Self::from_buffer(width, height, &vec![0; pixel_count(width, height)?])
    }

    /// Look up one of the firmware's named icons, e.g. `"HEART"`
    #[must_use]
    pub fn icon(name: &str) -> Option<Self> {
        icons::by_name(name).and_then(|rows| Self::parse(rows).ok())
    }

    /// Number of columns
    #[must_use]
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Number of rows
    #[must_use]
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Brightness at column `x`, row `y`
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<u8> {
        self.rows.get(y).and_then(|row| row.get(x)).copied()
    }

    /// Change the brightness at column `x`, row `y`
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidArgument`] if the position is outside the image or the
    /// brightness exceeds [`MAX_BRIGHTNESS`].
    pub fn set_pixel(&mut self, x: usize, y: usize, brightness: u8) -> Result<()> {
        if brightness > MAX_BRIGHTNESS {
            return Err(HubError::InvalidArgument(format!(
                "brightness {brightness} is above {MAX_BRIGHTNESS}"
            )));
        }
        let pixel = self
            .rows
            .get_mut(y)
            .and_then(|row| row.get_mut(x))
            .ok_or_else(|| {
                HubError::InvalidArgument(format!("pixel ({x}, {y}) is outside the image"))
            })?;
        *pixel = brightness;
        Ok(())
    }

    /// Move the picture by `x` columns to the left and `y` rows up
    ///
    /// Negative values move right and down. Uncovered pixels are dark.
    #[must_use]
    pub fn shift(&self, x: isize, y: isize) -> Self {
        let rows = (0..self.height())
            .map(|y0| {
                (0..self.width())
                    .map(|x0| {
                        let source = y0
                            .checked_add_signed(y)
                            .zip(x0.checked_add_signed(x));
                        source
                            .and_then(|(sy, sx)| self.pixel(sx, sy))
                            .unwrap_or(0)
                    })
                    .collect()
            })
            .collect();
        Self { rows }
    }

    /// Move the picture `n` columns left
    #[must_use]
    pub fn shift_left(&self, n: isize) -> Self {
        self.shift(n, 0)
    }

    /// Move the picture `n` columns right
    #[must_use]
    pub fn shift_right(&self, n: isize) -> Self {
        self.shift(-n, 0)
    }

    /// Move the picture `n` rows up
    #[must_use]
    pub fn shift_up(&self, n: isize) -> Self {
        self.shift(0, n)
    }

    /// Move the picture `n` rows down
    #[must_use]
    pub fn shift_down(&self, n: isize) -> Self {
        self.shift(0, -n)
    }

    /// Row notation with a trailing `:`, as the firmware prints it
    #[must_use]
    pub fn rows_notation(&self) -> String {
        self.rows
            .iter()
            .map(|row| {
                let mut text: String = row.iter().map(|b| char::from(b'0' + b)).collect();
                text.push(':');
                text
            })
            .collect()
    }
}

impl FromStr for Image {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn pixel_count(width: usize, height: usize) -> Result<usize> {
    width.checked_mul(height).ok_or_else(|| {
        HubError::InvalidArgument(format!("image size {width}x{height} is too large"))
    })
}

/// Renders the constructor expression understood by the hub after `Image = hub.Image`
impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image('{}')", self.rows_notation())
    }
}

/// Row notation of the icons built into the hub firmware
pub mod icons {
    #![allow(missing_docs)]

    pub const ANGRY: &str = "90009:09090:00000:99999:90909:";
    pub const ARROW_E: &str = "00900:00090:99999:00090:00900:";
    pub const ARROW_N: &str = "00900:09990:90909:00900:00900:";
    pub const ARROW_NE: &str = "00999:00099:00909:09000:90000:";
    pub const ARROW_NW: &str = "99900:99000:90900:00090:00009:";
    pub const ARROW_S: &str = "00900:00900:90909:09990:00900:";
    pub const ARROW_SE: &str = "90000:09000:00909:00099:00999:";
    pub const ARROW_SW: &str = "00009:00090:90900:99000:99900:";
    pub const ARROW_W: &str = "00900:09000:99999:09000:00900:";
    pub const ASLEEP: &str = "00000:99099:00000:09990:00000:";
    pub const BUTTERFLY: &str = "99099:99999:00900:99999:99099:";
    pub const CHESSBOARD: &str = "09090:90909:09090:90909:09090:";
    pub const CLOCK1: &str = "00090:00090:00900:00000:00000:";
    pub const CLOCK2: &str = "00000:00099:00900:00000:00000:";
    pub const CLOCK3: &str = "00000:00000:00999:00000:00000:";
    pub const CLOCK4: &str = "00000:00000:00900:00099:00000:";
    pub const CLOCK5: &str = "00000:00000:00900:00090:00090:";
    pub const CLOCK6: &str = "00000:00000:00900:00900:00900:";
    pub const CLOCK7: &str = "00000:00000:00900:09000:09000:";
    pub const CLOCK8: &str = "00000:00000:00900:99000:00000:";
    pub const CLOCK9: &str = "00000:00000:99900:00000:00000:";
    pub const CLOCK10: &str = "00000:99000:00900:00000:00000:";
    pub const CLOCK11: &str = "09000:09000:00900:00000:00000:";
    pub const CLOCK12: &str = "00900:00900:00900:00000:00000:";
    pub const CONFUSED: &str = "00000:09090:00000:09090:90909:";
    pub const COW: &str = "90009:90009:99999:09990:00900:";
    pub const DIAMOND: &str = "00900:09090:90009:09090:00900:";
    pub const DIAMOND_SMALL: &str = "00000:00900:09090:00900:00000:";
    pub const DUCK: &str = "09900:99900:09999:09990:00000:";
    pub const FABULOUS: &str = "99999:99099:00000:09090:09990:";
    pub const GHOST: &str = "99999:90909:99999:99999:90909:";
    pub const GIRAFFE: &str = "99000:09000:09000:09990:09090:";
    pub const GO_DOWN: &str = "00000:99999:09990:00900:00000:";
    pub const GO_LEFT: &str = "00090:00990:09990:00990:00090:";
    pub const GO_RIGHT: &str = "09000:09900:09990:09900:09000:";
    pub const GO_UP: &str = "00000:00900:09990:99999:00000:";
    pub const HAPPY: &str = "00000:09090:00000:90009:09990:";
    pub const HEART: &str = "09090:99999:99999:09990:00900:";
    pub const HEART_SMALL: &str = "00000:09090:09990:00900:00000:";
    pub const HOUSE: &str = "00900:09990:99999:09990:09090:";
    pub const MEH: &str = "09090:00000:00090:00900:09000:";
    pub const MUSIC_CROTCHET: &str = "00900:00900:00900:99900:99900:";
    pub const MUSIC_QUAVER: &str = "00900:00990:00909:99900:99900:";
    pub const MUSIC_QUAVERS: &str = "09999:09009:09009:99099:99099:";
    pub const NO: &str = "90009:09090:00900:09090:90009:";
    pub const PACMAN: &str = "09999:99090:99900:99990:09999:";
    pub const PITCHFORK: &str = "90909:90909:99999:00900:00900:";
    pub const RABBIT: &str = "90900:90900:99990:99090:99990:";
    pub const ROLLERSKATE: &str = "00099:00099:99999:99999:09090:";
    pub const SAD: &str = "00000:09090:00000:09990:90009:";
    pub const SILLY: &str = "90009:00000:99999:00909:00999:";
    pub const SKULL: &str = "09990:90909:99999:09990:09990:";
    pub const SMILE: &str = "00000:00000:00000:90009:09990:";
    pub const SNAKE: &str = "99000:99099:09090:09990:00000:";
    pub const SQUARE: &str = "99999:90009:90009:90009:99999:";
    pub const SQUARE_SMALL: &str = "00000:09990:09090:09990:00000:";
    pub const STICKFIGURE: &str = "00900:99999:00900:09090:90009:";
    pub const SURPRISED: &str = "09090:00000:00900:09090:00900:";
    pub const SWORD: &str = "00900:00900:00900:09990:00900:";
    pub const TARGET: &str = "00900:09990:99099:09990:00900:";
    pub const TORTOISE: &str = "00000:09990:99999:09090:00000:";
    pub const TRIANGLE: &str = "00000:00900:09090:99999:00000:";
    pub const TRIANGLE_LEFT: &str = "90000:99000:90900:90090:99999:";
    pub const TSHIRT: &str = "99099:99999:09990:09990:09990:";
    pub const UMBRELLA: &str = "09990:99999:00900:90900:09900:";
    pub const XMAS: &str = "00900:09990:00900:09990:99999:";
    pub const YES: &str = "00000:00009:00090:90900:09000:";

    /// Clock faces starting at twelve o'clock
    pub const ALL_CLOCKS: [&str; 12] = [
        CLOCK12, CLOCK1, CLOCK2, CLOCK3, CLOCK4, CLOCK5, CLOCK6, CLOCK7, CLOCK8, CLOCK9, CLOCK10,
        CLOCK11,
    ];

    /// Arrows clockwise starting at north
    pub const ALL_ARROWS: [&str; 8] = [
        ARROW_N, ARROW_NE, ARROW_E, ARROW_SE, ARROW_S, ARROW_SW, ARROW_W, ARROW_NW,
    ];

    /// Every named icon
    pub const ALL: [(&str, &str); 67] = [
        ("ANGRY", ANGRY),
        ("ARROW_E", ARROW_E),
        ("ARROW_N", ARROW_N),
        ("ARROW_NE", ARROW_NE),
        ("ARROW_NW", ARROW_NW),
        ("ARROW_S", ARROW_S),
        ("ARROW_SE", ARROW_SE),
        ("ARROW_SW", ARROW_SW),
        ("ARROW_W", ARROW_W),
        ("ASLEEP", ASLEEP),
        ("BUTTERFLY", BUTTERFLY),
        ("CHESSBOARD", CHESSBOARD),
        ("CLOCK1", CLOCK1),
        ("CLOCK2", CLOCK2),
        ("CLOCK3", CLOCK3),
        ("CLOCK4", CLOCK4),
        ("CLOCK5", CLOCK5),
        ("CLOCK6", CLOCK6),
        ("CLOCK7", CLOCK7),
        ("CLOCK8", CLOCK8),
        ("CLOCK9", CLOCK9),
        ("CLOCK10", CLOCK10),
        ("CLOCK11", CLOCK11),
        ("CLOCK12", CLOCK12),
        ("CONFUSED", CONFUSED),
        ("COW", COW),
        ("DIAMOND", DIAMOND),
        ("DIAMOND_SMALL", DIAMOND_SMALL),
        ("DUCK", DUCK),
        ("FABULOUS", FABULOUS),
        ("GHOST", GHOST),
        ("GIRAFFE", GIRAFFE),
        ("GO_DOWN", GO_DOWN),
        ("GO_LEFT", GO_LEFT),
        ("GO_RIGHT", GO_RIGHT),
        ("GO_UP", GO_UP),
        ("HAPPY", HAPPY),
        ("HEART", HEART),
        ("HEART_SMALL", HEART_SMALL),
        ("HOUSE", HOUSE),
        ("MEH", MEH),
        ("MUSIC_CROTCHET", MUSIC_CROTCHET),
        ("MUSIC_QUAVER", MUSIC_QUAVER),
        ("MUSIC_QUAVERS", MUSIC_QUAVERS),
        ("NO", NO),
        ("PACMAN", PACMAN),
        ("PITCHFORK", PITCHFORK),
        ("RABBIT", RABBIT),
        ("ROLLERSKATE", ROLLERSKATE),
        ("SAD", SAD),
        ("SILLY", SILLY),
        ("SKULL", SKULL),
        ("SMILE", SMILE),
        ("SNAKE", SNAKE),
        ("SQUARE", SQUARE),
        ("SQUARE_SMALL", SQUARE_SMALL),
        ("STICKFIGURE", STICKFIGURE),
        ("SURPRISED", SURPRISED),
        ("SWORD", SWORD),
        ("TARGET", TARGET),
        ("TORTOISE", TORTOISE),
        ("TRIANGLE", TRIANGLE),
        ("TRIANGLE_LEFT", TRIANGLE_LEFT),
        ("TSHIRT", TSHIRT),
        ("UMBRELLA", UMBRELLA),
        ("XMAS", XMAS),
        ("YES", YES),
    ];

    /// Row notation of the icon called `name`
    #[must_use]
    pub fn by_name(name: &str) -> Option<&'static str> {
        ALL.iter()
            .find(|(icon, _)| *icon == name)
            .map(|(_, rows)| *rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_parse_notations() {
        let colon = assert_ok!(Image::parse("90009:09090:00000:99999:90909:"));
        let lines = assert_ok!(Image::parse("90009\n09090\n00000\n99999\n90909\n"));
        assert_eq!(colon, lines);
        assert_eq!(colon.width(), 5);
        assert_eq!(colon.height(), 5);
        assert_eq!(colon.pixel(0, 0), Some(9));
        assert_eq!(colon.pixel(4, 3), Some(9));
        assert_eq!(colon.pixel(5, 0), None);

        let wide: Image = assert_ok!("123:456".parse());
        assert_eq!((wide.width(), wide.height()), (3, 2));
    }

    #[test]
    fn test_parse_rejects_bad_rows() {
        assert_err!(Image::parse("999:99"));
        assert_err!(Image::parse("9a9:999"));
        assert_err!(Image::parse(""));
        assert_err!(Image::parse(":::"));
    }

    #[test]
    fn test_from_buffer_and_rows() {
        let image = assert_ok!(Image::from_buffer(3, 2, &[1, 2, 3, 4, 5, 6]));
        assert_eq!(image.pixel(2, 1), Some(6));
        assert_eq!(image, assert_ok!(Image::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6]])));

        let err = assert_err!(Image::from_buffer(3, 3, &[0; 4]));
        assert!(err.to_string().contains("width*height"));
        assert_err!(Image::from_buffer(0, 0, &[]));
        assert_err!(Image::from_rows(vec![vec![10]]));

        let err = assert_err!(Image::from_buffer(usize::MAX, 2, &[]));
        assert!(matches!(err, HubError::InvalidArgument(_)));
        assert_err!(Image::blank(usize::MAX, usize::MAX));

        let blank = assert_ok!(Image::blank(5, 5));
        assert_eq!(blank.to_string(), "Image('00000:00000:00000:00000:00000:')");
    }

    #[test]
    fn test_set_pixel() {
        let mut image = assert_ok!(Image::blank(5, 5));
        assert_ok!(image.set_pixel(2, 3, 9));
        assert_eq!(image.pixel(2, 3), Some(9));
        assert_eq!(image.pixel(3, 2), Some(0));

        let err = assert_err!(image.set_pixel(0, 0, 10));
        assert!(matches!(err, HubError::InvalidArgument(_)));
        assert_err!(image.set_pixel(5, 0, 1));
    }

    #[test]
    fn test_shift() {
        let image = assert_ok!(Image::parse("123:456:789"));
        assert_eq!(image.shift_left(1), assert_ok!(Image::parse("230:560:890")));
        assert_eq!(image.shift_right(1), assert_ok!(Image::parse("012:045:078")));
        assert_eq!(image.shift_up(1), assert_ok!(Image::parse("456:789:000")));
        assert_eq!(image.shift_down(2), assert_ok!(Image::parse("000:000:123")));
        assert_eq!(image.shift(0, 0), image);
        assert_eq!(image.shift(3, 0), assert_ok!(Image::blank(3, 3)));
    }

    #[test]
    fn test_icons() {
        for (name, rows) in icons::ALL {
            let image = Image::parse(rows).unwrap_or_else(|e| panic!("{name}: {e}"));
            assert_eq!((image.width(), image.height()), (5, 5), "{name}");
            assert_eq!(image.rows_notation(), rows, "{name}");
        }
        assert_eq!(icons::by_name("HEART"), Some(icons::HEART));
        assert_eq!(icons::by_name("heart"), None);
        assert_eq!(Image::icon("YES").map(|i| i.pixel(4, 1)), Some(Some(9)));
        assert_eq!(icons::ALL_CLOCKS[0], icons::CLOCK12);
        assert_eq!(icons::ALL_ARROWS[2], icons::ARROW_E);
    }
}
