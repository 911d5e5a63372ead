use image::{imageops, RgbImage};

/// EXIF orientation of a captured buffer relative to the upright scene.
///
/// Values follow the EXIF / `CGImagePropertyOrientation` numbering, so a
/// buffer tagged `Right` must be rotated 90° clockwise to be viewed upright.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Orientation {
    #[default]
    Up,
    UpMirrored,
    Down,
    DownMirrored,
    LeftMirrored,
    Right,
    RightMirrored,
    Left,
}

impl Orientation {
    pub const ALL: [Orientation; 8] = [
        Orientation::Up,
        Orientation::UpMirrored,
        Orientation::Down,
        Orientation::DownMirrored,
        Orientation::LeftMirrored,
        Orientation::Right,
        Orientation::RightMirrored,
        Orientation::Left,
    ];

    pub fn from_exif(value: u8) -> Option<Self> {
        match value {
            1..=8 => Some(Self::ALL[value as usize - 1]),
            _ => None,
        }
    }

    pub fn exif_value(self) -> u8 {
        match self {
            Orientation::Up => 1,
            Orientation::UpMirrored => 2,
            Orientation::Down => 3,
            Orientation::DownMirrored => 4,
            Orientation::LeftMirrored => 5,
            Orientation::Right => 6,
            Orientation::RightMirrored => 7,
            Orientation::Left => 8,
        }
    }

    pub fn is_mirrored(self) -> bool {
        matches!(
            self,
            Orientation::UpMirrored
                | Orientation::DownMirrored
                | Orientation::LeftMirrored
                | Orientation::RightMirrored
        )
    }

    /// Transforms a buffer stored in this orientation into its upright form.
    pub fn apply(self, img: &RgbImage) -> RgbImage {
        match self {
            Orientation::Up => img.clone(),
            Orientation::UpMirrored => imageops::flip_horizontal(img),
            Orientation::Down => imageops::rotate180(img),
            Orientation::DownMirrored => imageops::flip_vertical(img),
            // transpose
            Orientation::LeftMirrored => imageops::flip_horizontal(&imageops::rotate90(img)),
            Orientation::Right => imageops::rotate90(img),
            // transverse
            Orientation::RightMirrored => imageops::flip_horizontal(&imageops::rotate270(img)),
            Orientation::Left => imageops::rotate270(img),
        }
    }
}
