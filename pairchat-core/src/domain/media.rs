use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a single media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// Which media kinds a session sends and receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaKinds {
    pub audio: bool,
    pub video: bool,
}

impl MediaKinds {
    pub const AUDIO_ONLY: Self = Self {
        audio: true,
        video: false,
    };

    pub const AUDIO_VIDEO: Self = Self {
        audio: true,
        video: true,
    };

    pub fn includes(&self, kind: TrackKind) -> bool {
        match kind {
            TrackKind::Audio => self.audio,
            TrackKind::Video => self.video,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.audio && !self.video
    }

    /// Device wording for user-facing messages ("microphone", "camera/microphone")
    pub fn device_label(&self) -> &'static str {
        match (self.audio, self.video) {
            (true, true) => "camera/microphone",
            (false, true) => "camera",
            _ => "microphone",
        }
    }
}

/// Facing mode requested from the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    #[default]
    User,
    Environment,
}

/// Capture settings for the microphone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            sample_rate: None,
        }
    }
}

/// Capture settings for the camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct VideoConstraints {
    pub ideal_width: u32,
    pub max_width: u32,
    pub ideal_height: u32,
    pub max_height: u32,
    pub ideal_frame_rate: u32,
    pub max_frame_rate: u32,
    pub facing_mode: FacingMode,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            max_width: 1920,
            ideal_height: 720,
            max_height: 1080,
            ideal_frame_rate: 30,
            max_frame_rate: 60,
            facing_mode: FacingMode::User,
        }
    }
}

/// What the engine asks the capture backend for
///
/// A `None` entry means that media kind is neither captured nor requested
/// from the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MediaConstraints {
    #[serde(default)]
    pub audio: Option<AudioConstraints>,
    #[serde(default)]
    pub video: Option<VideoConstraints>,
}

impl MediaConstraints {
    /// Microphone only, tuned for speech
    pub fn voice() -> Self {
        Self {
            audio: Some(AudioConstraints {
                sample_rate: Some(44_100),
                ..Default::default()
            }),
            video: None,
        }
    }

    /// Microphone and camera
    pub fn video() -> Self {
        Self {
            audio: Some(AudioConstraints::default()),
            video: Some(VideoConstraints::default()),
        }
    }

    pub fn kinds(&self) -> MediaKinds {
        MediaKinds {
            audio: self.audio.is_some(),
            video: self.video.is_some(),
        }
    }
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self::voice()
    }
}
