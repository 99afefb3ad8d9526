// Copyright (c) 2019-present Dmitry Stepanov and Fyrox Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Quality settings. The renderer reads them at the point of use every frame, so a change made
//! between two frames takes effect on the next one without rebuilding anything. Persisting them
//! is up to the application, [`QualitySettings::load`] and [`QualitySettings::save`] are simple
//! helpers around `ron`.

use crate::light::csm::FrustumSplitOptions;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use std::{fs::File, path::Path};
use strum_macros::{AsRefStr, EnumString, VariantNames};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Settings i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unable to serialize settings: {0}")]
    Ron(#[from] ron::Error),
    #[error("Unable to parse settings: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Size of the sampling kernel of screen-space ambient occlusion.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum AmbientOcclusionQuality {
    Low,
    Medium,
    #[default]
    High,
}

impl AmbientOcclusionQuality {
    pub fn kernel_size(self) -> usize {
        match self {
            Self::Low => 8,
            Self::Medium => 16,
            Self::High => 32,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbientOcclusionSettings {
    pub enabled: bool,
    pub quality: AmbientOcclusionQuality,
    /// Radius of the sampling hemisphere in world units.
    pub radius: f32,
    pub intensity: f32,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloomSettings {
    pub enabled: bool,
    /// Luminance above which a pixel contributes to bloom.
    pub threshold: f32,
    /// Multiplier of the blurred bloom image in the composite.
    pub strength: f32,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionSettings {
    pub enabled: bool,
    pub max_steps: u32,
    pub max_distance: f32,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowSettings {
    pub enabled: bool,
    /// Size of the cascade atlas of the sun, each cascade gets a quarter of it.
    pub sun_map_size: usize,
    /// Size of spot light shadow maps and of each face of point light cube maps.
    pub light_map_size: usize,
    /// Cascade split of sun lights that do not define their own.
    pub split_options: FrustumSplitOptions,
}

/// Exposure of the tone mapping operator.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Exposure {
    /// Exposure is computed from the average luminance of the frame.
    Auto {
        key_value: f32,
        min_luminance: f32,
        max_luminance: f32,
    },
    Manual(f32),
}

impl Default for Exposure {
    fn default() -> Self {
        Self::Auto {
            key_value: 0.01556,
            min_luminance: 0.00778,
            max_luminance: 64.0,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToneMappingSettings {
    pub exposure: Exposure,
}

/// Quality settings allows you to find optimal balance between performance and graphics quality.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySettings {
    pub ambient_occlusion: AmbientOcclusionSettings,
    pub bloom: BloomSettings,
    pub reflections: ReflectionSettings,
    pub shadows: ShadowSettings,
    pub tone_mapping: ToneMappingSettings,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self::high()
    }
}

impl QualitySettings {
    pub fn high() -> Self {
        Self {
            ambient_occlusion: AmbientOcclusionSettings {
                enabled: true,
                quality: AmbientOcclusionQuality::High,
                radius: 0.5,
                intensity: 1.0,
            },
            bloom: BloomSettings {
                enabled: true,
                threshold: 1.0,
                strength: 0.5,
            },
            reflections: ReflectionSettings {
                enabled: true,
                max_steps: 64,
                max_distance: 25.0,
            },
            shadows: ShadowSettings {
                enabled: true,
                sun_map_size: 4096,
                light_map_size: 1024,
                split_options: Default::default(),
            },
            tone_mapping: Default::default(),
        }
    }

    pub fn medium() -> Self {
        Self {
            ambient_occlusion: AmbientOcclusionSettings {
                enabled: true,
                quality: AmbientOcclusionQuality::Medium,
                radius: 0.5,
                intensity: 1.0,
            },
            bloom: BloomSettings {
                enabled: true,
                threshold: 1.0,
                strength: 0.5,
            },
            reflections: ReflectionSettings {
                enabled: false,
                max_steps: 32,
                max_distance: 15.0,
            },
            shadows: ShadowSettings {
                enabled: true,
                sun_map_size: 2048,
                light_map_size: 512,
                split_options: Default::default(),
            },
            tone_mapping: Default::default(),
        }
    }

    pub fn low() -> Self {
        Self {
            ambient_occlusion: AmbientOcclusionSettings {
                enabled: false,
                quality: AmbientOcclusionQuality::Low,
                radius: 0.5,
                intensity: 1.0,
            },
            bloom: BloomSettings {
                enabled: false,
                threshold: 1.0,
                strength: 0.5,
            },
            reflections: ReflectionSettings {
                enabled: false,
                max_steps: 16,
                max_distance: 10.0,
            },
            shadows: ShadowSettings {
                enabled: false,
                sun_map_size: 1024,
                light_map_size: 256,
                split_options: Default::default(),
            },
            tone_mapping: ToneMappingSettings {
                exposure: Exposure::Manual(1.0),
            },
        }
    }

    pub fn from_ron_str(source: &str) -> Result<Self, SettingsError> {
        Ok(ron::from_str(source)?)
    }

    pub fn to_ron_string(&self) -> Result<String, SettingsError> {
        Ok(ron::ser::to_string_pretty(self, PrettyConfig::default())?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let file = File::open(path)?;
        Ok(ron::de::from_reader(file)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        let file = File::create(path)?;
        ron::ser::to_writer_pretty(file, self, PrettyConfig::default())?;
        Ok(())
    }
}
