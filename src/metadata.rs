use std::{borrow::Cow, fmt, num::NonZeroU64};

use serde::{Deserialize, Serialize};
use zarrs::{
    array::{
        ArrayMetadataV3, FillValueMetadata,
        chunk_grid::{RegularBoundedChunkGrid, RegularBoundedChunkGridConfiguration},
        data_type,
    },
    metadata::{Configuration, v3::MetadataV3},
    plugin::ExtensionAliasesV3,
};

use crate::axis::Axis;

/// Core image attributes, describing the byte layout of every frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attributes {
    pub bits_per_component_in_memory: u32,
    pub bits_per_component_significant: Option<u32>,
    pub channel_count: Option<u32>,
    pub component_count: u32,
    pub height_px: u32,
    /// "unsigned", "float" or "signed"; unsigned when absent.
    pub pixel_data_type: Option<String>,
    pub sequence_count: Option<u32>,
    pub width_bytes: Option<u32>,
    pub width_px: Option<u32>,
}

impl Attributes {
    /// Number of channels, treating an unset count as one.
    pub fn channels(&self) -> usize {
        match self.channel_count {
            Some(n) if n > 0 => n as usize,
            _ => 1,
        }
    }

    /// Number of components per channel (e.g. 3 for RGB).
    pub fn components_per_channel(&self) -> usize {
        self.component_count as usize / self.channels()
    }

    /// Frame width in pixels, derived from the row stride if the pixel width is missing.
    pub fn width(&self) -> Option<usize> {
        if let Some(w) = self.width_px.filter(|&w| w > 0) {
            return Some(w as usize);
        }
        let pixel_bytes = self.component_count as usize * (self.bits_per_component_in_memory as usize / 8);
        match self.width_bytes {
            Some(stride) if pixel_bytes > 0 => Some(stride as usize / pixel_bytes),
            _ => None,
        }
    }

    pub fn pixel_type(&self) -> crate::Result<PixelType> {
        let kind = self.pixel_data_type.as_deref().unwrap_or("unsigned");
        PixelType::from_kind(kind, self.bits_per_component_in_memory)
    }
}

/// Physical size of a voxel, in microns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoxelSize {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A structured record of one loop over frames: `(axis index, loop type, count)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordInfo {
    pub index: usize,
    pub loop_type: String,
    pub count: usize,
}

impl CoordInfo {
    pub fn axis(&self) -> Axis {
        Axis::from_loop_type(&self.loop_type)
    }
}

/// One experiment loop, describing how one axis varies across frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExperimentLoop {
    #[serde(rename = "ZStackLoop")]
    ZStack(ZStackLoop),
    #[serde(rename = "TimeLoop")]
    Time(TimeLoop),
    #[serde(rename = "NETimeLoop")]
    NeTime(NeTimeLoop),
    #[serde(rename = "XYPosLoop")]
    XyPosition(XyPosLoop),
    Unknown(UnknownLoop),
}

impl ExperimentLoop {
    pub fn count(&self) -> usize {
        match self {
            ExperimentLoop::ZStack(l) => l.count,
            ExperimentLoop::Time(l) => l.count,
            ExperimentLoop::NeTime(l) => l.count,
            ExperimentLoop::XyPosition(l) => l.count,
            ExperimentLoop::Unknown(l) => l.count,
        }
    }

    /// The loop type name as stored in the file.
    pub fn loop_type(&self) -> &'static str {
        match self {
            ExperimentLoop::ZStack(_) => "ZStackLoop",
            ExperimentLoop::Time(_) => "TimeLoop",
            ExperimentLoop::NeTime(_) => "NETimeLoop",
            ExperimentLoop::XyPosition(_) => "XYPosLoop",
            ExperimentLoop::Unknown(_) => "Unknown",
        }
    }

    pub fn axis(&self) -> Axis {
        Axis::from_loop_type(self.loop_type())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZStackLoop {
    pub count: usize,
    #[serde(default)]
    pub nesting_level: usize,
    pub parameters: ZStackLoopParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZStackLoopParams {
    pub step_um: f64,
    #[serde(default)]
    pub home_index: usize,
    #[serde(default)]
    pub bottom_to_top: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeLoop {
    pub count: usize,
    #[serde(default)]
    pub nesting_level: usize,
    pub parameters: TimeLoopParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeLoopParams {
    pub period_ms: f64,
    #[serde(default)]
    pub start_ms: f64,
    #[serde(default)]
    pub duration_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeTimeLoop {
    pub count: usize,
    #[serde(default)]
    pub nesting_level: usize,
    pub parameters: NeTimeLoopParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeTimeLoopParams {
    pub periods: Vec<Period>,
}

/// One sub-period of a non-equidistant time loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub count: usize,
    pub period_ms: f64,
    #[serde(default)]
    pub start_ms: f64,
    #[serde(default)]
    pub duration_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XyPosLoop {
    pub count: usize,
    #[serde(default)]
    pub nesting_level: usize,
    pub parameters: XyPosLoopParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XyPosLoopParams {
    #[serde(default)]
    pub is_setting_z: bool,
    pub points: Vec<StagePosition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagePosition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub stage_position_um: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnknownLoop {
    pub count: usize,
    #[serde(default)]
    pub nesting_level: usize,
}

/// Element type of the pixels in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl PixelType {
    /// Resolve from a data type name (only its first character matters) and bits per component.
    pub fn from_kind(kind: &str, bits: u32) -> crate::Result<Self> {
        let out = match (kind.chars().next(), bits) {
            (Some('u') | None, 8) => Self::UInt8,
            (Some('u') | None, 16) => Self::UInt16,
            (Some('u') | None, 32) => Self::UInt32,
            (Some('u') | None, 64) => Self::UInt64,
            (Some('s' | 'i'), 8) => Self::Int8,
            (Some('s' | 'i'), 16) => Self::Int16,
            (Some('s' | 'i'), 32) => Self::Int32,
            (Some('s' | 'i'), 64) => Self::Int64,
            (Some('f'), 32) => Self::Float32,
            (Some('f'), 64) => Self::Float64,
            _ => {
                return Err(crate::Error::UnsupportedPixelType {
                    kind: kind.to_string(),
                    bits,
                });
            }
        };
        Ok(out)
    }

    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 => 1,
            Self::UInt16 | Self::Int16 => 2,
            Self::UInt32 | Self::Int32 | Self::Float32 => 4,
            Self::UInt64 | Self::Int64 | Self::Float64 => 8,
        }
    }

    /// Numpy-style type string, e.g. `uint16`.
    pub fn name(self) -> &'static str {
        match self {
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Creates a regular chunk grid with the given chunk shape.
fn convert_chunk_grid(chunk_shape: &[u64]) -> crate::Result<MetadataV3> {
    let chunk_shape: Vec<_> = chunk_shape
        .iter()
        .map(|&n| NonZeroU64::new(n).ok_or_else(|| crate::Error::general("zero chunk extent")))
        .collect::<crate::Result<Vec<_>>>()?;
    let out = MetadataV3::new_with_serializable_configuration(
        RegularBoundedChunkGrid::aliases_v3()
            .default_name
            .clone()
            .to_string(),
        &RegularBoundedChunkGridConfiguration { chunk_shape },
    )?;

    Ok(out)
}

fn convert_data_type(pixel_type: PixelType) -> MetadataV3 {
    let data_type = match pixel_type {
        PixelType::UInt8 => data_type::uint8(),
        PixelType::Int8 => data_type::int8(),
        PixelType::UInt16 => data_type::uint16(),
        PixelType::Int16 => data_type::int16(),
        PixelType::UInt32 => data_type::uint32(),
        PixelType::Int32 => data_type::int32(),
        PixelType::UInt64 => data_type::uint64(),
        PixelType::Int64 => data_type::int64(),
        PixelType::Float32 => data_type::float32(),
        PixelType::Float64 => data_type::float64(),
    };
    let data_type_name = data_type
        .name_v3()
        .map_or_else(String::new, Cow::into_owned);
    let data_type_configuration = data_type.configuration_v3();
    if data_type_configuration.is_empty() {
        MetadataV3::new(data_type_name)
    } else {
        MetadataV3::new_with_configuration(data_type_name, data_type_configuration)
    }
}

fn convert_fill_value() -> FillValueMetadata {
    FillValueMetadata::Number(serde_json::Number::from(0))
}

/// Frames are stored little-endian; single-byte types carry no endianness.
fn convert_codec(pixel_type: PixelType) -> MetadataV3 {
    if pixel_type.size() == 1 {
        return MetadataV3::new("bytes".to_string());
    }
    let mut config = serde_json::Map::new();
    config.insert("endian".to_string(), "little".into());
    MetadataV3::new_with_configuration("bytes".to_string(), Configuration::from(config))
}

fn convert_chunk_key_encoding() -> MetadataV3 {
    let mut config = serde_json::Map::new();
    config.insert("separator".to_string(), "/".into());
    MetadataV3::new_with_configuration("default".to_string(), Configuration::from(config))
}

/// Zarr V3 metadata for an array whose chunks are single frames.
pub(crate) fn frame_array_metadata(
    shape: Vec<u64>,
    chunk_shape: &[u64],
    pixel_type: PixelType,
    dimension_names: &[Axis],
    attributes: serde_json::Map<String, serde_json::Value>,
) -> crate::Result<ArrayMetadataV3> {
    let chunk_grid = convert_chunk_grid(chunk_shape)?;
    let data_type = convert_data_type(pixel_type);
    let fill_value = convert_fill_value();
    let mut attributes = attributes;
    attributes.insert(
        "dimensions".to_string(),
        dimension_names
            .iter()
            .map(|a| serde_json::Value::from(a.tag().to_string()))
            .collect(),
    );
    let out = ArrayMetadataV3::new(
        shape,
        chunk_grid,
        data_type,
        fill_value,
        vec![convert_codec(pixel_type)],
    )
    .with_chunk_key_encoding(convert_chunk_key_encoding())
    .with_attributes(attributes);
    Ok(out)
}
