#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use zarrs_nd2::backend::{Backend, BackendPlugin, ContainerKind};
use zarrs_nd2::metadata::{
    Attributes, CoordInfo, ExperimentLoop, TimeLoop, TimeLoopParams, VoxelSize, ZStackLoop,
    ZStackLoopParams,
};

type JsonMap = serde_json::Map<String, serde_json::Value>;

static READS: LazyLock<Mutex<BTreeMap<PathBuf, usize>>> = LazyLock::new(Default::default);

/// Number of frames read from the fixture at `path`.
pub fn reads(path: &Path) -> usize {
    READS.lock().unwrap().get(path).copied().unwrap_or(0)
}

/// Everything a fixture file describes; frames are generated from their index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub attributes: Attributes,
    #[serde(default)]
    pub text_info: JsonMap,
    #[serde(default)]
    pub experiment: Vec<ExperimentLoop>,
    #[serde(default)]
    pub coord_info: Vec<CoordInfo>,
    pub voxel_size: VoxelSize,
    #[serde(default)]
    pub channel_names: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub custom_data: JsonMap,
    /// Width of the generated frames when the attributes do not record one.
    #[serde(default)]
    pub frame_width: Option<usize>,
}

/// Raw value of element `j` (in storage order) of frame `index`.
pub fn pixel_value(index: usize, j: usize) -> u64 {
    (index * 1000 + j) as u64
}

pub struct FixtureBackend {
    path: PathBuf,
    fixture: Fixture,
    open: bool,
}

impl FixtureBackend {
    pub fn create(path: &Path) -> zarrs_nd2::Result<Box<dyn Backend>> {
        let bytes = std::fs::read(path)?;
        let fixture: Fixture = serde_json::from_slice(&bytes[4..])?;
        Ok(Box::new(Self {
            path: path.to_path_buf(),
            fixture,
            open: true,
        }))
    }

    fn check_open(&self) -> zarrs_nd2::Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(zarrs_nd2::Error::general("fixture is closed"))
        }
    }
}

impl Backend for FixtureBackend {
    fn open(&mut self) -> zarrs_nd2::Result<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> zarrs_nd2::Result<()> {
        self.open = false;
        Ok(())
    }

    fn attributes(&self) -> zarrs_nd2::Result<Attributes> {
        Ok(self.fixture.attributes.clone())
    }

    fn text_info(&self) -> zarrs_nd2::Result<JsonMap> {
        Ok(self.fixture.text_info.clone())
    }

    fn experiment(&self) -> zarrs_nd2::Result<Vec<ExperimentLoop>> {
        Ok(self.fixture.experiment.clone())
    }

    fn metadata(&self) -> zarrs_nd2::Result<serde_json::Value> {
        Ok(self.fixture.metadata.clone())
    }

    fn voxel_size(&self) -> zarrs_nd2::Result<VoxelSize> {
        Ok(self.fixture.voxel_size)
    }

    fn channel_names(&self) -> zarrs_nd2::Result<Vec<String>> {
        Ok(self.fixture.channel_names.clone())
    }

    fn custom_data(&self) -> zarrs_nd2::Result<JsonMap> {
        Ok(self.fixture.custom_data.clone())
    }

    fn coord_info(&self) -> zarrs_nd2::Result<Vec<CoordInfo>> {
        Ok(self.fixture.coord_info.clone())
    }

    fn read_frame(&self, index: usize) -> zarrs_nd2::Result<Bytes> {
        self.check_open()?;
        *READS.lock().unwrap().entry(self.path.clone()).or_default() += 1;
        let attrs = &self.fixture.attributes;
        let item = attrs.bits_per_component_in_memory as usize / 8;
        let elements = attrs.height_px as usize
            * attrs.width().or(self.fixture.frame_width).unwrap_or(0)
            * attrs.component_count as usize;
        let mut out = Vec::with_capacity(elements * item);
        for j in 0..elements {
            out.extend_from_slice(&pixel_value(index, j).to_le_bytes()[..item]);
        }
        Ok(Bytes::from(out))
    }
}

inventory::submit! {
    BackendPlugin::new(ContainerKind::Modern, "json-fixture", FixtureBackend::create)
}

pub fn init_logger() {
    env_logger::try_init().ok();
}

/// Write `fixture` to a temporary file with the given signature.
pub fn write_with_magic(magic: &[u8], fixture: &Fixture) -> NamedTempFile {
    init_logger();
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(magic).expect("write magic");
    serde_json::to_writer(&mut file, fixture).expect("write fixture");
    file.flush().expect("flush fixture");
    file
}

pub fn write_fixture(fixture: &Fixture) -> NamedTempFile {
    write_with_magic(&zarrs_nd2::backend::MODERN_MAGIC, fixture)
}

pub fn attributes(height: u32, width: u32, channels: u32, components: u32) -> Attributes {
    Attributes {
        bits_per_component_in_memory: 16,
        bits_per_component_significant: Some(16),
        channel_count: Some(channels),
        component_count: components,
        height_px: height,
        pixel_data_type: Some("unsigned".to_string()),
        sequence_count: None,
        width_bytes: None,
        width_px: Some(width),
    }
}

pub fn z_loop(count: usize, step_um: f64) -> ExperimentLoop {
    ExperimentLoop::ZStack(ZStackLoop {
        count,
        nesting_level: 1,
        parameters: ZStackLoopParams {
            step_um,
            home_index: 0,
            bottom_to_top: true,
        },
    })
}

pub fn t_loop(count: usize, period_ms: f64) -> ExperimentLoop {
    ExperimentLoop::Time(TimeLoop {
        count,
        nesting_level: 0,
        parameters: TimeLoopParams {
            period_ms,
            start_ms: 0.0,
            duration_ms: 0.0,
        },
    })
}

/// Coordinate records matching `experiment`, in declaration order.
pub fn coord_info_for(experiment: &[ExperimentLoop]) -> Vec<CoordInfo> {
    experiment
        .iter()
        .enumerate()
        .map(|(index, l)| CoordInfo {
            index,
            loop_type: l.loop_type().to_string(),
            count: l.count(),
        })
        .collect()
}

pub fn fixture(attributes: Attributes, experiment: Vec<ExperimentLoop>) -> Fixture {
    let channel_names = (0..attributes.channels())
        .map(|i| format!("Channel{i}"))
        .collect();
    Fixture {
        attributes,
        text_info: JsonMap::new(),
        coord_info: coord_info_for(&experiment),
        experiment,
        voxel_size: VoxelSize {
            x: 0.5,
            y: 0.5,
            z: 1.0,
        },
        channel_names,
        metadata: serde_json::json!({"contents": {"frameCount": 0}}),
        custom_data: JsonMap::new(),
        frame_width: None,
    }
}

/// Z(3) x T(4), 64x64 frames with two channels.
pub fn zt_fixture() -> Fixture {
    fixture(attributes(64, 64, 2, 2), vec![z_loop(3, 0.25), t_loop(4, 100.0)])
}
