pub mod axis;
pub mod backend;
pub mod element;
mod error;
pub mod file;
pub mod frame;
pub mod index;
pub mod labels;
pub mod metadata;
pub mod position;
pub mod sizes;
pub mod storage;

pub use ndarray;
pub use zarrs;

pub use axis::{Axis, Sizes};
pub use error::{Error, Result};
pub use file::{Nd2File, Nd2FileState, imread, imread_labeled, imread_lazy};
pub use position::Position;
