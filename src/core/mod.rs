mod access_unit;
mod descriptor;
pub mod quality;
mod record;
mod streams;

pub use access_unit::{AccessUnit, AccessUnitHeader, SIZE_HEADER};
pub use descriptor::*;
pub use record::{ClassId, Clip, Clips, Noise, NoiseKind, PairingCase};
pub use streams::{DescriptorStreamSet, SubSequence};
