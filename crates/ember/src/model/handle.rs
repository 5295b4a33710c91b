use std::fmt;

use super::core_trait::{TextGenerator, TextTokenizer};

/// Device a model runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceTag {
    Cpu,
    Cuda(usize),
}

impl DeviceTag {
    pub fn is_accelerator(&self) -> bool {
        matches!(self, Self::Cuda(_))
    }
}

impl fmt::Display for DeviceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}

/// Weight precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    F16,
    F32,
}

/// Where weights go and in which precision.
///
/// There are exactly two placements; see [`Placement::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub device: DeviceTag,
    pub precision: Precision,
    /// Let the loader place weights automatically
    pub auto_device_map: bool,
}

impl Placement {
    /// Accelerator mode: half precision, automatic placement.
    pub const ACCELERATOR: Placement = Placement {
        device: DeviceTag::Cuda(0),
        precision: Precision::F16,
        auto_device_map: true,
    };

    /// Fallback mode: full precision on the CPU, no device map.
    pub const CPU: Placement = Placement {
        device: DeviceTag::Cpu,
        precision: Precision::F32,
        auto_device_map: false,
    };

    pub fn select(accelerator_available: bool) -> Self {
        if accelerator_available {
            Self::ACCELERATOR
        } else {
            Self::CPU
        }
    }
}

/// # ModelHandle
///
/// A loaded tokenizer and model, plus the device they live on.
///
/// Created once by the lifecycle manager during `initialize` and shared
/// read-only with the request handler until `finalize`.
pub struct ModelHandle {
    tokenizer: Box<dyn TextTokenizer>,
    generator: Box<dyn TextGenerator>,
    device: DeviceTag,
}

impl ModelHandle {
    pub fn new(
        tokenizer: Box<dyn TextTokenizer>,
        generator: Box<dyn TextGenerator>,
        device: DeviceTag,
    ) -> Self {
        Self {
            tokenizer,
            generator,
            device,
        }
    }

    pub fn tokenizer(&self) -> &dyn TextTokenizer {
        self.tokenizer.as_ref()
    }

    pub fn generator(&self) -> &dyn TextGenerator {
        self.generator.as_ref()
    }

    pub fn device(&self) -> DeviceTag {
        self.device
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}
