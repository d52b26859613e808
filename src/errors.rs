// SPDX-License-Identifier: MPL-2.0

//! Error types for the frame pipeline
//!
//! None of these errors are fatal to a running pipeline: conversion and render
//! failures degrade to pass-through frames and detection failures leave the
//! previously cached result in effect.

use std::fmt;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Umbrella error for pipeline operations
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// Pixel format conversion errors
    Conversion(ConversionError),
    /// Detector capability errors
    Detection(DetectionError),
    /// Overlay drawing errors
    Render(RenderError),
    /// Configuration errors
    Config(ConfigError),
}

/// Which plane of a planar frame an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneKind {
    Y,
    U,
    V,
}

impl fmt::Display for PlaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaneKind::Y => write!(f, "Y"),
            PlaneKind::U => write!(f, "U"),
            PlaneKind::V => write!(f, "V"),
        }
    }
}

/// Malformed or undersized plane buffers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// Frame has a zero dimension
    EmptyFrame { width: u32, height: u32 },
    /// Plane holds fewer bytes than `stride * rows`
    PlaneTooSmall {
        plane: PlaneKind,
        len: usize,
        required: usize,
    },
    /// Plane stride is smaller than its logical row width
    StrideTooSmall {
        plane: PlaneKind,
        stride: u32,
        row_width: u32,
    },
    /// Packed RGB input does not match `width * height * 3`
    PackedSizeMismatch { len: usize, expected: usize },
}

/// Detector capability failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    /// The detector reported a failure
    Failed(String),
    /// The detection task panicked or was cancelled
    Panicked(String),
    /// The detection runtime could not be started
    Runtime(String),
}

/// Overlay drawing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A plane is too small for the frame geometry
    PlaneTooSmall {
        plane: PlaneKind,
        len: usize,
        required: usize,
    },
    /// Pixel conversion failed inside a drawing strategy
    Conversion(ConversionError),
}

/// Configuration loading and validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A value is out of range
    Invalid(String),
    /// The configuration document could not be parsed
    Parse(String),
    /// The configuration file could not be read
    Io(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Conversion(e) => write!(f, "Conversion error: {}", e),
            PipelineError::Detection(e) => write!(f, "Detection error: {}", e),
            PipelineError::Render(e) => write!(f, "Render error: {}", e),
            PipelineError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::EmptyFrame { width, height } => {
                write!(f, "Frame has zero dimension: {}x{}", width, height)
            }
            ConversionError::PlaneTooSmall {
                plane,
                len,
                required,
            } => write!(
                f,
                "{} plane too small: {} bytes, need {}",
                plane, len, required
            ),
            ConversionError::StrideTooSmall {
                plane,
                stride,
                row_width,
            } => write!(
                f,
                "{} plane stride {} is smaller than row width {}",
                plane, stride, row_width
            ),
            ConversionError::PackedSizeMismatch { len, expected } => write!(
                f,
                "Packed RGB buffer is {} bytes, expected {}",
                len, expected
            ),
        }
    }
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionError::Failed(msg) => write!(f, "Detector failed: {}", msg),
            DetectionError::Panicked(msg) => write!(f, "Detection task panicked: {}", msg),
            DetectionError::Runtime(msg) => write!(f, "Detection runtime failed: {}", msg),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::PlaneTooSmall {
                plane,
                len,
                required,
            } => write!(
                f,
                "{} plane too small to draw on: {} bytes, need {}",
                plane, len, required
            ),
            RenderError::Conversion(e) => write!(f, "Overlay conversion failed: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid(msg) => write!(f, "Invalid value: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse failed: {}", msg),
            ConfigError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}
impl std::error::Error for ConversionError {}
impl std::error::Error for DetectionError {}
impl std::error::Error for RenderError {}
impl std::error::Error for ConfigError {}

// Conversions from sub-errors to PipelineError
impl From<ConversionError> for PipelineError {
    fn from(err: ConversionError) -> Self {
        PipelineError::Conversion(err)
    }
}

impl From<DetectionError> for PipelineError {
    fn from(err: DetectionError) -> Self {
        PipelineError::Detection(err)
    }
}

impl From<RenderError> for PipelineError {
    fn from(err: RenderError) -> Self {
        PipelineError::Render(err)
    }
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::Config(err)
    }
}

impl From<ConversionError> for RenderError {
    fn from(err: ConversionError) -> Self {
        RenderError::Conversion(err)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
