//! Audio processing module
//!
//! This module contains the full decoding pipeline:
//! - Envelope extraction and binarization ([`envelope`])
//! - Run-length segmentation into duration runs ([`segment`])
//! - Timing model and calibration ([`timing`])
//! - Symbol and gap classification strategies ([`classify`])
//! - Symbol assembly state machine ([`assembler`])
//! - Offline batch decoder ([`decoder`])
//! - Live capture engine and online calibration ([`capture`])

pub mod assembler;
pub mod capture;
pub mod classify;
pub mod decoder;
pub mod envelope;
pub mod segment;
pub mod timing;
