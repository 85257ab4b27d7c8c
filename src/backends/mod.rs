// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for capture, orientation and detection
//!
//! The controller in [`crate::app`] only talks to the traits defined here;
//! concrete engines are injected when the model is built.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  App Layer                  │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                  │
//! │  ┌──────────────┐    ┌──────────────────┐   │
//! │  │   Camera     │    │    Detector      │   │
//! │  │ (registry +  │    │ (face/text/OCR,  │   │
//! │  │  engine)     │    │  rqrr reference) │   │
//! │  └──────────────┘    └──────────────────┘   │
//! │  ┌──────────────┐    ┌──────────────────┐   │
//! │  │ Orientation  │    │ Virtual Camera   │   │
//! │  │   source     │    │ (test engine)    │   │
//! │  └──────────────┘    └──────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Capture engine trait, frame types and the session registry
//! - [`detector`]: Detector traits and the QR-based reference implementation
//! - [`orientation`]: Device orientation and its polling stream
//! - [`virtual_camera`]: In-process capture engine producing synthetic frames

pub mod camera;
pub mod detector;
pub mod orientation;
pub mod virtual_camera;
