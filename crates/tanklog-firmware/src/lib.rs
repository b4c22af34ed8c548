//! ESP32 firmware-specific modules for tanklog
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: ESP32 peripheral bring-up, the concrete sensor/display/storage
//! trait implementations, Wi-Fi + SNTP time synchronization, and light-sleep
//! power management.

#![no_std]

extern crate alloc;

pub mod display;
pub mod net_time;
pub mod power;
pub mod sd_card;
pub mod sensors;
pub mod wifi_secrets;
