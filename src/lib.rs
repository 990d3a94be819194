#![deny(unused_variables)]
#![deny(clippy::no_effect_underscore_binding)]

pub mod config;
pub mod conversion;
pub mod f_ratio;
pub mod genes;
pub mod matrix;
pub mod normalization;

#[path = "../classify/lib.rs"]
pub mod classify;
