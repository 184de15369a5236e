//! # Complete Model Families

pub mod resnet;
