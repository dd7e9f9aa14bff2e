#![allow(dead_code)]

pub mod env;
pub mod models;
pub mod wav;
