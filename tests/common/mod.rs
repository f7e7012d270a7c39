#![allow(dead_code)]

pub mod archives;
pub mod events;
