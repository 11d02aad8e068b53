//! Service layer: external collaborators and the resolution flow

pub mod forensic;
pub mod resolver;
pub mod web2;
