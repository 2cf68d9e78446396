//! Entity definitions shared by the pictor stores and services

pub mod images;

pub use images::ImageRecord;
