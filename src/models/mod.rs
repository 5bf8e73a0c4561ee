//! Core data models for the photo upload service.
//!
//! A batch of photos is keyed by a client-chosen personal code; each stored
//! photo is tracked as a [`photo::PhotoRecord`] in the in-memory registry.

pub mod photo;
