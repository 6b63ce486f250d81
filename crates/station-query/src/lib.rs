//! Read-side queries over loaded forecast and archive tables.
//!
//! A station is chosen by exact name or as the nearest to a point; a bounding
//! box selects every station inside it (edges inclusive). Rows are then
//! filtered to an inclusive time range and returned with the owning
//! station's name and coordinates.
//!
//! Empty outcomes are errors that say which stage came up empty, so callers
//! can tell "no such station" from "no data in that window":
//! [`QueryError::StationNotFound`], [`QueryError::NoStationsInBox`] and
//! [`QueryError::NoRowsInRange`].

pub mod error;
pub mod limits;
pub mod service;

pub use error::{QueryError, Result};
pub use limits::QueryLimits;
pub use service::{EnrichedObservation, QueryService, StationLookup};
