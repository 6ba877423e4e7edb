//! atelier: deadlock-free coordination of capacity-1 workplaces.
//!
//! A fixed set of mutually-exclusive workplaces is shared by workers that
//! enter, move between workplaces, and leave. The hard case is the switch: a
//! worker holding workplace A may request workplace B without releasing A.
//! Pending requests form chains and cycles; chains resolve through ordinary
//! FIFO releases, cycles through a simultaneous group handover synchronized
//! by a one-shot barrier.

mod admission;
mod error;
mod handover;
mod resolver;
mod table;
mod workplace;
mod workshop;

pub use error::WorkshopError;
pub use workplace::{WorkerId, Workplace, WorkplaceId};
pub use workshop::{OccupancySnapshot, WorkPermit, Workshop};
