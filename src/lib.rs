//! Multifab is a library of distributed block-structured arrays, the data
//! container at the heart of patch-based adaptive mesh refinement (AMR)
//! codes. A logically rectangular index-space domain is cut into a list of
//! boxes (`BoxArray`), each box is assigned to a compute rank
//! (`DistributionMapping`), and every rank stores one dense, ghost-padded,
//! multi-component array per box it owns (`FabArray`, or `MultiFab` for
//! floating point data).
//!
//! Local boxes are visited with `MFIter`, a cursor that optionally splits
//! each box into tiles and answers geometric queries (valid box, grown box,
//! nodal box, tile box) about its current position. Ghost-cell exchange,
//! general copies between layouts, nodal synchronization and global
//! reductions all go through a `Communicator`, which may be a single rank
//! or a group of in-process ranks running on threads.

pub mod box_array;
pub mod config;
pub mod copier;
pub mod distribution_mapping;
pub mod error;
pub mod fab;
pub mod fab_array;
pub mod fab_array_base;
pub mod index_box;
pub mod int_vect;
pub mod message;
pub mod mf_iter;
pub mod multifab;
pub mod periodicity;
pub mod selection;

pub use box_array::BoxArray;
pub use config::Config;
pub use copier::CopyOp;
pub use distribution_mapping::{DistributionMapping, DistributionStrategy};
pub use error::{Error, Result};
pub use fab::{ArrayView, ArrayViewMut, Element, Fab};
pub use fab_array::{FabArray, MultiFab};
pub use fab_array_base::FabArrayBase;
pub use index_box::IndexBox;
pub use int_vect::{IndexType, IntVect};
pub use mf_iter::{MFItInfo, MFIter, TileInfo};
pub use periodicity::Periodicity;
pub use selection::{Combine, Selection, Transfer};
