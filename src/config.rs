use std::io::{Read, Write};
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::int_vect::IntVect;
use crate::mf_iter::{default_tile_size, MFItInfo};




/**
 * Run-time settings shared by iteration and the demo driver. Any field
 * missing from a stored config takes its default value.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {

    /// Tile size handed to iterators when tiling is on. An empty list means
    /// the built-in default; otherwise one entry per axis.
    pub tile_size: Vec<i64>,

    /// Whether iterators tile by default.
    pub do_tiling: bool,

    /// Largest side length of any box after chopping the domain.
    pub max_grid_size: i64,

    /// Number of cells per axis of the demo domain.
    pub domain_size: i64,

    /// Ghost cells allocated around each box.
    pub num_ghost: i64,

    /// Number of in-process ranks the demo runs.
    pub num_ranks: usize,

    /// Whether the demo domain wraps around on every axis.
    pub periodic: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tile_size: Vec::new(),
            do_tiling: false,
            max_grid_size: 32,
            domain_size: 64,
            num_ghost: 1,
            num_ranks: 1,
            periodic: false,
        }
    }
}




// ============================================================================
impl Config {

    /**
     * Read a config from CBOR.
     */
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        ciborium::de::from_reader(reader).map_err(|e| Error::invalid(format!("unreadable config: {}", e)))
    }

    /**
     * Write this config as CBOR.
     */
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        ciborium::ser::into_writer(self, writer).map_err(|e| Error::invalid(format!("unwritable config: {}", e)))
    }

    /**
     * The tile size as a vector of the given dimension. Fails if the stored
     * list has the wrong length or a non-positive entry.
     */
    pub fn tile_size<const DIM: usize>(&self) -> Result<IntVect<DIM>> {
        if self.tile_size.is_empty() {
            return Ok(default_tile_size())
        }
        let tile_size = IntVect::try_from(self.tile_size.clone()).map_err(Error::invalid)?;

        if tile_size.iter().any(|&n| n <= 0) {
            Err(Error::invalid(format!("tile size {} must be positive", tile_size)))
        } else {
            Ok(tile_size)
        }
    }

    pub fn mfiter_info<const DIM: usize>(&self) -> Result<MFItInfo<DIM>> {
        Ok(MFItInfo::default()
            .enable_tiling(self.do_tiling)
            .set_tile_size(self.tile_size()?))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_grid_size <= 0 {
            Err(Error::invalid("max_grid_size must be positive"))
        } else if self.domain_size <= 0 {
            Err(Error::invalid("domain_size must be positive"))
        } else if self.num_ghost < 0 {
            Err(Error::invalid("num_ghost must be non-negative"))
        } else if self.num_ranks == 0 {
            Err(Error::invalid("num_ranks must be positive"))
        } else {
            Ok(())
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use crate::int_vect::IntVect;
    use crate::mf_iter::default_tile_size;
    use super::Config;

    #[test]
    fn config_survives_cbor() {
        let config = Config { tile_size: vec![16, 4], do_tiling: true, ..Config::default() };
        let mut buffer = Vec::new();
        config.to_writer(&mut buffer).unwrap();
        assert_eq!(Config::from_reader(buffer.as_slice()).unwrap(), config);
    }

    #[test]
    fn empty_tile_size_means_default() {
        let info = Config::default().mfiter_info::<3>().unwrap();
        assert!(!info.do_tiling);
        assert_eq!(info.tile_size, default_tile_size());
    }

    #[test]
    fn tile_size_must_match_dimension() {
        let config = Config { tile_size: vec![16, 4], ..Config::default() };
        assert_eq!(config.tile_size::<2>().unwrap(), IntVect::new([16, 4]));
        assert!(config.tile_size::<3>().is_err());
        assert!(Config { tile_size: vec![0, 4], ..Config::default() }.tile_size::<2>().is_err());
    }

    #[test]
    fn bad_sizes_are_rejected() {
        assert!(Config::default().validate().is_ok());
        assert!(Config { num_ranks: 0, ..Config::default() }.validate().is_err());
        assert!(Config { max_grid_size: 0, ..Config::default() }.validate().is_err());
    }
}
