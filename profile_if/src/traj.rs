//! # Trajectory data model
//!
//! A trajectory artifact holds the two discretised wheel trajectories of one
//! maneuver, one sequence per side of the differential drive. Artifacts are
//! produced offline by the trajectory compiler, persisted to disk, and
//! consumed read-only by the streaming engine.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Magic bytes at the start of every artifact file.
const ARTIFACT_MAGIC: [u8; 4] = *b"CTRJ";

/// Version of the artifact format written by this build.
///
/// The legacy record had no version field, which made format evolution
/// impossible - any change silently corrupted the loaded trajectories.
const ARTIFACT_VERSION: u16 = 1;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// One discretised instant of motion for one wheel side, in device units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySample {
    /// Wheel position in encoder ticks
    pub position_ticks: i32,

    /// Open-loop feed-forward term in volts
    pub feed_forward_v: f64,

    /// Heading in IMU heading ticks
    pub heading_ticks: f64,

    /// Time this sample is held by the closed-loop controller
    pub duration_ms: u32,
}

/// The two wheel trajectories of one compiled maneuver.
///
/// Index `i` of the left and right sequences represent the same instant in
/// time: both sides always have the same length and the same per-sample
/// durations. Construction goes through [`TrajectoryArtifact::new`] which
/// enforces those invariants, and the sequences are immutable afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrajectoryArtifact {
    left: Vec<TrajectorySample>,
    right: Vec<TrajectorySample>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Possible errors when building, saving or loading an artifact.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("The left and right trajectories have different lengths ({left} vs {right})")]
    MismatchedLengths { left: usize, right: usize },

    #[error("The left and right durations differ at sample {0}")]
    MismatchedDurations(usize),

    #[error("Attempted to create an artifact with no samples")]
    Empty,

    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("The file is not a trajectory artifact (bad magic)")]
    BadMagic,

    #[error("Unsupported artifact format version {0}")]
    UnsupportedVersion(u16),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TrajectoryArtifact {
    /// Build an artifact from the two wheel trajectories.
    ///
    /// Fails if the sequences are empty, have different lengths, or disagree
    /// on any sample duration.
    pub fn new(
        left: Vec<TrajectorySample>,
        right: Vec<TrajectorySample>,
    ) -> Result<Self, ArtifactError> {
        if left.len() != right.len() {
            return Err(ArtifactError::MismatchedLengths {
                left: left.len(),
                right: right.len(),
            });
        }

        if left.is_empty() {
            return Err(ArtifactError::Empty);
        }

        for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
            if l.duration_ms != r.duration_ms {
                return Err(ArtifactError::MismatchedDurations(i));
            }
        }

        Ok(Self { left, right })
    }

    /// The left wheel trajectory.
    pub fn left(&self) -> &[TrajectorySample] {
        &self.left
    }

    /// The right wheel trajectory.
    pub fn right(&self) -> &[TrajectorySample] {
        &self.right
    }

    /// Number of samples on each side.
    pub fn num_samples(&self) -> usize {
        self.left.len()
    }

    /// Duration of the first sample, which sets the streaming rate.
    pub fn sample_duration_ms(&self) -> u32 {
        self.left[0].duration_ms
    }

    /// Write the artifact to the given path in the binary artifact format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ArtifactError> {
        let mut w = BufWriter::new(File::create(path)?);

        w.write_all(&ARTIFACT_MAGIC)?;
        w.write_u16::<LittleEndian>(ARTIFACT_VERSION)?;
        w.write_u32::<LittleEndian>(self.left.len() as u32)?;

        for sample in self.left.iter().chain(self.right.iter()) {
            w.write_i32::<LittleEndian>(sample.position_ticks)?;
            w.write_f64::<LittleEndian>(sample.feed_forward_v)?;
            w.write_f64::<LittleEndian>(sample.heading_ticks)?;
            w.write_u32::<LittleEndian>(sample.duration_ms)?;
        }

        w.flush()?;

        Ok(())
    }

    /// Load an artifact from the given path, re-validating the invariants.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
        let mut r = BufReader::new(File::open(path)?);

        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != ARTIFACT_MAGIC {
            return Err(ArtifactError::BadMagic);
        }

        let version = r.read_u16::<LittleEndian>()?;
        if version != ARTIFACT_VERSION {
            return Err(ArtifactError::UnsupportedVersion(version));
        }

        let num_samples = r.read_u32::<LittleEndian>()? as usize;

        let left = read_side(&mut r, num_samples)?;
        let right = read_side(&mut r, num_samples)?;

        Self::new(left, right)
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Read one side's sample array from an artifact file.
fn read_side<R: Read>(r: &mut R, num_samples: usize) -> Result<Vec<TrajectorySample>, ArtifactError> {
    let mut side = Vec::with_capacity(num_samples);

    for _ in 0..num_samples {
        side.push(TrajectorySample {
            position_ticks: r.read_i32::<LittleEndian>()?,
            feed_forward_v: r.read_f64::<LittleEndian>()?,
            heading_ticks: r.read_f64::<LittleEndian>()?,
            duration_ms: r.read_u32::<LittleEndian>()?,
        });
    }

    Ok(side)
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample(position_ticks: i32, duration_ms: u32) -> TrajectorySample {
        TrajectorySample {
            position_ticks,
            feed_forward_v: 1.5,
            heading_ticks: -450.0,
            duration_ms,
        }
    }

    #[test]
    fn test_invariants() {
        // Mismatched lengths rejected
        assert!(matches!(
            TrajectoryArtifact::new(vec![sample(0, 10)], vec![]),
            Err(ArtifactError::MismatchedLengths { .. })
        ));

        // Empty rejected
        assert!(matches!(
            TrajectoryArtifact::new(vec![], vec![]),
            Err(ArtifactError::Empty)
        ));

        // Mismatched durations rejected
        assert!(matches!(
            TrajectoryArtifact::new(
                vec![sample(0, 10), sample(1, 10)],
                vec![sample(0, 10), sample(1, 20)]
            ),
            Err(ArtifactError::MismatchedDurations(1))
        ));
    }

    #[test]
    fn test_save_load() {
        let artifact = TrajectoryArtifact::new(
            vec![sample(0, 10), sample(512, 10)],
            vec![sample(0, 10), sample(-512, 10)],
        )
        .unwrap();

        let mut path = std::env::temp_dir();
        path.push(format!("castor_traj_test_{}.traj", std::process::id()));

        artifact.save(&path).unwrap();
        let loaded = TrajectoryArtifact::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(artifact.left(), loaded.left());
        assert_eq!(artifact.right(), loaded.right());
    }

    #[test]
    fn test_load_rejects_bad_magic() {
        let mut path = std::env::temp_dir();
        path.push(format!("castor_traj_bad_{}.traj", std::process::id()));

        std::fs::write(&path, b"PKL0junkjunkjunk").unwrap();
        let result = TrajectoryArtifact::load(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(ArtifactError::BadMagic)));
    }
}
