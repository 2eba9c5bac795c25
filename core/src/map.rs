//! Landmark map and landmark observations
//!
//! The map is a read-only, ordered list of point landmarks with stable 1-based identifiers. It is loaded
//! from a CSV file with the header `id,x,y`:
//!
//! ```text
//! id,x,y
//! 1,92.064,-34.777
//! 2,61.109,-47.132
//! ```
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;

/// A point landmark in the map frame
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Stable 1-based identifier
    pub id: u32,
    pub x: f64,
    pub y: f64,
}
impl Landmark {
    pub fn new(id: u32, x: f64, y: f64) -> Landmark {
        Landmark { id, x, y }
    }
}

/// A single landmark observation
///
/// As produced by a sensor the coordinates are in the vehicle frame and `id` is `None`. After
/// transformation and association the coordinates are in the map frame and `id` names the matched landmark.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkObservation {
    pub id: Option<u32>,
    pub x: f64,
    pub y: f64,
}
impl LandmarkObservation {
    /// An unassociated observation
    pub fn new(x: f64, y: f64) -> LandmarkObservation {
        LandmarkObservation { id: None, x, y }
    }
    pub fn with_id(id: u32, x: f64, y: f64) -> LandmarkObservation {
        LandmarkObservation { id: Some(id), x, y }
    }
}
impl From<&Landmark> for LandmarkObservation {
    fn from(landmark: &Landmark) -> Self {
        LandmarkObservation::with_id(landmark.id, landmark.x, landmark.y)
    }
}

/// Fixed, known map of landmarks
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Map {
    landmarks: Vec<Landmark>,
    index: HashMap<u32, usize>,
}
impl Map {
    pub fn new(landmarks: Vec<Landmark>) -> Map {
        let index = landmarks
            .iter()
            .enumerate()
            .map(|(i, landmark)| (landmark.id, i))
            .collect();
        Map { landmarks, index }
    }
    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }
    /// Look up a landmark by its identifier
    pub fn get(&self, id: u32) -> Option<&Landmark> {
        self.index.get(&id).map(|&i| &self.landmarks[i])
    }
    pub fn len(&self) -> usize {
        self.landmarks.len()
    }
    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
    /// Reads a landmark map from a CSV file with an `id,x,y` header.
    ///
    /// # Arguments
    /// * `path` - Path to the CSV file to read.
    ///
    /// # Returns
    /// * `Ok(Map)` if successful.
    /// * `Err` if the file cannot be read or parsed.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let mut landmarks = Vec::new();
        for result in rdr.deserialize() {
            let landmark: Landmark = result?;
            landmarks.push(landmark);
        }
        Ok(Map::new(landmarks))
    }
    /// Writes the map to a CSV file with an `id,x,y` header.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for landmark in &self.landmarks {
            writer.serialize(landmark)?;
        }
        writer.flush()?;
        Ok(())
    }
}
impl From<Vec<Landmark>> for Map {
    fn from(landmarks: Vec<Landmark>) -> Self {
        Map::new(landmarks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> Map {
        Map::new(vec![
            Landmark::new(1, 92.064, -34.777),
            Landmark::new(2, 61.109, -47.132),
            Landmark::new(3, 17.42, -4.5993),
        ])
    }

    #[test]
    fn test_lookup_by_id() {
        let map = sample_map();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(2), Some(&Landmark::new(2, 61.109, -47.132)));
        assert_eq!(map.get(0), None);
        assert_eq!(map.get(4), None);
    }

    #[test]
    fn test_lookup_does_not_assume_dense_ids() {
        let map = Map::new(vec![Landmark::new(10, 1.0, 1.0), Landmark::new(3, 2.0, 2.0)]);
        assert_eq!(map.get(3).map(|l| l.x), Some(2.0));
        assert_eq!(map.get(10).map(|l| l.x), Some(1.0));
    }

    #[test]
    fn test_observation_constructors() {
        let obs = LandmarkObservation::new(1.0, 2.0);
        assert_eq!(obs.id, None);
        let landmark = Landmark::new(5, 3.0, 4.0);
        assert_eq!(
            LandmarkObservation::from(&landmark),
            LandmarkObservation::with_id(5, 3.0, 4.0)
        );
    }

    #[test]
    fn test_map_csv_round_trip() {
        let map = sample_map();
        let path = std::env::temp_dir().join("mcl_map_round_trip.csv");
        map.to_csv(&path).expect("Failed to write map");
        let read = Map::from_csv(&path).expect("Failed to read map");
        assert_eq!(read, map);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_map_from_csv_tolerates_whitespace() {
        let path = std::env::temp_dir().join("mcl_map_whitespace.csv");
        std::fs::write(&path, "id, x, y\n1, 5.0, -2.5\n2, 0.25, 7.0\n").unwrap();
        let map = Map::from_csv(&path).expect("Failed to read map");
        assert_eq!(map.landmarks()[0], Landmark::new(1, 5.0, -2.5));
        assert_eq!(map.landmarks()[1], Landmark::new(2, 0.25, 7.0));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_map_from_csv_invalid_path() {
        assert!(Map::from_csv("nonexistent_map.csv").is_err());
    }
}
