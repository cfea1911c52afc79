//! Persistence of trucks and tours.
//!
//! The planner treats stored placements as hints: whatever comes back from a
//! store is re-validated when a layout session is built. Saves overwrite the
//! whole tour; the last write wins. Merging one truck's boxes happens under
//! the store's write lock.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{CargoBox, Tour, Truck, TruckId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Tour '{0}' not found")]
    TourNotFound(String),
    #[error("Store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Where trucks and tours come from and where committed layouts go.
pub trait LayoutStore: Send + Sync {
    fn load_trucks(&self) -> StoreResult<Vec<Truck>>;

    fn load_tour(&self, tour_id: &str) -> StoreResult<Tour>;

    /// Boxes of a tour, possibly carrying earlier assignments and placements.
    fn load_boxes_for_tour(&self, tour_id: &str) -> StoreResult<Vec<CargoBox>> {
        Ok(self.load_tour(tour_id)?.boxes)
    }

    /// Replaces the boxes and confirmed trucks of a tour, creating it if needed.
    fn save_tour_layout(
        &self,
        tour_id: &str,
        boxes: &[CargoBox],
        confirmed_truck_ids: &[TruckId],
    ) -> StoreResult<()>;

    /// Merges one truck's committed boxes into a stored tour and confirms the truck.
    ///
    /// The whole merge runs under one write lock, so commits for different
    /// trucks of a tour keep each other's boxes.
    fn merge_truck_layout(
        &self,
        tour_id: &str,
        truck_id: &str,
        records: Vec<CargoBox>,
    ) -> StoreResult<()>;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    trucks: Vec<Truck>,
    #[serde(default)]
    tours: HashMap<String, Tour>,
}

impl StoreData {
    fn tour(&self, tour_id: &str) -> StoreResult<Tour> {
        self.tours
            .get(tour_id)
            .cloned()
            .ok_or_else(|| StoreError::TourNotFound(tour_id.to_string()))
    }

    fn upsert_layout(&mut self, tour_id: &str, boxes: &[CargoBox], confirmed: &[TruckId]) {
        let tour = self
            .tours
            .entry(tour_id.to_string())
            .or_insert_with(|| Tour::new(tour_id, ""));
        tour.boxes = boxes.to_vec();
        tour.confirmed_truck_ids = confirmed.to_vec();
    }

    fn merge_truck_layout(
        &mut self,
        tour_id: &str,
        truck_id: &str,
        records: Vec<CargoBox>,
    ) -> StoreResult<()> {
        let tour = self
            .tours
            .get_mut(tour_id)
            .ok_or_else(|| StoreError::TourNotFound(tour_id.to_string()))?;
        tour.merge_boxes(records);
        tour.confirm_truck(truck_id);
        Ok(())
    }
}

fn read_guard(lock: &RwLock<StoreData>) -> StoreResult<RwLockReadGuard<'_, StoreData>> {
    lock.read().map_err(|_| StoreError::Poisoned)
}

fn write_guard(lock: &RwLock<StoreData>) -> StoreResult<RwLockWriteGuard<'_, StoreData>> {
    lock.write().map_err(|_| StoreError::Poisoned)
}

/// Volatile store, seeded up front.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trucks(self, trucks: Vec<Truck>) -> Self {
        if let Ok(mut data) = self.data.write() {
            data.trucks = trucks;
        }
        self
    }

    pub fn with_tour(self, tour: Tour) -> Self {
        if let Ok(mut data) = self.data.write() {
            data.tours.insert(tour.id.clone(), tour);
        }
        self
    }
}

impl LayoutStore for MemoryStore {
    fn load_trucks(&self) -> StoreResult<Vec<Truck>> {
        Ok(read_guard(&self.data)?.trucks.clone())
    }

    fn load_tour(&self, tour_id: &str) -> StoreResult<Tour> {
        read_guard(&self.data)?.tour(tour_id)
    }

    fn save_tour_layout(
        &self,
        tour_id: &str,
        boxes: &[CargoBox],
        confirmed_truck_ids: &[TruckId],
    ) -> StoreResult<()> {
        write_guard(&self.data)?.upsert_layout(tour_id, boxes, confirmed_truck_ids);
        debug!("Saved {} boxes for tour '{}' in memory", boxes.len(), tour_id);
        Ok(())
    }

    fn merge_truck_layout(
        &self,
        tour_id: &str,
        truck_id: &str,
        records: Vec<CargoBox>,
    ) -> StoreResult<()> {
        let count = records.len();
        write_guard(&self.data)?.merge_truck_layout(tour_id, truck_id, records)?;
        debug!("Merged {} boxes of truck '{}' into tour '{}'", count, truck_id, tour_id);
        Ok(())
    }
}

/// JSON file store: one `planner.json` holding trucks and tours.
///
/// The file is read once on open and rewritten after every save.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    data: RwLock<StoreData>,
}

impl FileStore {
    pub const FILE_NAME: &'static str = "planner.json";

    /// Opens the store in `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(Self::FILE_NAME);

        let data = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            serde_json::from_reader(reader)?
        } else {
            StoreData::default()
        };
        info!(
            "Opened store at {} ({} trucks, {} tours)",
            path.display(),
            data.trucks.len(),
            data.tours.len()
        );

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, data: &StoreData) -> StoreResult<()> {
        let writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(writer, data)?;
        Ok(())
    }

    /// Replaces the truck list and writes it to disk.
    pub fn save_trucks(&self, trucks: Vec<Truck>) -> StoreResult<()> {
        let mut data = write_guard(&self.data)?;
        data.trucks = trucks;
        self.persist(&data)
    }

    /// Inserts or replaces a whole tour and writes it to disk.
    pub fn save_tour(&self, tour: Tour) -> StoreResult<()> {
        let mut data = write_guard(&self.data)?;
        data.tours.insert(tour.id.clone(), tour);
        self.persist(&data)
    }
}

impl LayoutStore for FileStore {
    fn load_trucks(&self) -> StoreResult<Vec<Truck>> {
        Ok(read_guard(&self.data)?.trucks.clone())
    }

    fn load_tour(&self, tour_id: &str) -> StoreResult<Tour> {
        read_guard(&self.data)?.tour(tour_id)
    }

    fn save_tour_layout(
        &self,
        tour_id: &str,
        boxes: &[CargoBox],
        confirmed_truck_ids: &[TruckId],
    ) -> StoreResult<()> {
        let mut data = write_guard(&self.data)?;
        data.upsert_layout(tour_id, boxes, confirmed_truck_ids);
        self.persist(&data).inspect_err(|e| {
            error!("Failed to write {}: {}", self.path.display(), e);
        })
    }

    fn merge_truck_layout(
        &self,
        tour_id: &str,
        truck_id: &str,
        records: Vec<CargoBox>,
    ) -> StoreResult<()> {
        let mut data = write_guard(&self.data)?;
        data.merge_truck_layout(tour_id, truck_id, records)?;
        self.persist(&data).inspect_err(|e| {
            error!("Failed to write {}: {}", self.path.display(), e);
        })
    }
}
