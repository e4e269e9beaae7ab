//! Database models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::{Boundary, GeoPoint};
use crate::time::ImportPeriod;

/// Administrative region owning a set of facilities (read-only to imports)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: i64,
    pub name: String,
    pub boundary: Boundary,
}

/// Persisted facility (one physical school)
///
/// `external_id` is stored lower-cased; `name_lower` mirrors `name` for
/// case-insensitive identity lookups. Empty strings mean "not provided".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityRecord {
    pub id: Uuid,
    pub region_id: i64,
    pub external_id: String,
    pub name: String,
    pub name_lower: String,
    pub point: GeoPoint,
    pub admin_1_name: String,
    pub admin_2_name: String,
    pub admin_3_name: String,
    pub admin_4_name: String,
    pub education_level: String,
    pub environment: String,
    pub school_type: String,
    pub address: String,
    /// Most recent snapshot; maintained explicitly after bulk inserts
    pub latest_snapshot_id: Option<Uuid>,
}

impl FacilityRecord {
    /// Empty facility at `point`, with a fresh id
    pub fn new(region_id: i64, point: GeoPoint) -> Self {
        Self {
            id: Uuid::new_v4(),
            region_id,
            external_id: String::new(),
            name: String::new(),
            name_lower: String::new(),
            point,
            admin_1_name: String::new(),
            admin_2_name: String::new(),
            admin_3_name: String::new(),
            admin_4_name: String::new(),
            education_level: String::new(),
            environment: String::new(),
            school_type: String::new(),
            address: String::new(),
            latest_snapshot_id: None,
        }
    }
}

/// Location and category of a persisted facility (spatial dedup input)
#[derive(Debug, Clone, PartialEq)]
pub struct FacilityPoint {
    pub id: Uuid,
    pub education_level: String,
    pub point: GeoPoint,
}

/// Updatable facility attribute
///
/// Bulk updates take an explicit list of these; each maps onto one or more
/// table columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityField {
    ExternalId,
    Name,
    Point,
    Admin1Name,
    Admin2Name,
    Admin3Name,
    Admin4Name,
    EducationLevel,
    Environment,
    SchoolType,
    Address,
}

impl FacilityField {
    /// Table columns written when this field is updated
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            FacilityField::ExternalId => &["external_id"],
            FacilityField::Name => &["name", "name_lower"],
            FacilityField::Point => &["lat", "lon"],
            FacilityField::Admin1Name => &["admin_1_name"],
            FacilityField::Admin2Name => &["admin_2_name"],
            FacilityField::Admin3Name => &["admin_3_name"],
            FacilityField::Admin4Name => &["admin_4_name"],
            FacilityField::EducationLevel => &["education_level"],
            FacilityField::Environment => &["environment"],
            FacilityField::SchoolType => &["school_type"],
            FacilityField::Address => &["address"],
        }
    }
}

/// Connectivity classification derived from a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityStatus {
    /// No connectivity
    No,
    /// Data unavailable
    Unknown,
    Moderate,
    Good,
}

impl ConnectivityStatus {
    /// Download speed above which a connection counts as good
    pub const GOOD_SPEED_BPS: f64 = 5_000_000.0;

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityStatus::No => "no",
            ConnectivityStatus::Unknown => "unknown",
            ConnectivityStatus::Moderate => "moderate",
            ConnectivityStatus::Good => "good",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "no" => Some(ConnectivityStatus::No),
            "unknown" => Some(ConnectivityStatus::Unknown),
            "moderate" => Some(ConnectivityStatus::Moderate),
            "good" => Some(ConnectivityStatus::Good),
            _ => None,
        }
    }
}

/// Persisted per-week facility snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: Uuid,
    pub facility_id: Uuid,
    pub period: ImportPeriod,
    /// Monday of the ISO week
    pub date: NaiveDate,
    pub num_students: u32,
    pub num_teachers: u32,
    pub num_classroom: u32,
    pub num_latrines: u32,
    pub running_water: bool,
    pub electricity_availability: bool,
    pub computer_lab: bool,
    pub num_computers: u32,
    pub connectivity: bool,
    pub connectivity_status: ConnectivityStatus,
    pub connectivity_type: String,
    /// Download speed in bits per second
    pub connectivity_speed: f64,
    /// Latency in milliseconds
    pub connectivity_latency: u32,
    pub coverage_availability: bool,
    pub coverage_type: String,
}

impl SnapshotRecord {
    /// Snapshot with column defaults
    pub fn new(facility_id: Uuid, period: ImportPeriod) -> Self {
        Self {
            id: Uuid::new_v4(),
            facility_id,
            period,
            date: period.monday(),
            num_students: 0,
            num_teachers: 0,
            num_classroom: 0,
            num_latrines: 0,
            running_water: false,
            electricity_availability: false,
            computer_lab: false,
            num_computers: 0,
            connectivity: false,
            connectivity_status: ConnectivityStatus::No,
            connectivity_type: "unknown".to_string(),
            connectivity_speed: 0.0,
            connectivity_latency: 0,
            coverage_availability: false,
            coverage_type: "unknown".to_string(),
        }
    }

    /// Copy of this snapshot re-keyed to `period`, with a fresh id
    pub fn carried_forward(&self, period: ImportPeriod) -> Self {
        Self {
            id: Uuid::new_v4(),
            period,
            date: period.monday(),
            ..self.clone()
        }
    }

    /// Classify connectivity from the `connectivity` flag and speed
    pub fn derive_connectivity_status(&self) -> ConnectivityStatus {
        if !self.connectivity {
            ConnectivityStatus::No
        } else if self.connectivity_speed == 0.0 {
            ConnectivityStatus::Unknown
        } else if self.connectivity_speed > ConnectivityStatus::GOOD_SPEED_BPS {
            ConnectivityStatus::Good
        } else {
            ConnectivityStatus::Moderate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period() -> ImportPeriod {
        ImportPeriod::new(2024, 10).unwrap()
    }

    #[test]
    fn test_connectivity_status_derivation() {
        let mut snapshot = SnapshotRecord::new(Uuid::new_v4(), period());
        assert_eq!(snapshot.derive_connectivity_status(), ConnectivityStatus::No);

        snapshot.connectivity = true;
        assert_eq!(snapshot.derive_connectivity_status(), ConnectivityStatus::Unknown);

        snapshot.connectivity_speed = 500_000.0;
        assert_eq!(snapshot.derive_connectivity_status(), ConnectivityStatus::Moderate);

        snapshot.connectivity_speed = 20_000_000.0;
        assert_eq!(snapshot.derive_connectivity_status(), ConnectivityStatus::Good);
    }

    #[test]
    fn test_carried_forward_keeps_values_and_rekeys() {
        let mut snapshot = SnapshotRecord::new(Uuid::new_v4(), period());
        snapshot.num_students = 40;

        let next = snapshot.carried_forward(ImportPeriod::new(2024, 11).unwrap());
        assert_ne!(next.id, snapshot.id);
        assert_eq!(next.facility_id, snapshot.facility_id);
        assert_eq!(next.num_students, 40);
        assert_eq!(next.period.week, 11);
        assert_eq!(next.date, NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            ConnectivityStatus::No,
            ConnectivityStatus::Unknown,
            ConnectivityStatus::Moderate,
            ConnectivityStatus::Good,
        ] {
            assert_eq!(ConnectivityStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ConnectivityStatus::parse("fast"), None);
    }

    #[test]
    fn test_name_field_updates_mirror_column() {
        assert_eq!(FacilityField::Name.columns(), &["name", "name_lower"]);
        assert_eq!(FacilityField::Point.columns(), &["lat", "lon"]);
    }
}
