//! Validated row attributes
//!
//! `FacilityAttributes` carries the current-state fields of a facility and
//! `SnapshotAttributes` the period-scoped ones. Both keep `None` for values
//! the row did not supply so that updates and carry-forward only touch what
//! was actually provided.

use registry_common::db::{FacilityField, FacilityRecord, SnapshotRecord};
use registry_common::GeoPoint;
use uuid::Uuid;

/// Facility environment category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Urban,
    Rural,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Urban => "urban",
            Environment::Rural => "rural",
        }
    }

    /// Case-insensitive parse
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "urban" => Some(Environment::Urban),
            "rural" => Some(Environment::Rural),
            _ => None,
        }
    }
}

/// Mobile coverage category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageType {
    Unknown,
    No,
    TwoG,
    ThreeG,
    FourG,
}

impl CoverageType {
    pub const VOCABULARY: [&'static str; 5] = ["unknown", "no", "2g", "3g", "4g"];

    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageType::Unknown => "unknown",
            CoverageType::No => "no",
            CoverageType::TwoG => "2g",
            CoverageType::ThreeG => "3g",
            CoverageType::FourG => "4g",
        }
    }

    /// Case-insensitive parse; "no service" and "no coverage" mean `No`
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "no" | "no service" | "no coverage" => Some(CoverageType::No),
            "unknown" => Some(CoverageType::Unknown),
            "2g" => Some(CoverageType::TwoG),
            "3g" => Some(CoverageType::ThreeG),
            "4g" => Some(CoverageType::FourG),
            _ => None,
        }
    }
}

/// Current-state facility fields from one row
#[derive(Debug, Clone, PartialEq)]
pub struct FacilityAttributes {
    /// Lower-cased
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub point: GeoPoint,
    pub admin_1_name: Option<String>,
    pub admin_2_name: Option<String>,
    pub admin_3_name: Option<String>,
    pub admin_4_name: Option<String>,
    pub education_level: Option<String>,
    pub environment: Option<Environment>,
    pub school_type: Option<String>,
    pub address: Option<String>,
}

impl FacilityAttributes {
    pub fn new(point: GeoPoint) -> Self {
        Self {
            external_id: None,
            name: None,
            point,
            admin_1_name: None,
            admin_2_name: None,
            admin_3_name: None,
            admin_4_name: None,
            education_level: None,
            environment: None,
            school_type: None,
            address: None,
        }
    }

    /// Fields this row supplies, in a stable order (the update group key)
    pub fn present_fields(&self) -> Vec<FacilityField> {
        let mut fields = vec![FacilityField::Point];
        let optional = [
            (self.external_id.is_some(), FacilityField::ExternalId),
            (self.name.is_some(), FacilityField::Name),
            (self.admin_1_name.is_some(), FacilityField::Admin1Name),
            (self.admin_2_name.is_some(), FacilityField::Admin2Name),
            (self.admin_3_name.is_some(), FacilityField::Admin3Name),
            (self.admin_4_name.is_some(), FacilityField::Admin4Name),
            (self.education_level.is_some(), FacilityField::EducationLevel),
            (self.environment.is_some(), FacilityField::Environment),
            (self.school_type.is_some(), FacilityField::SchoolType),
            (self.address.is_some(), FacilityField::Address),
        ];
        fields.extend(optional.iter().filter(|(present, _)| *present).map(|(_, f)| *f));
        fields.sort();
        fields
    }

    /// Overwrite the supplied fields on `record`
    pub fn apply_to(&self, record: &mut FacilityRecord) {
        record.point = self.point;
        if let Some(external_id) = &self.external_id {
            record.external_id = external_id.to_lowercase();
        }
        if let Some(name) = &self.name {
            record.name = name.clone();
            record.name_lower = name.to_lowercase();
        }
        if let Some(v) = &self.admin_1_name {
            record.admin_1_name = v.clone();
        }
        if let Some(v) = &self.admin_2_name {
            record.admin_2_name = v.clone();
        }
        if let Some(v) = &self.admin_3_name {
            record.admin_3_name = v.clone();
        }
        if let Some(v) = &self.admin_4_name {
            record.admin_4_name = v.clone();
        }
        if let Some(v) = &self.education_level {
            record.education_level = v.clone();
        }
        if let Some(v) = self.environment {
            record.environment = v.as_str().to_string();
        }
        if let Some(v) = &self.school_type {
            record.school_type = v.clone();
        }
        if let Some(v) = &self.address {
            record.address = v.clone();
        }
    }

    /// New facility record for `region_id` with a fresh id
    pub fn to_record(&self, region_id: i64) -> FacilityRecord {
        let mut record = FacilityRecord::new(region_id, self.point);
        self.apply_to(&mut record);
        record
    }

    /// Key into the per-education-level spatial index
    pub fn category(&self) -> Option<&str> {
        self.education_level.as_deref().filter(|level| !level.is_empty())
    }
}

/// Period-scoped fields from one row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotAttributes {
    pub num_students: Option<u32>,
    pub num_teachers: Option<u32>,
    pub num_classroom: Option<u32>,
    pub num_latrines: Option<u32>,
    pub running_water: Option<bool>,
    pub electricity_availability: Option<bool>,
    pub computer_lab: Option<bool>,
    pub num_computers: Option<u32>,
    pub connectivity: Option<bool>,
    pub connectivity_type: Option<String>,
    /// Bits per second
    pub connectivity_speed: Option<f64>,
    pub connectivity_latency: Option<u32>,
    pub coverage_availability: Option<bool>,
    pub coverage_type: Option<CoverageType>,
}

impl SnapshotAttributes {
    /// Override `snapshot` with the supplied fields and re-derive its status
    pub fn apply_to(&self, snapshot: &mut SnapshotRecord) {
        if let Some(v) = self.num_students {
            snapshot.num_students = v;
        }
        if let Some(v) = self.num_teachers {
            snapshot.num_teachers = v;
        }
        if let Some(v) = self.num_classroom {
            snapshot.num_classroom = v;
        }
        if let Some(v) = self.num_latrines {
            snapshot.num_latrines = v;
        }
        if let Some(v) = self.running_water {
            snapshot.running_water = v;
        }
        if let Some(v) = self.electricity_availability {
            snapshot.electricity_availability = v;
        }
        if let Some(v) = self.computer_lab {
            snapshot.computer_lab = v;
        }
        if let Some(v) = self.num_computers {
            snapshot.num_computers = v;
        }
        if let Some(v) = self.connectivity {
            snapshot.connectivity = v;
        }
        if let Some(v) = &self.connectivity_type {
            snapshot.connectivity_type = v.clone();
        }
        if let Some(v) = self.connectivity_speed {
            snapshot.connectivity_speed = v;
        }
        if let Some(v) = self.connectivity_latency {
            snapshot.connectivity_latency = v;
        }
        if let Some(v) = self.coverage_availability {
            snapshot.coverage_availability = v;
        }
        if let Some(v) = self.coverage_type {
            snapshot.coverage_type = v.as_str().to_string();
        }
        snapshot.connectivity_status = snapshot.derive_connectivity_status();
    }
}

/// A validated row moving through the pipeline
#[derive(Debug, Clone)]
pub struct ImportRow {
    pub row_index: usize,
    pub facility: FacilityAttributes,
    pub snapshot: SnapshotAttributes,
    /// Stored facility this row resolved to; `None` means "create"
    pub existing: Option<FacilityRecord>,
    /// Set once the facility has been created or updated
    pub facility_id: Option<Uuid>,
}

impl ImportRow {
    pub fn new(row_index: usize, facility: FacilityAttributes, snapshot: SnapshotAttributes) -> Self {
        Self {
            row_index,
            facility,
            snapshot,
            existing: None,
            facility_id: None,
        }
    }

    pub fn is_new(&self) -> bool {
        self.existing.is_none()
    }
}
