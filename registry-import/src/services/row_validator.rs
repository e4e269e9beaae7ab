//! Row validation
//!
//! Turns one normalized row into typed facility and snapshot attributes.
//! Validation is fail-fast per row: the first hard error ends the checks for
//! that row. Pure function of the row; never touches storage. Containment in
//! the region boundary is checked after persistence, not here.

use registry_common::GeoPoint;

use crate::models::{
    Column, CoverageType, Environment, FacilityAttributes, ImportRow, RowFields, RowIssue,
    SnapshotAttributes,
};

pub const EXTERNAL_ID_MAX_LENGTH: usize = 50;
pub const NAME_MAX_LENGTH: usize = 255;
pub const ADMIN_NAME_MAX_LENGTH: usize = 100;
pub const ADDRESS_MAX_LENGTH: usize = 255;
pub const EDUCATION_LEVEL_MAX_LENGTH: usize = 64;
pub const SCHOOL_TYPE_MAX_LENGTH: usize = 64;
pub const CONNECTIVITY_TYPE_MAX_LENGTH: usize = 64;
pub const COVERAGE_TYPE_MAX_LENGTH: usize = 64;

/// Speeds strictly between these bounds were entered in kbps, not Mbps
const SPEED_UNIT_CONFUSION_RANGE: (f64, f64) = (500.0, 600.0);

/// Result of validating one row
#[derive(Debug, Clone, Default)]
pub struct RowValidation {
    pub facility: Option<FacilityAttributes>,
    pub snapshot: Option<SnapshotAttributes>,
    /// At most one entry (fail-fast)
    pub errors: Vec<RowIssue>,
    pub warnings: Vec<RowIssue>,
}

impl RowValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.facility.is_some()
    }

    /// The pipeline row, if validation passed
    pub fn into_row(self, row_index: usize) -> Option<ImportRow> {
        if !self.errors.is_empty() {
            return None;
        }
        match (self.facility, self.snapshot) {
            (Some(facility), Some(snapshot)) => Some(ImportRow::new(row_index, facility, snapshot)),
            _ => None,
        }
    }
}

/// Row validator
pub struct RowValidator;

impl RowValidator {
    /// Validate one row
    ///
    /// `row_index` is only used to label issues.
    pub fn validate(row_index: usize, fields: &RowFields) -> RowValidation {
        let mut warnings = Vec::new();
        match Self::validate_fields(row_index, fields, &mut warnings) {
            Ok((facility, snapshot)) => RowValidation {
                facility: Some(facility),
                snapshot: Some(snapshot),
                errors: Vec::new(),
                warnings,
            },
            // Coercions of a rejected row were never stored
            Err(issue) => RowValidation {
                facility: None,
                snapshot: None,
                errors: vec![issue],
                warnings: Vec::new(),
            },
        }
    }

    fn validate_fields(
        row: usize,
        fields: &RowFields,
        warnings: &mut Vec<RowIssue>,
    ) -> Result<(FacilityAttributes, SnapshotAttributes), RowIssue> {
        let missing: Vec<&str> = [Column::Lat, Column::Lon]
            .iter()
            .filter(|c| !fields.has(**c))
            .map(|c| c.header())
            .collect();
        if !missing.is_empty() {
            return Err(RowIssue::schema(
                row,
                format!("Missing data for required column(s) {}", missing.join(", ")),
            ));
        }

        let external_id = text(
            row,
            fields,
            Column::SchoolId,
            EXTERNAL_ID_MAX_LENGTH,
            "school identifier",
        )?
        .map(|id| id.to_lowercase());

        let point = geopoint(row, fields)?;
        let mut facility = FacilityAttributes::new(point);
        facility.external_id = external_id;

        facility.education_level = text(row, fields, Column::EducLevel, EDUCATION_LEVEL_MAX_LENGTH, "educ_level")?;
        facility.name = text(row, fields, Column::Name, NAME_MAX_LENGTH, "name")?;
        facility.admin_1_name = text(row, fields, Column::Admin1, ADMIN_NAME_MAX_LENGTH, "admin1")?;
        facility.admin_2_name = text(row, fields, Column::Admin2, ADMIN_NAME_MAX_LENGTH, "admin2")?;
        facility.admin_3_name = text(row, fields, Column::Admin3, ADMIN_NAME_MAX_LENGTH, "admin3")?;
        facility.admin_4_name = text(row, fields, Column::Admin4, ADMIN_NAME_MAX_LENGTH, "admin4")?;

        if let Some(value) = fields.get(Column::Environment) {
            facility.environment = Some(Environment::parse(value).unwrap_or_else(|| {
                warnings.push(RowIssue::coerced(
                    row,
                    format!(
                        "Bad data provided for environment: '{}' is not one of urban, rural; stored as urban",
                        value
                    ),
                ));
                Environment::Urban
            }));
        }

        facility.address = text(row, fields, Column::Address, ADDRESS_MAX_LENGTH, "address")?;
        facility.school_type = text(row, fields, Column::TypeSchool, SCHOOL_TYPE_MAX_LENGTH, "type_school")?;

        let mut snapshot = SnapshotAttributes {
            num_students: count(row, fields, Column::NumStudents)?,
            num_teachers: count(row, fields, Column::NumTeachers)?,
            num_classroom: count(row, fields, Column::NumClassroom)?,
            num_latrines: count(row, fields, Column::NumLatrines)?,
            electricity_availability: flag(fields, Column::Electricity),
            computer_lab: flag(fields, Column::ComputerLab),
            ..Default::default()
        };

        snapshot.num_computers = count(row, fields, Column::NumComputers)?;
        if snapshot.num_computers.is_some() {
            snapshot.computer_lab = Some(true);
        }

        snapshot.connectivity = flag(fields, Column::Connectivity);
        snapshot.connectivity_type = text(
            row,
            fields,
            Column::TypeConnectivity,
            CONNECTIVITY_TYPE_MAX_LENGTH,
            "type_connectivity",
        )?;

        if let Some(value) = fields.get(Column::SpeedConnectivity) {
            snapshot.connectivity_speed = Some(speed_bps(value).ok_or_else(|| {
                RowIssue::type_error(row, "Bad data provided for connectivity_speed")
            })?);
            snapshot.connectivity = Some(true);
        }

        snapshot.coverage_availability = flag(fields, Column::CoverageAvailability);
        if let Some(value) = fields.get(Column::CoverageType) {
            if value.chars().count() > COVERAGE_TYPE_MAX_LENGTH {
                return Err(max_length_issue(row, "coverage_type", COVERAGE_TYPE_MAX_LENGTH));
            }
            let coverage = CoverageType::parse(value).ok_or_else(|| {
                RowIssue::constraint(
                    row,
                    format!(
                        "Bad data provided for coverage_type: {} type does not exist (expected one of {})",
                        value,
                        CoverageType::VOCABULARY.join(", ")
                    ),
                )
            })?;
            if snapshot.coverage_availability.is_none() {
                snapshot.coverage_availability = match coverage {
                    CoverageType::No => Some(false),
                    CoverageType::Unknown => None,
                    _ => Some(true),
                };
            }
            snapshot.coverage_type = Some(coverage);
        }

        snapshot.connectivity_latency = count(row, fields, Column::LatencyConnectivity)?;
        snapshot.running_water = flag(fields, Column::Water);

        Ok((facility, snapshot))
    }
}

fn max_length_issue(row: usize, label: &str, max: usize) -> RowIssue {
    RowIssue::constraint(
        row,
        format!(
            "Bad data provided for {}: max length of {} characters exceeded",
            label, max
        ),
    )
}

/// Length-bounded text column
fn text(
    row: usize,
    fields: &RowFields,
    column: Column,
    max: usize,
    label: &str,
) -> Result<Option<String>, RowIssue> {
    match fields.get(column) {
        Some(value) if value.chars().count() > max => Err(max_length_issue(row, label, max)),
        Some(value) => Ok(Some(value.to_string())),
        None => Ok(None),
    }
}

fn geopoint(row: usize, fields: &RowFields) -> Result<GeoPoint, RowIssue> {
    let parse = |column: Column| -> Option<f64> {
        fields
            .get(column)
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
    };
    let bad = || RowIssue::type_error(row, "Bad data provided for geopoint");

    let lat = parse(Column::Lat).ok_or_else(bad)?;
    let lon = parse(Column::Lon).ok_or_else(bad)?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(bad());
    }

    let point = GeoPoint::new(lat, lon);
    if point.is_zero() {
        return Err(RowIssue::semantic(row, "Bad data provided for geopoint: zero point"));
    }
    Ok(point)
}

/// Non-negative integer column; digit-group separators are stripped first
fn count(row: usize, fields: &RowFields, column: Column) -> Result<Option<u32>, RowIssue> {
    let Some(value) = fields.get(column) else {
        return Ok(None);
    };
    parse_count(value)
        .map(Some)
        .ok_or_else(|| RowIssue::type_error(row, format!("Bad data provided for {}", column.header())))
}

fn parse_count(value: &str) -> Option<u32> {
    let digits: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, ',' | '_' | '\''))
        .collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Mbps text to bits per second
fn speed_bps(value: &str) -> Option<f64> {
    let mut mbps: f64 = value.parse().ok().filter(|v: &f64| v.is_finite() && *v >= 0.0)?;
    let (low, high) = SPEED_UNIT_CONFUSION_RANGE;
    if mbps > low && mbps < high {
        mbps = 0.5;
    }
    Some(mbps * 1_000_000.0)
}

/// Boolean column: true iff the value is true/yes/1
fn flag(fields: &RowFields, column: Column) -> Option<bool> {
    fields
        .get(column)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "yes" | "1"))
}
