//! Uploaded row shape
//!
//! Row readers hand over string-keyed maps. They are normalized once into
//! `RowFields`, one optional value per known column, so validation never has
//! to probe a map for key presence.

use std::collections::HashMap;

/// A row as produced by a file reader: header → raw cell text
pub type RawRow = HashMap<String, String>;

/// Known upload columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Name,
    Lat,
    Lon,
    SchoolId,
    EducLevel,
    Admin1,
    Admin2,
    Admin3,
    Admin4,
    Environment,
    Address,
    TypeSchool,
    NumStudents,
    NumTeachers,
    NumClassroom,
    NumLatrines,
    Electricity,
    ComputerLab,
    NumComputers,
    Connectivity,
    TypeConnectivity,
    SpeedConnectivity,
    CoverageAvailability,
    CoverageType,
    LatencyConnectivity,
    Water,
}

impl Column {
    pub const ALL: [Column; 26] = [
        Column::Name,
        Column::Lat,
        Column::Lon,
        Column::SchoolId,
        Column::EducLevel,
        Column::Admin1,
        Column::Admin2,
        Column::Admin3,
        Column::Admin4,
        Column::Environment,
        Column::Address,
        Column::TypeSchool,
        Column::NumStudents,
        Column::NumTeachers,
        Column::NumClassroom,
        Column::NumLatrines,
        Column::Electricity,
        Column::ComputerLab,
        Column::NumComputers,
        Column::Connectivity,
        Column::TypeConnectivity,
        Column::SpeedConnectivity,
        Column::CoverageAvailability,
        Column::CoverageType,
        Column::LatencyConnectivity,
        Column::Water,
    ];

    /// Header as it appears in uploads
    pub fn header(&self) -> &'static str {
        match self {
            Column::Name => "name",
            Column::Lat => "lat",
            Column::Lon => "lon",
            Column::SchoolId => "school_id",
            Column::EducLevel => "educ_level",
            Column::Admin1 => "admin1",
            Column::Admin2 => "admin2",
            Column::Admin3 => "admin3",
            Column::Admin4 => "admin4",
            Column::Environment => "environment",
            Column::Address => "address",
            Column::TypeSchool => "type_school",
            Column::NumStudents => "num_students",
            Column::NumTeachers => "num_teachers",
            Column::NumClassroom => "num_classroom",
            Column::NumLatrines => "num_latrines",
            Column::Electricity => "electricity",
            Column::ComputerLab => "computer_lab",
            Column::NumComputers => "num_computers",
            Column::Connectivity => "connectivity",
            Column::TypeConnectivity => "type_connectivity",
            Column::SpeedConnectivity => "speed_connectivity",
            Column::CoverageAvailability => "coverage_availability",
            Column::CoverageType => "coverage_type",
            Column::LatencyConnectivity => "latency_connectivity",
            Column::Water => "water",
        }
    }

    pub fn from_header(header: &str) -> Option<Column> {
        Column::ALL.iter().copied().find(|c| c.header() == header)
    }

    fn is_admin(&self) -> bool {
        matches!(
            self,
            Column::Admin1 | Column::Admin2 | Column::Admin3 | Column::Admin4
        )
    }
}

/// Normalized row: one slot per known column, `None` when not supplied
#[derive(Debug, Clone, PartialEq)]
pub struct RowFields {
    values: HashMap<Column, String>,
    /// Whether the raw row had any value left after cleanup, known column or not
    blank: bool,
}

impl RowFields {
    /// Normalize a raw row
    ///
    /// Header keys lose non-ASCII characters and surrounding whitespace and
    /// are lower-cased; unknown headers are dropped. Values are trimmed.
    /// Empty values count as absent, and so do the `na`/`nd` placeholders
    /// outside the admin columns. Blankness is decided before unknown headers
    /// are dropped.
    pub fn from_raw(raw: &RawRow) -> Self {
        let mut values = HashMap::new();
        let mut blank = true;
        for (key, value) in raw {
            let key: String = key.chars().filter(|c| c.is_ascii()).collect();
            let column = Column::from_header(&key.trim().to_lowercase());

            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let is_admin = column.is_some_and(|c| c.is_admin());
            if !is_admin && matches!(value, "na" | "nd") {
                continue;
            }
            blank = false;
            if let Some(column) = column {
                values.insert(column, value.to_string());
            }
        }
        Self { values, blank }
    }

    pub fn get(&self, column: Column) -> Option<&str> {
        self.values.get(&column).map(String::as_str)
    }

    pub fn has(&self, column: Column) -> bool {
        self.values.contains_key(&column)
    }

    /// True when the raw row carried no value at all
    pub fn is_blank(&self) -> bool {
        self.blank
    }
}
